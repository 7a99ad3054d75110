// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub congestion: CongestionConfig,
    pub replay: ReplayConfig,
    pub publisher: PublisherConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Minimum IoU for a detection to be bound to an existing track
    pub iou_threshold: f32,
    /// Frames of absence tolerated before a track is deleted
    pub max_age: u32,
    /// Frames of absence still reported as visible output
    pub visibility_grace: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_age: 20,
            visibility_grace: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CongestionConfig {
    /// Active vehicle count at which congestion becomes MEDIUM
    pub medium_threshold: usize,
    /// Active vehicle count at which congestion becomes HIGH
    pub high_threshold: usize,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            medium_threshold: 5,
            high_threshold: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub input_dir: String,
    /// Process every Nth frame record (frame-rate down-sampling)
    pub frame_stride: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Per-observer channel capacity before the observer counts as slow
    pub observer_buffer: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { observer_buffer: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Closed vocabulary of object classes the analytics care about.
/// Anything else a detector emits is rejected at the source boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Person,
    Car,
    Truck,
    Bus,
    Motorcycle,
}

impl ObjectClass {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "person" => Some(Self::Person),
            "car" => Some(Self::Car),
            "truck" => Some(Self::Truck),
            "bus" => Some(Self::Bus),
            "motorcycle" => Some(Self::Motorcycle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Bus => "bus",
            Self::Motorcycle => "motorcycle",
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self, Self::Car | Self::Truck | Self::Bus | Self::Motorcycle)
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis-aligned bounding box in pixel coordinates, [x1, y1] top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.x1 <= self.x2
            && self.y1 <= self.y2
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection-over-union. Degenerate or disjoint boxes score 0.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(b: [f32; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

/// One detector output on one frame. Ephemeral; the tracker turns these
/// into persistent identities.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: ObjectClass,
    pub confidence: f32,
}

/// Read-only view of a currently visible track, as reported by the
/// tracker and consumed by the aggregators.
#[derive(Debug, Clone, Serialize)]
pub struct TrackObservation {
    pub track_id: u64,
    pub label: ObjectClass,
    pub bbox: BoundingBox,
    pub hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("LOW"),
            Self::Medium => f.write_str("MEDIUM"),
            Self::High => f.write_str("HIGH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeopleStats {
    pub current: usize,
    pub unique: usize,
    pub avg_dwell_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleStats {
    pub current: usize,
    pub per_class: BTreeMap<ObjectClass, usize>,
    pub congestion: CongestionLevel,
}

/// Aggregate statistics for one processed frame. Immutable once built;
/// shared between the producer and observers as `Arc<AnalyticsSnapshot>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub frame_id: u64,
    pub timestamp_secs: f64,
    pub people: PeopleStats,
    pub vehicles: VehicleStats,
}
