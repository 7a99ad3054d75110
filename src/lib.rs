// src/lib.rs
//
// Multi-object tracking and streaming-analytics engine: per-frame
// detections in, persistent track identities and rolling aggregate
// snapshots out. The detector, video decoding and transport layers are
// external collaborators behind the DetectionSource and publisher seams.

pub mod analytics;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod tracker;
pub mod types;

pub use error::PipelineError;
pub use pipeline::{MetricsObserver, PipelineMetrics, SessionConfig, SnapshotPublisher, StreamWorker};
pub use source::{DetectionSource, FrameDetections, JsonlSource};
pub use tracker::IoUTracker;
pub use types::{AnalyticsSnapshot, BoundingBox, Config, Detection, ObjectClass, TrackObservation};
