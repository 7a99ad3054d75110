// src/analytics/traffic.rs
//
// Traffic-side aggregator. Presence is frame-local: the active map is
// rebuilt on every update to exactly the vehicle ids in the current
// track list. Only the per-class unique counters are cumulative.

use crate::types::{CongestionConfig, CongestionLevel, ObjectClass, TrackObservation, VehicleStats};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug)]
pub struct VehicleAnalytics {
    config: CongestionConfig,
    /// track_id -> label, for vehicles visible in the latest update
    active: HashMap<u64, ObjectClass>,
    /// Every vehicle id ever counted, so re-appearances are not re-counted
    seen_ids: HashSet<u64>,
    /// Cumulative unique vehicles per class; grows, never shrinks
    unique_counts: BTreeMap<ObjectClass, usize>,
}

impl VehicleAnalytics {
    pub fn new(config: CongestionConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
            seen_ids: HashSet::new(),
            unique_counts: BTreeMap::new(),
        }
    }

    /// Fold one frame's track list into the state. Non-vehicle labels
    /// are ignored; vehicle ids absent from this call drop out of the
    /// active map.
    pub fn update(&mut self, tracks: &[TrackObservation]) {
        self.active.clear();

        for track in tracks {
            if !track.label.is_vehicle() {
                continue;
            }
            self.active.insert(track.track_id, track.label);
            if self.seen_ids.insert(track.track_id) {
                *self.unique_counts.entry(track.label).or_insert(0) += 1;
            }
        }
    }

    /// Vehicles visible in the most recent frame.
    pub fn current_count(&self) -> usize {
        self.active.len()
    }

    pub fn current_counts_per_class(&self) -> BTreeMap<ObjectClass, usize> {
        let mut counts = BTreeMap::new();
        for label in self.active.values() {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }

    /// Cumulative distinct vehicles per class.
    pub fn unique_counts(&self) -> &BTreeMap<ObjectClass, usize> {
        &self.unique_counts
    }

    /// Three-bucket congestion proxy over the current vehicle count.
    /// Bucket boundaries come from configuration.
    pub fn congestion_level(&self) -> CongestionLevel {
        let n = self.current_count();
        if n < self.config.medium_threshold {
            CongestionLevel::Low
        } else if n < self.config.high_threshold {
            CongestionLevel::Medium
        } else {
            CongestionLevel::High
        }
    }

    pub fn stats(&self) -> VehicleStats {
        VehicleStats {
            current: self.current_count(),
            per_class: self.current_counts_per_class(),
            congestion: self.congestion_level(),
        }
    }
}
