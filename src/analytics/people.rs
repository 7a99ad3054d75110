// src/analytics/people.rs
//
// Crowd-side aggregator. Keeps a cumulative ledger of every person
// identity ever observed (for unique-visitor and dwell statistics) and
// a frame-local set of who is visible right now. The two are kept
// separate on purpose: "currently on screen" and "ever seen" are
// different questions and must not share a map.

use crate::types::{ObjectClass, PeopleStats, TrackObservation};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct PeopleAnalytics {
    /// track_id -> timestamp of first-ever appearance (write-once)
    first_seen: HashMap<u64, f64>,
    /// track_id -> timestamp of most recent appearance
    last_seen: HashMap<u64, f64>,
    /// Person ids visible in the most recent update, rebuilt each call
    visible: HashSet<u64>,
}

impl PeopleAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's track list into the state. Only `person` tracks
    /// are considered; everything else is ignored with no side effects.
    pub fn update(&mut self, tracks: &[TrackObservation], now_secs: f64) {
        self.visible.clear();

        for track in tracks {
            if track.label != ObjectClass::Person {
                continue;
            }
            self.visible.insert(track.track_id);
            self.first_seen.entry(track.track_id).or_insert(now_secs);
            self.last_seen.insert(track.track_id, now_secs);
        }
    }

    /// People visible in the most recent frame.
    pub fn current_count(&self) -> usize {
        self.visible.len()
    }

    /// Total distinct people ever observed. Non-decreasing.
    pub fn unique_count(&self) -> usize {
        self.first_seen.len()
    }

    /// Seconds between an id's first and latest observation.
    pub fn dwell_time(&self, track_id: u64) -> Option<f64> {
        let first = self.first_seen.get(&track_id)?;
        let last = self.last_seen.get(&track_id)?;
        Some(last - first)
    }

    /// Mean dwell time over everyone ever observed, 0 when nobody has
    /// appeared yet.
    pub fn average_dwell_secs(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (id, first) in &self.first_seen {
            if let Some(last) = self.last_seen.get(id) {
                sum += last - first;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn stats(&self) -> PeopleStats {
        PeopleStats {
            current: self.current_count(),
            unique: self.unique_count(),
            avg_dwell_secs: self.average_dwell_secs(),
        }
    }
}
