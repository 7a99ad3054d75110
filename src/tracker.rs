// src/tracker.rs
//
// Class-aware multi-object tracker using greedy IoU matching.
// Lightweight and latency-oriented: no motion model, no re-identification,
// stable IDs for as long as the IoU stays decent.

use crate::types::{BoundingBox, Detection, ObjectClass, TrackObservation, TrackerConfig};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    label: ObjectClass,
    bbox: BoundingBox,
    hits: u32,
    /// Frames since the last successful match
    age: u32,
}

pub struct IoUTracker {
    config: TrackerConfig,
    next_id: u64,
    tracks: HashMap<u64, Track>,
}

impl IoUTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            next_id: 1,
            tracks: HashMap::new(),
        }
    }

    /// Number of tracks currently held in the store, including tracks
    /// past the visibility grace that are retained for re-matching.
    pub fn active_track_count(&self) -> usize {
        self.tracks.len()
    }

    fn spawn_track(&mut self, label: ObjectClass, bbox: BoundingBox) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.insert(
            id,
            Track {
                id,
                label,
                bbox,
                hits: 1,
                age: 0,
            },
        );
        debug!("New {} track #{}", label, id);
        id
    }

    /// Consume one frame's detections and return the currently visible
    /// tracks. An empty detection list is valid: existing tracks age and
    /// may expire. Detections with invalid geometry are dropped
    /// individually without aborting the call.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackObservation> {
        // Age all tracks; matches below reset this
        for track in self.tracks.values_mut() {
            track.age += 1;
        }

        // Group by label, rejecting malformed geometry at the door
        let mut by_label: HashMap<ObjectClass, Vec<&Detection>> = HashMap::new();
        for det in detections {
            if !det.bbox.is_valid() {
                warn!(
                    "Dropping {} detection with invalid bbox: {:?}",
                    det.label, det.bbox
                );
                continue;
            }
            by_label.entry(det.label).or_default().push(det);
        }

        // Class-aware matching: a track only ever competes for
        // detections of its own label
        for (label, dets) in by_label {
            self.match_label(label, &dets);
        }

        // Remove tracks absent for longer than max_age
        let max_age = self.config.max_age;
        self.tracks.retain(|id, track| {
            if track.age > max_age {
                debug!("Track #{} ({}) expired at age {}", id, track.label, track.age);
                false
            } else {
                true
            }
        });

        // Report only recently matched tracks; older survivors stay in
        // the store for short-gap re-matching but are not visible output
        let mut visible: Vec<TrackObservation> = self
            .tracks
            .values()
            .filter(|track| track.age <= self.config.visibility_grace)
            .map(|track| TrackObservation {
                track_id: track.id,
                label: track.label,
                bbox: track.bbox,
                hits: track.hits,
            })
            .collect();
        visible.sort_by_key(|obs| obs.track_id);
        visible
    }

    fn match_label(&mut self, label: ObjectClass, dets: &[&Detection]) {
        // Sorted for a consistent tie-break when IoU scores are equal
        let mut track_ids: Vec<u64> = self
            .tracks
            .values()
            .filter(|track| track.label == label)
            .map(|track| track.id)
            .collect();
        track_ids.sort_unstable();

        if track_ids.is_empty() {
            for det in dets {
                self.spawn_track(label, det.bbox);
            }
            return;
        }

        // IoU matrix: tracks x detections
        let iou: Vec<Vec<f32>> = track_ids
            .iter()
            .map(|tid| {
                let track_box = self.tracks[tid].bbox;
                dets.iter().map(|det| track_box.iou(&det.bbox)).collect()
            })
            .collect();

        let mut track_used = vec![false; track_ids.len()];
        let mut det_used = vec![false; dets.len()];

        // Greedy: repeatedly bind the best remaining pair until no pair
        // clears the threshold. One detection per track and vice versa.
        loop {
            let mut best = (0usize, 0usize);
            let mut best_score = f32::NEG_INFINITY;
            for (i, row) in iou.iter().enumerate() {
                if track_used[i] {
                    continue;
                }
                for (j, &score) in row.iter().enumerate() {
                    if !det_used[j] && score > best_score {
                        best_score = score;
                        best = (i, j);
                    }
                }
            }

            if best_score < self.config.iou_threshold {
                break;
            }

            let (i, j) = best;
            track_used[i] = true;
            det_used[j] = true;

            let track = self
                .tracks
                .get_mut(&track_ids[i])
                .expect("matched track id is in the store");
            track.bbox = dets[j].bbox;
            track.hits += 1;
            track.age = 0;
        }

        // Every unmatched detection births a new identity
        for (j, det) in dets.iter().enumerate() {
            if !det_used[j] {
                self.spawn_track(label, det.bbox);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: ObjectClass, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            label,
            confidence: 0.9,
        }
    }

    fn tracker() -> IoUTracker {
        IoUTracker::new(TrackerConfig::default())
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        assert!((a.iou(&b) - b.iou(&a)).abs() < 1e-6);
        assert!(a.iou(&b) > 0.0);
    }

    #[test]
    fn test_iou_degenerate_box_is_zero() {
        let point = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn test_id_stable_under_zero_motion() {
        let mut tracker = tracker();
        let mut id = None;
        for frame in 0..10 {
            let tracks = tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);
            assert_eq!(tracks.len(), 1, "frame {}", frame);
            match id {
                None => id = Some(tracks[0].track_id),
                Some(expected) => assert_eq!(tracks[0].track_id, expected),
            }
        }
        assert_eq!(tracker.active_track_count(), 1);
    }

    #[test]
    fn test_high_overlap_keeps_id_and_counts_hits() {
        let mut tracker = tracker();
        let first = tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);
        let second = tracker.update(&[det(ObjectClass::Person, 1.0, 1.0, 11.0, 11.0)]);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].track_id, second[0].track_id);
        assert_eq!(second[0].hits, 2);
    }

    #[test]
    fn test_class_homogeneous_matching() {
        let mut tracker = tracker();
        let first = tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);
        // Same box, different label: must become a new track, not a match
        let second = tracker.update(&[det(ObjectClass::Car, 0.0, 0.0, 10.0, 10.0)]);
        let car = second
            .iter()
            .find(|t| t.label == ObjectClass::Car)
            .expect("car track reported");
        assert_ne!(car.track_id, first[0].track_id);
        assert_eq!(car.hits, 1);
    }

    #[test]
    fn test_greedy_matching_is_one_to_one() {
        let mut tracker = tracker();
        tracker.update(&[
            det(ObjectClass::Car, 0.0, 0.0, 10.0, 10.0),
            det(ObjectClass::Car, 100.0, 100.0, 110.0, 110.0),
        ]);
        let tracks = tracker.update(&[
            det(ObjectClass::Car, 1.0, 1.0, 11.0, 11.0),
            det(ObjectClass::Car, 101.0, 101.0, 111.0, 111.0),
        ]);
        assert_eq!(tracks.len(), 2);
        assert_ne!(tracks[0].track_id, tracks[1].track_id);
        assert!(tracks.iter().all(|t| t.hits == 2));
    }

    #[test]
    fn test_visibility_grace_hides_stale_tracks() {
        let config = TrackerConfig {
            visibility_grace: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = IoUTracker::new(config);
        tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);

        // Two missed frames are still within grace
        assert_eq!(tracker.update(&[]).len(), 1);
        assert_eq!(tracker.update(&[]).len(), 1);
        // Third missed frame: retained internally, no longer reported
        assert_eq!(tracker.update(&[]).len(), 0);
        assert_eq!(tracker.active_track_count(), 1);

        // Re-appearing within max_age re-matches the same identity
        let tracks = tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 1);
        assert_eq!(tracks[0].hits, 2);
    }

    #[test]
    fn test_track_deleted_strictly_after_max_age() {
        let config = TrackerConfig {
            max_age: 20,
            ..TrackerConfig::default()
        };
        let mut tracker = IoUTracker::new(config);

        // Present for frames 1..=20
        for _ in 0..20 {
            tracker.update(&[det(ObjectClass::Car, 0.0, 0.0, 10.0, 10.0)]);
        }
        assert_eq!(tracker.active_track_count(), 1);

        // Absent for frames 21..=40: age reaches 20, still retained
        for _ in 0..20 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.active_track_count(), 1);

        // Frame 41: age 21 > max_age, deleted this cycle
        tracker.update(&[]);
        assert_eq!(tracker.active_track_count(), 0);
    }

    #[test]
    fn test_ids_never_reused() {
        let config = TrackerConfig {
            max_age: 1,
            ..TrackerConfig::default()
        };
        let mut tracker = IoUTracker::new(config);
        let first = tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);
        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.active_track_count(), 0);

        // Same location after deletion: brand-new, larger id
        let second = tracker.update(&[det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)]);
        assert!(second[0].track_id > first[0].track_id);
    }

    #[test]
    fn test_malformed_detection_dropped_not_fatal() {
        let mut tracker = tracker();
        let tracks = tracker.update(&[
            det(ObjectClass::Person, 10.0, 0.0, 0.0, 10.0), // x2 < x1
            det(ObjectClass::Person, f32::NAN, 0.0, 10.0, 10.0),
            det(ObjectClass::Person, 50.0, 50.0, 60.0, 60.0),
        ]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].bbox.x1, 50.0);
    }

    #[test]
    fn test_empty_update_on_empty_store() {
        let mut tracker = tracker();
        assert!(tracker.update(&[]).is_empty());
        assert_eq!(tracker.active_track_count(), 0);
    }

    #[test]
    fn test_low_iou_spawns_new_track() {
        let config = TrackerConfig {
            iou_threshold: 0.3,
            ..TrackerConfig::default()
        };
        let mut tracker = IoUTracker::new(config);
        tracker.update(&[det(ObjectClass::Car, 0.0, 0.0, 10.0, 10.0)]);
        // Barely overlapping: IoU well below threshold
        let tracks = tracker.update(&[det(ObjectClass::Car, 9.0, 9.0, 19.0, 19.0)]);
        // Old track still within grace plus the new one
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracker.active_track_count(), 2);
    }
}
