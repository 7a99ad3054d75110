// src/pipeline/worker.rs
//
// Producer side of the pipeline. One session per stream: the frame
// loop runs on a dedicated blocking task, owns the tracker and both
// aggregators, and publishes a snapshot per processed frame. All
// session state dies with the task, so restarting a stream starts
// from empty counters.

use crate::analytics::{PeopleAnalytics, VehicleAnalytics};
use crate::error::PipelineError;
use crate::pipeline::{PipelineMetrics, SnapshotPublisher};
use crate::source::DetectionSource;
use crate::tracker::IoUTracker;
use crate::types::{AnalyticsSnapshot, CongestionConfig, TrackerConfig};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub congestion: CongestionConfig,
}

struct ActiveSession {
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct StreamWorker {
    session: Option<ActiveSession>,
}

impl StreamWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start a session for this stream. Rejected with `StreamActive`
    /// while a previous session is still running; callers must stop it
    /// first.
    pub fn start<S>(
        &mut self,
        source: S,
        config: SessionConfig,
        publisher: Arc<SnapshotPublisher>,
        metrics: PipelineMetrics,
    ) -> Result<(), PipelineError>
    where
        S: DetectionSource + 'static,
    {
        if self.is_running() {
            return Err(PipelineError::StreamActive);
        }

        let alive = Arc::new(AtomicBool::new(true));
        let flag = alive.clone();
        let handle = tokio::task::spawn_blocking(move || {
            run_session(source, flag, config, publisher, metrics)
        });

        self.session = Some(ActiveSession { alive, handle });
        Ok(())
    }

    /// Request the session to end at the next frame boundary.
    /// Idempotent: stopping a stopped worker is a no-op.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            session.alive.store(false, Ordering::SeqCst);
        }
    }

    /// Wait for the current session to finish.
    pub async fn join(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.handle.await?;
        }
        Ok(())
    }
}

fn run_session<S: DetectionSource>(
    mut source: S,
    alive: Arc<AtomicBool>,
    config: SessionConfig,
    publisher: Arc<SnapshotPublisher>,
    metrics: PipelineMetrics,
) {
    // Session-scoped state: dropped when the loop exits
    let mut tracker = IoUTracker::new(config.tracker);
    let mut people = PeopleAnalytics::new();
    let mut vehicles = VehicleAnalytics::new(config.congestion);

    info!("Stream session started");

    loop {
        if !alive.load(Ordering::SeqCst) {
            info!("Stop requested, ending session at frame boundary");
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Detection source exhausted");
                break;
            }
            Err(e) => {
                error!("Detection source failed: {:#}", e);
                break;
            }
        };

        metrics.inc(&metrics.total_frames);
        metrics.add(&metrics.detections_in, frame.detections.len() as u64);

        let tracks = tracker.update(&frame.detections);
        people.update(&tracks, frame.timestamp_secs);
        vehicles.update(&tracks);
        metrics.set(&metrics.active_tracks, tracker.active_track_count() as u64);

        publisher.publish(AnalyticsSnapshot {
            frame_id: frame.frame_id,
            timestamp_secs: frame.timestamp_secs,
            people: people.stats(),
            vehicles: vehicles.stats(),
        });
        metrics.inc(&metrics.snapshots_published);
    }

    let summary = metrics.summary();
    info!(
        "Session finished: {} frames, {} detections, {} snapshots, {:.1} FPS",
        summary.total_frames, summary.detections_in, summary.snapshots_published, summary.fps
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FrameDetections;
    use crate::types::{BoundingBox, Detection, ObjectClass, PublisherConfig};
    use std::time::Duration;

    struct VecSource {
        frames: std::vec::IntoIter<FrameDetections>,
        delay: Option<Duration>,
    }

    impl VecSource {
        fn new(frames: Vec<FrameDetections>) -> Self {
            Self {
                frames: frames.into_iter(),
                delay: None,
            }
        }

        fn slow(frames: Vec<FrameDetections>, delay: Duration) -> Self {
            Self {
                frames: frames.into_iter(),
                delay: Some(delay),
            }
        }
    }

    impl DetectionSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<FrameDetections>> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            Ok(self.frames.next())
        }
    }

    fn det(label: ObjectClass, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            label,
            confidence: 0.9,
        }
    }

    fn frame(frame_id: u64, detections: Vec<Detection>) -> FrameDetections {
        FrameDetections {
            frame_id,
            timestamp_secs: frame_id as f64 * 0.2,
            detections,
        }
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            tracker: TrackerConfig::default(),
            congestion: CongestionConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_pipeline_produces_snapshots() {
        let publisher = Arc::new(SnapshotPublisher::new(PublisherConfig::default()));
        let metrics = PipelineMetrics::new();
        let mut worker = StreamWorker::new();

        let frames = vec![
            frame(
                1,
                vec![
                    det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0),
                    det(ObjectClass::Car, 50.0, 50.0, 80.0, 80.0),
                    det(ObjectClass::Car, 200.0, 50.0, 230.0, 80.0),
                ],
            ),
            frame(
                2,
                vec![
                    det(ObjectClass::Person, 1.0, 1.0, 11.0, 11.0),
                    det(ObjectClass::Car, 51.0, 51.0, 81.0, 81.0),
                    det(ObjectClass::Car, 201.0, 51.0, 231.0, 81.0),
                ],
            ),
        ];

        worker
            .start(
                VecSource::new(frames),
                session_config(),
                publisher.clone(),
                metrics.clone(),
            )
            .unwrap();
        worker.join().await.unwrap();

        let snapshot = publisher.latest().expect("a snapshot was published");
        assert_eq!(snapshot.frame_id, 2);
        assert_eq!(snapshot.people.current, 1);
        assert_eq!(snapshot.people.unique, 1);
        assert_eq!(snapshot.vehicles.current, 2);
        assert_eq!(snapshot.vehicles.per_class.get(&ObjectClass::Car), Some(&2));
        assert_eq!(metrics.summary().total_frames, 2);
        assert_eq!(metrics.summary().snapshots_published, 2);
    }

    #[tokio::test]
    async fn test_start_while_active_is_a_conflict() {
        let publisher = Arc::new(SnapshotPublisher::new(PublisherConfig::default()));
        let mut worker = StreamWorker::new();

        let long_running: Vec<FrameDetections> = (1..=500).map(|i| frame(i, vec![])).collect();
        worker
            .start(
                VecSource::slow(long_running, Duration::from_millis(5)),
                session_config(),
                publisher.clone(),
                PipelineMetrics::new(),
            )
            .unwrap();

        let conflict = worker.start(
            VecSource::new(vec![]),
            session_config(),
            publisher.clone(),
            PipelineMetrics::new(),
        );
        assert!(matches!(conflict, Err(PipelineError::StreamActive)));

        worker.stop();
        worker.stop(); // idempotent
        worker.join().await.unwrap();
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_restart_resets_session_state() {
        let publisher = Arc::new(SnapshotPublisher::new(PublisherConfig::default()));
        let mut worker = StreamWorker::new();

        worker
            .start(
                VecSource::new(vec![frame(
                    1,
                    vec![det(ObjectClass::Person, 0.0, 0.0, 10.0, 10.0)],
                )]),
                session_config(),
                publisher.clone(),
                PipelineMetrics::new(),
            )
            .unwrap();
        worker.join().await.unwrap();
        assert_eq!(publisher.latest().unwrap().people.unique, 1);

        // New session: all counters start from empty
        worker
            .start(
                VecSource::new(vec![frame(1, vec![])]),
                session_config(),
                publisher.clone(),
                PipelineMetrics::new(),
            )
            .unwrap();
        worker.join().await.unwrap();
        assert_eq!(publisher.latest().unwrap().people.unique, 0);
        assert_eq!(publisher.latest().unwrap().people.current, 0);
    }

    #[tokio::test]
    async fn test_stop_on_idle_worker_is_a_no_op() {
        let worker = StreamWorker::new();
        worker.stop();
        assert!(!worker.is_running());
    }
}
