// src/main.rs

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use traffic_analytics::{
    Config, JsonlSource, PipelineMetrics, SessionConfig, SnapshotPublisher, StreamWorker,
};
use walkdir::WalkDir;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚦 Smart Traffic & Crowd Analytics starting");
    info!("✓ Configuration loaded from {}", config_path);

    let logs = find_detection_logs(&config.replay.input_dir);
    if logs.is_empty() {
        error!("No detection logs (*.jsonl) found in {}", config.replay.input_dir);
        return Ok(());
    }
    info!("Found {} detection log(s) to replay", logs.len());

    let publisher = Arc::new(SnapshotPublisher::new(config.publisher.clone()));

    // Real-time observer: logs every pushed snapshot, the way a
    // WebSocket consumer would render it
    let mut observer = publisher.subscribe();
    tokio::spawn(async move {
        while let Some(snapshot) = observer.recv().await {
            match serde_json::to_string(&*snapshot) {
                Ok(json) => info!("📊 {}", json),
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            }
        }
    });

    let mut worker = StreamWorker::new();

    for (idx, path) in logs.iter().enumerate() {
        info!(
            "Replaying stream {}/{}: {}",
            idx + 1,
            logs.len(),
            path.display()
        );

        let source = match JsonlSource::open(path, config.replay.frame_stride) {
            Ok(source) => source,
            Err(e) => {
                error!("Skipping {}: {:#}", path.display(), e);
                continue;
            }
        };

        let metrics = PipelineMetrics::new();
        worker.start(
            source,
            SessionConfig {
                tracker: config.tracker.clone(),
                congestion: config.congestion.clone(),
            },
            publisher.clone(),
            metrics.clone(),
        )?;
        worker.join().await?;

        let summary = metrics.summary();
        info!("✓ Stream replayed");
        info!("  Frames processed: {}", summary.total_frames);
        info!("  Detections ingested: {}", summary.detections_in);
        info!("  Snapshots published: {}", summary.snapshots_published);
        info!("  Processing speed: {:.1} FPS", summary.fps);
    }

    if let Some(snapshot) = publisher.latest() {
        info!(
            "Final state: {} people visible ({} unique, {:.1}s avg dwell), {} vehicles, congestion {}",
            snapshot.people.current,
            snapshot.people.unique,
            snapshot.people.avg_dwell_secs,
            snapshot.vehicles.current,
            snapshot.vehicles.congestion
        );
    }

    Ok(())
}

fn find_detection_logs(input_dir: &str) -> Vec<PathBuf> {
    let mut logs: Vec<PathBuf> = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    logs.sort();
    logs
}
