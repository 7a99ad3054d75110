// src/pipeline/mod.rs

pub mod metrics;
pub mod publisher;
pub mod worker;

pub use metrics::PipelineMetrics;
pub use publisher::{MetricsObserver, SnapshotPublisher};
pub use worker::{SessionConfig, StreamWorker};
