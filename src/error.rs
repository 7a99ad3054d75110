// src/error.rs

use thiserror::Error;

/// Errors surfaced by the streaming pipeline. Everything else flows
/// through `anyhow` at the application boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A session is already running for this stream; callers must stop
    /// it explicitly before starting another.
    #[error("a stream session is already active")]
    StreamActive,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
