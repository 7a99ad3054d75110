// src/config.rs

use crate::error::PipelineError;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.tracker.iou_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "tracker.iou_threshold must be in [0, 1], got {}",
                self.tracker.iou_threshold
            )));
        }
        if self.congestion.medium_threshold >= self.congestion.high_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "congestion thresholds must be ordered: medium {} >= high {}",
                self.congestion.medium_threshold, self.congestion.high_threshold
            )));
        }
        if self.replay.frame_stride == 0 {
            return Err(PipelineError::InvalidConfig(
                "replay.frame_stride must be at least 1".to_string(),
            ));
        }
        if self.publisher.observer_buffer == 0 {
            return Err(PipelineError::InvalidConfig(
                "publisher.observer_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
