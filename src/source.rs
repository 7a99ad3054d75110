// src/source.rs
//
// Seam to the external detector. The core never runs inference itself;
// it consumes per-frame detection batches from anything implementing
// DetectionSource. JsonlSource replays a recorded detection log so the
// whole pipeline runs end to end without a model.

use crate::types::{BoundingBox, Detection, ObjectClass};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// One sampled frame's worth of detector output.
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub frame_id: u64,
    pub timestamp_secs: f64,
    pub detections: Vec<Detection>,
}

/// Per-frame detection feed. `Ok(None)` signals end of stream.
pub trait DetectionSource: Send {
    fn next_frame(&mut self) -> Result<Option<FrameDetections>>;
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    bbox: [f32; 4],
    label: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
struct RawFrameRecord {
    frame_id: u64,
    timestamp_ms: f64,
    detections: Vec<RawDetection>,
}

/// Replays a detection log with one JSON frame record per line:
/// `{"frame_id": 1, "timestamp_ms": 200.0, "detections": [{"bbox": [0,0,10,10], "label": "person", "score": 0.9}]}`
pub struct JsonlSource<R> {
    reader: R,
    /// Keep every Nth record (frame-rate down-sampling)
    frame_stride: u64,
    records_read: u64,
    line_no: u64,
}

impl JsonlSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, frame_stride: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open detection log {}", path.display()))?;
        Ok(Self::from_reader(BufReader::new(file), frame_stride))
    }
}

impl<R: BufRead> JsonlSource<R> {
    pub fn from_reader(reader: R, frame_stride: u64) -> Self {
        Self {
            reader,
            frame_stride: frame_stride.max(1),
            records_read: 0,
            line_no: 0,
        }
    }

    fn parse_record(&self, record: RawFrameRecord) -> FrameDetections {
        let mut detections = Vec::with_capacity(record.detections.len());
        for raw in record.detections {
            let Some(label) = ObjectClass::parse(&raw.label) else {
                warn!(
                    "Frame {}: unknown label '{}', dropping detection",
                    record.frame_id, raw.label
                );
                continue;
            };
            detections.push(Detection {
                bbox: BoundingBox::from(raw.bbox),
                label,
                confidence: raw.score,
            });
        }
        FrameDetections {
            frame_id: record.frame_id,
            timestamp_secs: record.timestamp_ms / 1000.0,
            detections,
        }
    }
}

impl<R: BufRead + Send> DetectionSource for JsonlSource<R> {
    fn next_frame(&mut self) -> Result<Option<FrameDetections>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: RawFrameRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed record on line {}: {}", self.line_no, e);
                    continue;
                }
            };

            let keep = self.records_read % self.frame_stride == 0;
            self.records_read += 1;
            if !keep {
                continue;
            }

            return Ok(Some(self.parse_record(record)));
        }
    }
}
