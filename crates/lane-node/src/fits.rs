//! JSON-lines log of lane detections

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lane_tracker::{LaneOutput, SearchMode, TrackingState};
use serde::{Deserialize, Serialize};

use crate::NodeError;

/// One detection as consumed by the downstream planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub sequence: u32,
    pub timestamp_ns: u64,
    pub state: TrackingState,
    pub mode: SearchMode,
    /// Left boundary [a, b, c] of x(y) = a*y^2 + b*y + c, bird's-eye pixels
    pub left: [f64; 3],
    pub right: [f64; 3],
}

impl From<&LaneOutput> for FitRecord {
    fn from(output: &LaneOutput) -> Self {
        Self {
            sequence: output.sequence,
            timestamp_ns: output.timestamp_ns,
            state: output.state,
            mode: output.mode,
            left: output.left_fit.coefficients(),
            right: output.right_fit.coefficients(),
        }
    }
}

/// Append-only `fits.jsonl` writer
pub struct FitLog {
    path: PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

impl FitLog {
    /// Create (truncate) the log file
    pub fn create(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| NodeError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    /// Write one record and flush it
    pub fn append(&mut self, record: &FitRecord) -> Result<(), NodeError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|source| NodeError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> usize {
        self.records
    }
}
