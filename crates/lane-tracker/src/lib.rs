//! Lane Boundary Tracking
//!
//! Per-frame lane perception for a forward-facing road camera:
//! - Binarization (gradient + saturation fusion)
//! - Bird's-eye rectification through a calibrated homography
//! - Sliding-window and prior-constrained quadratic curve search
//! - Temporal smoothing and a SEARCHING/TRACKING state machine

pub mod annotate;
pub mod binarize;
pub mod config;
pub mod controller;
pub mod fit;
pub mod homography;
pub mod mask;
pub mod rectify;
pub mod search;
pub mod track;

pub use binarize::Binarizer;
pub use config::{BinarizerConfig, CalibrationConfig, LaneConfig, SearchConfig};
pub use controller::{LaneOutput, TrackingController, TrackingState, TrackingStats};
pub use fit::{LaneFit, LaneSide, Polynomial};
pub use homography::Homography;
pub use mask::BinaryMask;
pub use rectify::{Interpolation, Rectifier};
pub use search::{CurveSearch, LanePair, SearchError, SearchMode, SearchWindow};
pub use track::LaneTrack;

use thiserror::Error;

/// Lane tracking error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaneError {
    #[error("Malformed input frame: {0}")]
    MalformedInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
