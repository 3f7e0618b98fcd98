//! Frame I/O for the Lane Tracking Pipeline
//!
//! Provides the frame plumbing around the lane tracker:
//! - Decoded video frames (RGB/BGR/grayscale, 8-bit)
//! - Frame sources (image sequences on disk)
//! - Output sinks for annotated and bird's-eye images

pub mod frame;
pub mod sink;
pub mod source;

pub use frame::{PixelFormat, VideoFrame};
pub use sink::{FrameSink, ImageDirSink};
pub use source::{FrameSource, ImageSequenceSource};

use std::path::PathBuf;
use thiserror::Error;

/// Frame I/O error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
