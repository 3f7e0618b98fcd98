//! Output sinks for annotated frames

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::FrameError;

/// Receives the two images produced for every detected frame
pub trait FrameSink {
    /// Publish the annotated camera frame and the bird's-eye diagnostic view
    fn publish(
        &mut self,
        sequence: u32,
        annotated: &RgbImage,
        birdseye: &RgbImage,
    ) -> Result<(), FrameError>;
}

/// Writes outputs as numbered PNG files into a directory
pub struct ImageDirSink {
    dir: PathBuf,
    published: usize,
}

impl ImageDirSink {
    /// Create the output directory if needed
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, FrameError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| FrameError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, published: 0 })
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of frame pairs written so far
    pub fn published(&self) -> usize {
        self.published
    }

    fn save(&self, image: &RgbImage, name: String) -> Result<(), FrameError> {
        let path = self.dir.join(name);
        image
            .save(&path)
            .map_err(|source| FrameError::Encode { path, source })
    }
}

impl FrameSink for ImageDirSink {
    fn publish(
        &mut self,
        sequence: u32,
        annotated: &RgbImage,
        birdseye: &RgbImage,
    ) -> Result<(), FrameError> {
        self.save(annotated, format!("annotate_{:06}.png", sequence))?;
        self.save(birdseye, format!("birdseye_{:06}.png", sequence))?;
        self.published += 1;
        debug!("Published frame {} to {}", sequence, self.dir.display());
        Ok(())
    }
}
