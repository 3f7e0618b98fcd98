//! Frame sources

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::{FrameError, VideoFrame};

/// Extensions accepted by [`ImageSequenceSource`]
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Anything that yields decoded frames one at a time
pub trait FrameSource {
    /// Next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, FrameError>;
}

/// Replays a directory of still images as a video stream, in lexical file order
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    frame_interval: Duration,
}

impl ImageSequenceSource {
    /// Open a directory of frames (default 30fps timestamps)
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, FrameError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| FrameError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| FrameError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        info!("Opened image sequence {} ({} frames)", dir.display(), paths.len());

        Ok(Self {
            paths,
            cursor: 0,
            frame_interval: Duration::from_nanos(33_333_333),
        })
    }

    /// Set the spacing of synthesized capture timestamps
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Total frames in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the sequence has no frames
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, FrameError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };

        // Advance first so an unreadable file is skipped, leaving a sequence gap
        let sequence = self.cursor as u32;
        self.cursor += 1;

        let img = image::open(path).map_err(|source| FrameError::Decode {
            path: path.clone(),
            source,
        })?;
        let timestamp_ns = self.frame_interval.as_nanos() as u64 * sequence as u64;

        debug!("Decoded frame {} from {}", sequence, path.display());
        Ok(Some(VideoFrame::from_rgb_image(img.to_rgb8(), timestamp_ns, sequence)))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("frame-io-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_reads_images_in_order() {
        let dir = scratch_dir("source-order");
        RgbImage::from_pixel(4, 2, image::Rgb([9, 9, 9])).save(dir.join("b.png")).unwrap();
        RgbImage::from_pixel(4, 2, image::Rgb([1, 1, 1])).save(dir.join("a.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(&dir)
            .unwrap()
            .with_frame_interval(Duration::from_millis(100));
        assert_eq!(source.len(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), Some([1, 1, 1]));
        assert_eq!(first.sequence, 0);

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0), Some([9, 9, 9]));
        assert_eq!(second.timestamp_ns, 100_000_000);

        assert!(source.next_frame().unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unreadable_frame_is_skipped() {
        let dir = scratch_dir("source-corrupt");
        std::fs::write(dir.join("a.png"), b"not really a png").unwrap();
        RgbImage::from_pixel(2, 2, image::Rgb([5, 5, 5])).save(dir.join("b.png")).unwrap();

        let mut source = ImageSequenceSource::open(&dir).unwrap();
        assert!(matches!(source.next_frame(), Err(FrameError::Decode { .. })));

        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.sequence, 1);
        assert!(source.next_frame().unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory() {
        let result = ImageSequenceSource::open("/nonexistent/frames/dir");
        assert!(matches!(result, Err(FrameError::Io { .. })));
    }
}
