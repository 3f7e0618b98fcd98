//! Video frame types and processing

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded 8-bit video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Interleaved pixel data (width * height * channels)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Channel layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgb24,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame with an explicit pixel format
    pub fn with_format(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded RGB image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// A frame filled with a single RGB color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, 0, 0)
    }

    /// Number of bytes `data` must hold for the declared size and format
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    /// Get pixel at (x, y) as RGB
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        let px = self.data.get(idx..idx + channels)?;
        Some(match self.format {
            PixelFormat::Rgb24 => [px[0], px[1], px[2]],
            PixelFormat::Bgr24 => [px[2], px[1], px[0]],
            PixelFormat::Gray8 => [px[0], px[0], px[0]],
        })
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(self.format.channels()) {
            let (r, g, b) = match self.format {
                PixelFormat::Rgb24 => (pixel[0], pixel[1], pixel[2]),
                PixelFormat::Bgr24 => (pixel[2], pixel[1], pixel[0]),
                PixelFormat::Gray8 => {
                    gray.push(pixel[0]);
                    continue;
                }
            };
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114).round() as u8;
            gray.push(y);
        }
        gray
    }

    /// Convert to an RGB image, reordering channels as needed.
    ///
    /// Returns `None` when `data` does not match the declared dimensions.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.data.len() != self.expected_len() {
            return None;
        }
        let rgb = match self.format {
            PixelFormat::Rgb24 => self.data.clone(),
            PixelFormat::Bgr24 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
            PixelFormat::Gray8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        RgbImage::from_raw(self.width, self.height, rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bgr_pixel_order() {
        let frame = VideoFrame::with_format(vec![10, 20, 30], 1, 1, PixelFormat::Bgr24, 0, 0);
        assert_eq!(frame.get_pixel(0, 0), Some([30, 20, 10]));

        let rgb = frame.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn test_grayscale_luminance() {
        let frame = VideoFrame::solid(2, 2, [255, 255, 255]);
        assert_eq!(frame.to_grayscale(), vec![255; 4]);

        let red = VideoFrame::solid(1, 1, [255, 0, 0]);
        assert_eq!(red.to_grayscale(), vec![76]);
    }

    #[test]
    fn test_length_mismatch_has_no_image() {
        let frame = VideoFrame::new(vec![0; 5], 2, 1, 0, 0);
        assert_eq!(frame.expected_len(), 6);
        assert!(frame.to_rgb_image().is_none());
        assert_eq!(frame.get_pixel(1, 0), None);
    }

    #[test]
    fn test_out_of_bounds_pixel() {
        let frame = VideoFrame::solid(4, 3, [1, 2, 3]);
        assert_eq!(frame.get_pixel(3, 2), Some([1, 2, 3]));
        assert_eq!(frame.get_pixel(4, 0), None);
    }

    proptest! {
        #[test]
        fn prop_rgb_and_bgr_agree_on_channel_order(
            width in 1u32..12,
            height in 1u32..12,
            seed in proptest::collection::vec(any::<u8>(), 432),
        ) {
            let len = (width * height * 3) as usize;
            let rgb_data = seed[..len].to_vec();
            let bgr_data: Vec<u8> = rgb_data
                .chunks_exact(3)
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect();

            let rgb = VideoFrame::with_format(rgb_data, width, height, PixelFormat::Rgb24, 0, 0);
            let bgr = VideoFrame::with_format(bgr_data, width, height, PixelFormat::Bgr24, 0, 0);

            for frame in [&rgb, &bgr] {
                let image = frame.to_rgb_image().unwrap();
                for y in 0..height {
                    for x in 0..width {
                        prop_assert_eq!(Some(image.get_pixel(x, y).0), frame.get_pixel(x, y));
                    }
                }
                prop_assert_eq!(frame.to_grayscale().len(), (width * height) as usize);
            }

            prop_assert_eq!(rgb.to_rgb_image(), bgr.to_rgb_image());
            prop_assert_eq!(rgb.to_grayscale(), bgr.to_grayscale());
        }
    }
}
