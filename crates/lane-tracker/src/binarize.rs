//! Lane pixel binarization
//!
//! Fuses two cues with OR: an adaptive Sobel gradient threshold and an HLS
//! saturation threshold. Gradient picks up marking edges under even lighting,
//! saturation picks up faded or blurred paint.

use frame_io::VideoFrame;
use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::config::BinarizerConfig;
use crate::mask::BinaryMask;

/// Frame-to-mask binarizer
#[derive(Debug, Clone)]
pub struct Binarizer {
    config: BinarizerConfig,
}

impl Binarizer {
    pub fn new(config: &BinarizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Binarize a frame into a lane-pixel mask of the same size.
    ///
    /// Frames whose buffer does not match their declared size yield an
    /// all-zero mask.
    pub fn binarize(&self, frame: &VideoFrame) -> BinaryMask {
        let (width, height) = (frame.width, frame.height);
        let Some(rgb) = frame.to_rgb_image() else {
            return BinaryMask::new(width, height);
        };
        let Some(gray) = GrayImage::from_raw(width, height, frame.to_grayscale()) else {
            return BinaryMask::new(width, height);
        };

        let edges = self.gradient_mask(&gray);
        let color = self.color_mask(&rgb);
        edges.union(&color)
    }

    /// Adaptive gradient mask: |Gx| + |Gy| rescaled by the frame's own maximum
    pub fn gradient_mask(&self, gray: &GrayImage) -> BinaryMask {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return BinaryMask::new(width, height);
        }

        // gaussian_blur_f32 panics on a non-positive sigma
        let sigma = self.config.blur_sigma;
        let (gx, gy) = if sigma.is_finite() && sigma > 0.0 {
            let blurred = gaussian_blur_f32(gray, sigma);
            (horizontal_sobel(&blurred), vertical_sobel(&blurred))
        } else {
            (horizontal_sobel(gray), vertical_sobel(gray))
        };

        let magnitude: Vec<f32> = gx
            .as_raw()
            .iter()
            .zip(gy.as_raw())
            .map(|(&dx, &dy)| (dx as f32).abs() + (dy as f32).abs())
            .collect();

        let max = magnitude.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return BinaryMask::new(width, height);
        }

        let (lo, hi) = (self.config.gradient_min, self.config.gradient_max);
        BinaryMask::from_fn(width, height, |x, y| {
            let m = magnitude[(y * width + x) as usize];
            let scaled = (255.0 * m / max) as u8;
            scaled > lo && scaled <= hi
        })
    }

    /// Saturation mask from the HLS color space
    pub fn color_mask(&self, rgb: &RgbImage) -> BinaryMask {
        let (lo, hi) = (self.config.saturation_min, self.config.saturation_max);
        BinaryMask::from_fn(rgb.width(), rgb.height(), |x, y| {
            let s = hls_saturation(rgb.get_pixel(x, y).0);
            s > lo && s <= hi
        })
    }
}

/// HLS saturation of an 8-bit RGB pixel, scaled to 0-255
pub fn hls_saturation([r, g, b]: [u8; 3]) -> u8 {
    let max = r.max(g).max(b) as f32 / 255.0;
    let min = r.min(g).min(b) as f32 / 255.0;
    let diff = max - min;
    if diff <= f32::EPSILON {
        return 0;
    }

    let lightness = (max + min) / 2.0;
    let s = if lightness < 0.5 {
        diff / (max + min)
    } else {
        diff / (2.0 - max - min)
    };
    (s * 255.0).round().clamp(0.0, 255.0) as u8
}
