//! Binary lane-pixel masks

use image::{GrayImage, Luma};

/// Single-channel mask whose pixels are either 0 or 255
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// Value stored for lane pixels
    pub const ON: u8 = 255;

    /// All-zero mask
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Build a mask from a per-pixel predicate
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { Self::ON } else { 0 }])
        }))
    }

    /// Mark every non-zero pixel of a grayscale image
    pub fn from_nonzero(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| image.get_pixel(x, y)[0] != 0)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Whether (x, y) is a lane pixel; out-of-bounds reads are `false`
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.0.get_pixel(x, y)[0] != 0
    }

    /// Mark or clear a pixel; out-of-bounds writes are ignored
    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if x < self.width() && y < self.height() {
            self.0.put_pixel(x, y, Luma([if on { Self::ON } else { 0 }]));
        }
    }

    /// Pixel-wise OR with another mask of the same size
    pub fn union(&self, other: &BinaryMask) -> BinaryMask {
        Self::from_fn(self.width(), self.height(), |x, y| self.get(x, y) || other.get(x, y))
    }

    /// Number of lane pixels
    pub fn count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v != 0).count()
    }

    /// Lane pixel coordinates in row-major order
    pub fn lane_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(x, y, _)| (x, y))
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }
}
