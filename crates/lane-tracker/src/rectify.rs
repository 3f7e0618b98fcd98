//! Bird's-eye rectification

use image::{ImageBuffer, Pixel, RgbImage};
pub use imageproc::geometric_transformations::Interpolation;
use imageproc::geometric_transformations::warp_into_with;
use tracing::debug;

use crate::config::CalibrationConfig;
use crate::homography::Homography;
use crate::mask::BinaryMask;
use crate::LaneError;

/// Pre-image for output pixels the homography sends to infinity
const OUTSIDE: (f32, f32) = (-1.0, -1.0);

/// Fixed camera <-> bird's-eye transform pair
#[derive(Debug, Clone)]
pub struct Rectifier {
    /// Camera view -> bird's-eye canvas
    forward: Homography,
    /// Bird's-eye canvas -> camera view
    inverse: Homography,
    canvas: (u32, u32),
}

impl Rectifier {
    /// Build the transform pair from calibration
    pub fn new(calibration: &CalibrationConfig) -> Result<Self, LaneError> {
        if calibration.canvas_width == 0 || calibration.canvas_height == 0 {
            return Err(LaneError::Configuration("bird's-eye canvas is empty".into()));
        }

        let forward = Homography::from_correspondences(
            &calibration.source_points,
            &calibration.destination_points,
        )?;
        let inverse = forward.inverse()?;

        debug!("Rectifier ready: forward = {:?}", forward.matrix());

        Ok(Self {
            forward,
            inverse,
            canvas: (calibration.canvas_width, calibration.canvas_height),
        })
    }

    pub fn forward(&self) -> &Homography {
        &self.forward
    }

    pub fn inverse(&self) -> &Homography {
        &self.inverse
    }

    /// Bird's-eye canvas (width, height)
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    /// Camera pixel -> canvas pixel
    pub fn project_to_birdseye(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        self.forward.project(x, y)
    }

    /// Canvas pixel -> camera pixel
    pub fn project_to_camera(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        self.inverse.project(x, y)
    }

    /// Rectify a camera-view mask onto the canvas (nearest neighbour, stays binary)
    pub fn warp_mask(&self, mask: &BinaryMask) -> BinaryMask {
        let warped = remap(
            mask.as_image(),
            &self.inverse,
            self.canvas,
            Interpolation::Nearest,
        );
        BinaryMask::from_nonzero(&warped)
    }

    /// Rectify a camera-view color image onto the canvas
    pub fn warp_rgb(&self, image: &RgbImage) -> RgbImage {
        remap(image, &self.inverse, self.canvas, Interpolation::Bilinear)
    }

    /// Project a canvas image back into a camera view of the given size
    pub fn unwarp_rgb(&self, image: &RgbImage, width: u32, height: u32) -> RgbImage {
        remap(image, &self.forward, (width, height), Interpolation::Bilinear)
    }
}

/// Warp `image` through `homography` (input -> output coordinates) into an
/// output of `size`. Pixels that map outside the input are zero.
pub fn warp<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    homography: &Homography,
    size: (u32, u32),
    interpolation: Interpolation,
) -> Result<ImageBuffer<P, Vec<u8>>, LaneError>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let sampler = homography.inverse()?;
    Ok(remap(image, &sampler, size, interpolation))
}

/// Fill each output pixel from the input location `output_to_input` maps it
/// to. The mapping stays in f64; only the sample position is narrowed.
fn remap<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    output_to_input: &Homography,
    (out_w, out_h): (u32, u32),
    interpolation: Interpolation,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let mut out = ImageBuffer::<P, Vec<u8>>::new(out_w, out_h);
    let zeros = [0u8; 4];
    let black = *P::from_slice(&zeros[..P::CHANNEL_COUNT as usize]);

    warp_into_with(
        image,
        |x, y| {
            output_to_input
                .project(x as f64, y as f64)
                .map_or(OUTSIDE, |[sx, sy]| (sx as f32, sy as f32))
        },
        interpolation,
        black,
        &mut out,
    );
    out
}
