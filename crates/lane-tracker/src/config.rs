//! Lane tracking configuration

use serde::{Deserialize, Serialize};

use crate::LaneError;

/// Camera-to-canvas calibration.
///
/// Points are ordered top-left, top-right, bottom-left, bottom-right; source
/// points are in camera pixels, destination points in bird's-eye canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Road trapezoid in the camera image
    pub source_points: [[f64; 2]; 4],

    /// Matching rectangle on the bird's-eye canvas
    pub destination_points: [[f64; 2]; 4],

    /// Bird's-eye canvas width (pixels)
    pub canvas_width: u32,

    /// Bird's-eye canvas height (pixels)
    pub canvas_height: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::for_canvas(
            [[500.0, 254.0], [750.0, 254.0], [200.0, 375.0], [800.0, 375.0]],
            1280,
            720,
        )
    }
}

impl CalibrationConfig {
    /// Map a source trapezoid onto the full corners of a canvas
    pub fn for_canvas(source_points: [[f64; 2]; 4], canvas_width: u32, canvas_height: u32) -> Self {
        let w = canvas_width as f64;
        let h = canvas_height as f64;
        Self {
            source_points,
            destination_points: [[0.0, 0.0], [w, 0.0], [0.0, h], [w, h]],
            canvas_width,
            canvas_height,
        }
    }

    /// Simulator front camera (640x480)
    pub fn simulator() -> Self {
        Self::for_canvas(
            [[240.0, 280.0], [400.0, 275.0], [65.0, 380.0], [610.0, 380.0]],
            640,
            480,
        )
    }

    /// Wide-mount dashcam recording
    pub fn wide_dashcam() -> Self {
        Self::for_canvas(
            [[450.0, 250.0], [700.0, 250.0], [200.0, 360.0], [900.0, 360.0]],
            1280,
            720,
        )
    }

    /// Identity mapping over a `width` x `height` image (no perspective change)
    pub fn identity(width: u32, height: u32) -> Self {
        let w = width as f64;
        let h = height as f64;
        Self::for_canvas([[0.0, 0.0], [w, 0.0], [0.0, h], [w, h]], width, height)
    }
}

/// Binarizer thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizerConfig {
    /// Gaussian blur sigma applied before the gradient (1.1 ~ 5x5 kernel)
    pub blur_sigma: f32,

    /// Scaled gradient magnitude must exceed this
    pub gradient_min: u8,

    /// Scaled gradient magnitude upper bound (inclusive)
    pub gradient_max: u8,

    /// HLS saturation must exceed this
    pub saturation_min: u8,

    /// HLS saturation upper bound (inclusive)
    pub saturation_max: u8,
}

impl Default for BinarizerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            gradient_min: 30,
            gradient_max: 255,
            saturation_min: 100,
            saturation_max: 255,
        }
    }
}

/// Curve search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of sliding windows stacked over the image height
    pub window_count: u32,

    /// Half-width of a sliding window (pixels)
    pub window_margin: u32,

    /// Pixels a window must exceed before the next window recentres
    pub min_pixels: usize,

    /// Lateral band around a prior curve for the constrained search (pixels)
    pub search_margin: f64,

    /// Bottom fraction of the image used for the base histogram
    pub histogram_fraction: f64,

    /// Columns ignored at each image edge when locating the base peaks
    pub edge_margin: u32,

    /// Minimum support pixels for a quadratic fit
    pub min_fit_pixels: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            window_count: 9,
            window_margin: 100,
            min_pixels: 50,
            search_margin: 100.0,
            histogram_fraction: 0.5,
            edge_margin: 100,
            min_fit_pixels: 3,
        }
    }
}

/// Lane tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Homography calibration
    pub calibration: CalibrationConfig,

    /// Binarizer thresholds
    pub binarizer: BinarizerConfig,

    /// Curve search parameters
    pub search: SearchConfig,

    /// Accepted fits averaged per lane side
    pub history_capacity: usize,

    /// Seed each frame from the smoothed history (off = blind search every frame)
    pub temporal_smoothing: bool,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            binarizer: BinarizerConfig::default(),
            search: SearchConfig::default(),
            history_capacity: 5,
            temporal_smoothing: true,
        }
    }
}

impl LaneConfig {
    /// Configuration for the simulator camera
    pub fn simulator() -> Self {
        Self {
            calibration: CalibrationConfig::simulator(),
            ..Default::default()
        }
    }

    /// Check parameters that would make the pipeline meaningless
    pub fn validate(&self) -> Result<(), LaneError> {
        let cal = &self.calibration;
        if cal.canvas_width == 0 || cal.canvas_height == 0 {
            return Err(LaneError::Configuration(format!(
                "canvas must be non-empty, got {}x{}",
                cal.canvas_width, cal.canvas_height
            )));
        }
        if self.history_capacity == 0 {
            return Err(LaneError::Configuration(
                "history_capacity must be at least 1".into(),
            ));
        }

        let bin = &self.binarizer;
        if !(bin.blur_sigma.is_finite() && bin.blur_sigma > 0.0) {
            return Err(LaneError::Configuration(format!(
                "blur_sigma must be positive, got {}",
                bin.blur_sigma
            )));
        }
        if bin.gradient_min > bin.gradient_max {
            return Err(LaneError::Configuration(format!(
                "gradient threshold [{}, {}] is empty",
                bin.gradient_min, bin.gradient_max
            )));
        }
        if bin.saturation_min > bin.saturation_max {
            return Err(LaneError::Configuration(format!(
                "saturation threshold [{}, {}] is empty",
                bin.saturation_min, bin.saturation_max
            )));
        }

        let search = &self.search;
        if search.window_count == 0 {
            return Err(LaneError::Configuration("window_count must be at least 1".into()));
        }
        if search.window_margin == 0 {
            return Err(LaneError::Configuration("window_margin must be at least 1".into()));
        }
        if !(search.search_margin.is_finite() && search.search_margin > 0.0) {
            return Err(LaneError::Configuration(format!(
                "search_margin must be positive, got {}",
                search.search_margin
            )));
        }
        if !(search.histogram_fraction > 0.0 && search.histogram_fraction <= 1.0) {
            return Err(LaneError::Configuration(format!(
                "histogram_fraction must be in (0, 1], got {}",
                search.histogram_fraction
            )));
        }
        if search.min_fit_pixels < 3 {
            return Err(LaneError::Configuration(
                "min_fit_pixels must be at least 3 for a quadratic fit".into(),
            ));
        }

        Ok(())
    }
}
