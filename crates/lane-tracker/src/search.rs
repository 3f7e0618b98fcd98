//! Lane curve search on the bird's-eye mask
//!
//! Two entry points share one fitting primitive:
//! - `search_full`: blind sliding-window search seeded by a column histogram
//! - `search_near`: keeps only pixels within a margin of the previous curves

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::SearchConfig;
use crate::fit::{LaneFit, LaneSide, Polynomial};
use crate::mask::BinaryMask;

/// Why a search pass produced no lane pair
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("{side} boundary has {found} pixels, need at least {needed}")]
    InsufficientPixels {
        side: LaneSide,
        found: usize,
        needed: usize,
    },

    #[error("{side} boundary pixels are degenerate for a quadratic fit")]
    DegenerateFit { side: LaneSide },
}

/// Which search produced a lane pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// Sliding-window search from scratch
    Full,
    /// Search around the previous smoothed curves
    Near,
}

/// A sliding window visited by the blind search, in canvas pixels.
///
/// Column bounds may fall outside the canvas near the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub side: LaneSide,
    pub x_low: i64,
    pub x_high: i64,
    pub y_low: u32,
    pub y_high: u32,
}

/// Result of one successful search pass
#[derive(Debug, Clone, PartialEq)]
pub struct LanePair {
    pub left: LaneFit,
    pub right: LaneFit,
    pub mode: SearchMode,
    /// Windows visited (empty for `SearchMode::Near`)
    pub windows: Vec<SearchWindow>,
}

/// Curve search over rectified masks
#[derive(Debug, Clone)]
pub struct CurveSearch {
    config: SearchConfig,
}

impl CurveSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Blind sliding-window search
    pub fn search_full(&self, mask: &BinaryMask) -> Result<LanePair, SearchError> {
        let (width, height) = mask.dimensions();
        if width < 2 || height == 0 {
            return Err(SearchError::InsufficientPixels {
                side: LaneSide::Left,
                found: 0,
                needed: self.config.min_fit_pixels,
            });
        }

        let rows = pixels_by_row(mask);
        let (left_base, right_base) = self.base_columns(&rows, width, height);
        debug!("Histogram bases: left={} right={}", left_base, right_base);

        let window_count = self.config.window_count.max(1);
        let window_height = (height / window_count).max(1);
        let margin = self.config.window_margin as i64;

        let mut left_x = left_base as i64;
        let mut right_x = right_base as i64;
        let mut left_pixels = Vec::new();
        let mut right_pixels = Vec::new();
        let mut windows = Vec::with_capacity(2 * window_count as usize);

        for step in 0..window_count {
            let y_high = height.saturating_sub(step * window_height);
            let y_low = height.saturating_sub((step + 1) * window_height);
            if y_high == y_low {
                break;
            }

            for (side, center, pixels) in [
                (LaneSide::Left, &mut left_x, &mut left_pixels),
                (LaneSide::Right, &mut right_x, &mut right_pixels),
            ] {
                let window = SearchWindow {
                    side,
                    x_low: *center - margin,
                    x_high: *center + margin,
                    y_low,
                    y_high,
                };
                let found = collect_window(&rows, &window);

                if found.len() > self.config.min_pixels {
                    let sum: i64 = found.iter().map(|&(x, _)| x as i64).sum();
                    *center = sum / found.len() as i64;
                }
                pixels.extend(found);
                windows.push(window);
            }
        }

        let left = self.fit_side(LaneSide::Left, left_pixels)?;
        let right = self.fit_side(LaneSide::Right, right_pixels)?;

        Ok(LanePair {
            left,
            right,
            mode: SearchMode::Full,
            windows,
        })
    }

    /// Search restricted to a lateral band around prior curves
    pub fn search_near(
        &self,
        mask: &BinaryMask,
        left_prior: &Polynomial,
        right_prior: &Polynomial,
    ) -> Result<LanePair, SearchError> {
        let margin = self.config.search_margin;
        let mut left_pixels = Vec::new();
        let mut right_pixels = Vec::new();

        for (x, y) in mask.lane_pixels() {
            let (xf, yf) = (x as f64, y as f64);

            // Overlapping bands may claim the same pixel for both sides
            if (xf - left_prior.eval(yf)).abs() < margin {
                left_pixels.push((x, y));
            }
            if (xf - right_prior.eval(yf)).abs() < margin {
                right_pixels.push((x, y));
            }
        }

        let left = self.fit_side(LaneSide::Left, left_pixels)?;
        let right = self.fit_side(LaneSide::Right, right_pixels)?;

        Ok(LanePair {
            left,
            right,
            mode: SearchMode::Near,
            windows: Vec::new(),
        })
    }

    /// Histogram peaks of the bottom strip, one per image half
    fn base_columns(&self, rows: &[Vec<u32>], width: u32, height: u32) -> (u32, u32) {
        let strip = ((height as f64) * self.config.histogram_fraction).round() as u32;
        let start_row = height - strip.clamp(1, height);

        let mut histogram = vec![0u32; width as usize];
        for row in &rows[start_row as usize..] {
            for &x in row {
                histogram[x as usize] += 1;
            }
        }

        let mid = width / 2;
        let edge = self.config.edge_margin;
        let (left_lo, right_hi) = if edge < mid && width - edge > mid {
            (edge, width - edge)
        } else {
            (0, width)
        };

        (
            argmax(&histogram, left_lo, mid),
            argmax(&histogram, mid, right_hi),
        )
    }

    fn fit_side(&self, side: LaneSide, pixels: Vec<(u32, u32)>) -> Result<LaneFit, SearchError> {
        let needed = self.config.min_fit_pixels.max(3);
        if pixels.len() < needed {
            return Err(SearchError::InsufficientPixels {
                side,
                found: pixels.len(),
                needed,
            });
        }

        let polynomial = Polynomial::fit(&pixels).ok_or(SearchError::DegenerateFit { side })?;
        Ok(LaneFit { polynomial, pixels })
    }
}

/// Lane pixel columns grouped by row
fn pixels_by_row(mask: &BinaryMask) -> Vec<Vec<u32>> {
    let mut rows = vec![Vec::new(); mask.height() as usize];
    for (x, y) in mask.lane_pixels() {
        rows[y as usize].push(x);
    }
    rows
}

fn collect_window(rows: &[Vec<u32>], window: &SearchWindow) -> Vec<(u32, u32)> {
    let mut found = Vec::new();
    for y in window.y_low..window.y_high {
        for &x in &rows[y as usize] {
            let xi = x as i64;
            if xi >= window.x_low && xi < window.x_high {
                found.push((x, y));
            }
        }
    }
    found
}

/// Index of the largest count in `[lo, hi)`; ties go to the lowest column
fn argmax(histogram: &[u32], lo: u32, hi: u32) -> u32 {
    let mut best = lo;
    let mut best_count = 0;
    for x in lo..hi {
        let count = histogram[x as usize];
        if count > best_count {
            best = x;
            best_count = count;
        }
    }
    best
}
