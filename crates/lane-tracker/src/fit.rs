//! Quadratic lane curves and least-squares fitting
//!
//! Curves are lateral position as a function of image row in bird's-eye
//! pixels: x(y) = a*y^2 + b*y + c.

use std::fmt;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Which lane boundary a fit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneSide {
    Left,
    Right,
}

impl fmt::Display for LaneSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneSide::Left => write!(f, "left"),
            LaneSide::Right => write!(f, "right"),
        }
    }
}

/// Second-degree curve x(y) = a*y^2 + b*y + c
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Polynomial {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Polynomial {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Lateral position at row `y`
    pub fn eval(&self, y: f64) -> f64 {
        (self.a * y + self.b) * y + self.c
    }

    pub fn coefficients(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Radius of curvature at row `y`, in pixels. Straight lines give infinity.
    pub fn curvature_radius(&self, y: f64) -> f64 {
        let slope = 2.0 * self.a * y + self.b;
        let denom = (2.0 * self.a).abs();
        if denom == 0.0 {
            return f64::INFINITY;
        }
        (1.0 + slope * slope).powf(1.5) / denom
    }

    /// Coefficient-wise mean; `None` for an empty input
    pub fn mean<'a>(fits: impl IntoIterator<Item = &'a Polynomial>) -> Option<Polynomial> {
        let mut sum = [0.0; 3];
        let mut n = 0usize;
        for fit in fits {
            sum[0] += fit.a;
            sum[1] += fit.b;
            sum[2] += fit.c;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        let n = n as f64;
        Some(Polynomial::new(sum[0] / n, sum[1] / n, sum[2] / n))
    }

    /// Exact least-squares fit of x(y) through `(x, y)` pixels.
    ///
    /// Returns `None` when the points cannot pin down a quadratic: fewer than
    /// three distinct rows, or a numerically singular system.
    pub fn fit(points: &[(u32, u32)]) -> Option<Polynomial> {
        if distinct_rows(points) < 3 {
            return None;
        }

        // Centre and scale y so the normal equations stay well conditioned
        let n = points.len() as f64;
        let mean_y = points.iter().map(|&(_, y)| y as f64).sum::<f64>() / n;
        let scale = points
            .iter()
            .map(|&(_, y)| (y as f64 - mean_y).abs())
            .fold(0.0f64, f64::max);
        if scale == 0.0 {
            return None;
        }

        let mut ata = Matrix3::<f64>::zeros();
        let mut atb = Vector3::<f64>::zeros();
        for &(x, y) in points {
            let t = (y as f64 - mean_y) / scale;
            let row = Vector3::new(t * t, t, 1.0);
            ata += row * row.transpose();
            atb += row * x as f64;
        }

        let sol = ata.lu().solve(&atb)?;
        let (alpha, beta, gamma) = (sol[0], sol[1], sol[2]);
        if !(alpha.is_finite() && beta.is_finite() && gamma.is_finite()) {
            return None;
        }

        // Expand alpha*t^2 + beta*t + gamma with t = (y - m) / s
        let (m, s) = (mean_y, scale);
        Some(Polynomial::new(
            alpha / (s * s),
            beta / s - 2.0 * m * alpha / (s * s),
            gamma - beta * m / s + alpha * m * m / (s * s),
        ))
    }
}

fn distinct_rows(points: &[(u32, u32)]) -> usize {
    let mut seen: Vec<u32> = Vec::with_capacity(3);
    for &(_, y) in points {
        if !seen.contains(&y) {
            seen.push(y);
            if seen.len() == 3 {
                break;
            }
        }
    }
    seen.len()
}

/// One boundary's fitted curve and the pixels that support it
#[derive(Debug, Clone, PartialEq)]
pub struct LaneFit {
    pub polynomial: Polynomial,
    /// Support pixels (x, y) in bird's-eye coordinates
    pub pixels: Vec<(u32, u32)>,
}
