//! Planar perspective transforms from four point correspondences.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::LaneError;

/// Homogeneous scale below which a projected point is treated as at infinity
const W_EPS: f64 = 1e-12;

/// Invertible 3x3 projective transform, normalized so that h33 = 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the exact transform mapping each `src[i]` onto `dst[i]`.
    ///
    /// Fails when any coordinate is non-finite, any three points of either
    /// quadrilateral are collinear, or the resulting matrix is singular.
    pub fn from_correspondences(
        src: &[[f64; 2]; 4],
        dst: &[[f64; 2]; 4],
    ) -> Result<Self, LaneError> {
        check_quad("source", src)?;
        check_quad("destination", dst)?;

        // h33 fixed to 1, leaving 8 unknowns and 2 equations per pair:
        //   u = (h11 x + h12 y + h13) / (h31 x + h32 y + 1)
        //   v = (h21 x + h22 y + h23) / (h31 x + h32 y + 1)
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let [x, y] = src[i];
            let [u, v] = dst[i];

            a[(i, 0)] = x;
            a[(i, 1)] = y;
            a[(i, 2)] = 1.0;
            a[(i, 6)] = -x * u;
            a[(i, 7)] = -y * u;
            b[i] = u;

            a[(i + 4, 3)] = x;
            a[(i + 4, 4)] = y;
            a[(i + 4, 5)] = 1.0;
            a[(i + 4, 6)] = -x * v;
            a[(i + 4, 7)] = -y * v;
            b[i + 4] = v;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            LaneError::Configuration("calibration points do not define a homography".into())
        })?;

        Self::from_matrix(Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        ))
    }

    /// Wrap an existing matrix, rejecting singular or non-finite ones
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self, LaneError> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(LaneError::Configuration("homography has non-finite entries".into()));
        }
        let scale = matrix[(2, 2)];
        let matrix = if scale.abs() > W_EPS { matrix / scale } else { matrix };

        let det = matrix.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(LaneError::Configuration(format!(
                "homography is not invertible (det = {:e})",
                det
            )));
        }
        Ok(Self { matrix })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The inverse transform
    pub fn inverse(&self) -> Result<Self, LaneError> {
        let inv = self.matrix.try_inverse().ok_or_else(|| {
            LaneError::Configuration("homography is not invertible".into())
        })?;
        Self::from_matrix(inv)
    }

    /// Map a point; `None` when it lands on the line at infinity
    pub fn project(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p[2].abs() < W_EPS {
            return None;
        }
        let out = [p[0] / p[2], p[1] / p[2]];
        out.iter().all(|v| v.is_finite()).then_some(out)
    }
}

fn check_quad(name: &str, pts: &[[f64; 2]; 4]) -> Result<(), LaneError> {
    if pts.iter().flatten().any(|v| !v.is_finite()) {
        return Err(LaneError::Configuration(format!(
            "{} points contain non-finite coordinates",
            name
        )));
    }

    let extent = pts
        .iter()
        .flatten()
        .fold(1.0f64, |acc, v| acc.max(v.abs()));
    let tolerance = 1e-9 * extent * extent;

    for skip in 0..4 {
        let tri: Vec<&[f64; 2]> = pts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, p)| p)
            .collect();
        let area = (tri[1][0] - tri[0][0]) * (tri[2][1] - tri[0][1])
            - (tri[1][1] - tri[0][1]) * (tri[2][0] - tri[0][0]);
        if area.abs() <= tolerance {
            return Err(LaneError::Configuration(format!(
                "{} points {:?} contain three collinear points",
                name, pts
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SRC: [[f64; 2]; 4] = [[500.0, 254.0], [750.0, 254.0], [200.0, 375.0], [800.0, 375.0]];
    const DST: [[f64; 2]; 4] = [[0.0, 0.0], [1280.0, 0.0], [0.0, 720.0], [1280.0, 720.0]];

    #[test]
    fn test_maps_correspondences_exactly() {
        let h = Homography::from_correspondences(&SRC, &DST).unwrap();
        for (s, d) in SRC.iter().zip(DST.iter()) {
            let p = h.project(s[0], s[1]).unwrap();
            assert_relative_eq!(p[0], d[0], epsilon = 1e-6);
            assert_relative_eq!(p[1], d[1], epsilon = 1e-6);
        }
        assert_relative_eq!(h.matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let h = Homography::from_correspondences(&SRC, &DST).unwrap();
        let inv = h.inverse().unwrap();

        let p = [520.0, 300.0];
        let q = h.project(p[0], p[1]).unwrap();
        let back = inv.project(q[0], q[1]).unwrap();
        assert_relative_eq!(p[0], back[0], epsilon = 1e-6);
        assert_relative_eq!(p[1], back[1], epsilon = 1e-6);
    }

    #[test]
    fn test_identity_correspondences() {
        let h = Homography::from_correspondences(&DST, &DST).unwrap();
        assert_relative_eq!(*h.matrix(), Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_points_rejected() {
        let collinear = [[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [0.0, 50.0]];
        let result = Homography::from_correspondences(&collinear, &DST);
        assert!(matches!(result, Err(LaneError::Configuration(_))));

        let result = Homography::from_correspondences(&SRC, &collinear);
        assert!(matches!(result, Err(LaneError::Configuration(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut bad = SRC;
        bad[2][0] = f64::NAN;
        assert!(Homography::from_correspondences(&bad, &DST).is_err());
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let singular = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(Homography::from_matrix(singular).is_err());
    }
}
