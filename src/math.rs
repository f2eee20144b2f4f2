// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Small numerical helpers used by the image parametrization and the stereo
//! reconstruction.

/// Result of decomposing a symmetric 2x2 matrix. `major` is the eigenvalue
/// with the largest magnitude eigenvector direction in `major_axis`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Eigen2 {
    pub(crate) major: f64,
    pub(crate) minor: f64,
    /// Unit vector along the major eigenvector.
    pub(crate) major_axis: (f64, f64),
}

/// Eigendecomposition of the symmetric matrix [[a, b], [b, c]]. Returns
/// `None` when the input is not finite, which callers treat as a failed
/// shape fit.
pub(crate) fn symmetric_eigen_2x2(a: f64, b: f64, c: f64) -> Option<Eigen2> {
    if !a.is_finite() || !b.is_finite() || !c.is_finite() {
        return None;
    }
    let trace = a + c;
    let det = a * c - b * b;
    // Symmetric matrices have real eigenvalues; the discriminant can only go
    // negative through rounding, so clamp it.
    let disc = (trace * trace / 4.0 - det).max(0.0).sqrt();
    let major = trace / 2.0 + disc;
    let minor = trace / 2.0 - disc;

    let major_axis = if b.abs() > f64::EPSILON {
        let (vx, vy) = (b, major - a);
        let norm = vx.hypot(vy);
        (vx / norm, vy / norm)
    } else if a >= c {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };
    Some(Eigen2 {
        major,
        minor,
        major_axis,
    })
}

/// Shortest distance from `point` to the 3D line through `origin` along
/// `direction` (which need not be normalized).
pub(crate) fn point_line_distance_3d(
    point: [f64; 3],
    origin: [f64; 3],
    direction: [f64; 3],
) -> f64 {
    let d = [point[0] - origin[0], point[1] - origin[1], point[2] - origin[2]];
    let cross = [
        d[1] * direction[2] - d[2] * direction[1],
        d[2] * direction[0] - d[0] * direction[2],
        d[0] * direction[1] - d[1] * direction[0],
    ];
    let cross_norm = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
    let dir_norm =
        (direction[0] * direction[0] + direction[1] * direction[1] + direction[2] * direction[2])
            .sqrt();
    cross_norm / dir_norm
}

/// Weighted mean and weighted variance (E[x^2] - E[x]^2) of `values`.
pub(crate) fn weighted_mean_variance(values: &[f64], weights: &[f64]) -> (f64, f64) {
    let weight_sum: f64 = weights.iter().sum();
    let mean = values
        .iter()
        .zip(weights)
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / weight_sum;
    let mean_sq = values
        .iter()
        .zip(weights)
        .map(|(v, w)| v * v * w)
        .sum::<f64>()
        / weight_sum;
    (mean, mean_sq - mean * mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn eigen_recovers_rotated_ellipse() {
        // Covariance of an ellipse with axes 2 and 1 rotated by 30 degrees.
        let (l1, l2) = (4.0, 1.0);
        let psi = 30_f64.to_radians();
        let (c, s) = (psi.cos(), psi.sin());
        let a = l1 * c * c + l2 * s * s;
        let b = (l1 - l2) * c * s;
        let d = l1 * s * s + l2 * c * c;
        let e = symmetric_eigen_2x2(a, b, d).unwrap();
        assert_abs_diff_eq!(e.major, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(e.minor, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(e.major_axis.1.atan2(e.major_axis.0), psi, epsilon = 1e-12);
    }

    #[test]
    fn eigen_diagonal() {
        let e = symmetric_eigen_2x2(1.0, 0.0, 3.0).unwrap();
        assert_abs_diff_eq!(e.major, 3.0);
        assert_abs_diff_eq!(e.major_axis.0, 0.0);
        assert_abs_diff_eq!(e.major_axis.1, 1.0);
        assert!(symmetric_eigen_2x2(f64::NAN, 0.0, 1.0).is_none());
    }

    #[test]
    fn point_line_distance() {
        // Line along z through the origin; the distance is the transverse
        // radius.
        let d = point_line_distance_3d([3.0, 4.0, 10.0], [0.0, 0.0, 0.0], [0.0, 0.0, 2.0]);
        assert_abs_diff_eq!(d, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn weighted_moments() {
        let (mean, var) = weighted_mean_variance(&[1.0, 3.0], &[1.0, 1.0]);
        assert_abs_diff_eq!(mean, 2.0);
        assert_abs_diff_eq!(var, 1.0);
    }
}
