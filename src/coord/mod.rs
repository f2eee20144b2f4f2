// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Geometry primitives: sky directions, 2D points and lines, and the frame
//! transforms used by the stereo reconstruction.
//!
//! The Cartesian convention follows sim_telarray: x to the north, y to the
//! west, z up, so that `(x, y, z) = (cos az cos alt, -sin az cos alt,
//! sin alt)`.

mod frames;

pub use frames::{TelescopeFrame, TiltedGroundFrame};

/// A direction on the sky as (azimuth, altitude). All units are radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalDirection {
    /// Azimuth, measured from north towards east \[radians\]
    pub azimuth: f64,
    /// Altitude above the horizon \[radians\]
    pub altitude: f64,
}

impl SphericalDirection {
    pub fn new(azimuth: f64, altitude: f64) -> SphericalDirection {
        SphericalDirection { azimuth, altitude }
    }

    /// The unit vector of this direction.
    pub fn to_cartesian(self) -> CartesianDirection {
        let (sa, ca) = self.azimuth.sin_cos();
        let (sh, ch) = self.altitude.sin_cos();
        CartesianDirection {
            x: ca * ch,
            y: -sa * ch,
            z: sh,
        }
    }

    /// Angular separation between two sky directions \[radians\].
    pub fn angle_separation(&self, other: &SphericalDirection) -> f64 {
        let dot = self.to_cartesian().dot(&other.to_cartesian());
        dot.clamp(-1.0, 1.0).acos()
    }
}

/// A direction as a unit (or unnormalized) 3-vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CartesianDirection {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CartesianDirection {
    pub fn new(x: f64, y: f64, z: f64) -> CartesianDirection {
        CartesianDirection { x, y, z }
    }

    pub fn dot(&self, other: &CartesianDirection) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Back to (azimuth, altitude). Note the sign on y from the
    /// north/west/up convention.
    pub fn to_spherical(self) -> SphericalDirection {
        let norm = self.norm();
        SphericalDirection {
            azimuth: (-self.y).atan2(self.x),
            altitude: (self.z / norm).clamp(-1.0, 1.0).asin(),
        }
    }
}

/// A point in a 2D plane (a camera focal plane, a projected frame, ...).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Point2D {
        Point2D { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A 2D line through `point` along `direction` (stored normalized).
#[derive(Clone, Copy, Debug)]
pub struct Line2D {
    point: Point2D,
    direction: (f64, f64),
}

impl Line2D {
    pub fn new(point: Point2D, direction: (f64, f64)) -> Line2D {
        let norm = direction.0.hypot(direction.1);
        Line2D {
            point,
            direction: (direction.0 / norm, direction.1 / norm),
        }
    }

    /// Perpendicular distance from `p` to this line.
    pub fn distance_to_point(&self, p: &Point2D) -> f64 {
        let dx = p.x - self.point.x;
        let dy = p.y - self.point.y;
        (dx * self.direction.1 - dy * self.direction.0).abs()
    }

    /// Intersection point with another line, or `None` when the lines are
    /// parallel (the solution is not finite).
    pub fn intersection(&self, other: &Line2D) -> Option<Point2D> {
        let denom = self.direction.0 * other.direction.1 - self.direction.1 * other.direction.0;
        let dx = other.point.x - self.point.x;
        let dy = other.point.y - self.point.y;
        let t = (dx * other.direction.1 - dy * other.direction.0) / denom;
        let p = Point2D::new(
            self.point.x + t * self.direction.0,
            self.point.y + t * self.direction.1,
        );
        if p.x.is_finite() && p.y.is_finite() {
            Some(p)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cartesian_convention() {
        // North at the horizon.
        let c = SphericalDirection::new(0.0, 0.0).to_cartesian();
        assert_abs_diff_eq!(c.x, 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(c.y, 0.0, epsilon = 1e-15);
        // y points west, so east comes out at y = -1.
        let c = SphericalDirection::new(std::f64::consts::FRAC_PI_2, 0.0).to_cartesian();
        assert_abs_diff_eq!(c.y, -1.0, epsilon = 1e-15);
        // Zenith.
        let c = SphericalDirection::new(0.3, std::f64::consts::FRAC_PI_2).to_cartesian();
        assert_abs_diff_eq!(c.z, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn spherical_round_trip() {
        let d = SphericalDirection::new(1.234, 0.789);
        let back = d.to_cartesian().to_spherical();
        assert_abs_diff_eq!(back.azimuth, d.azimuth, epsilon = 1e-12);
        assert_abs_diff_eq!(back.altitude, d.altitude, epsilon = 1e-12);
    }

    #[test]
    fn angle_separation_orthogonal() {
        let a = SphericalDirection::new(0.0, 0.0);
        let b = SphericalDirection::new(0.0, std::f64::consts::FRAC_PI_2);
        assert_abs_diff_eq!(a.angle_separation(&b), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn line_intersection() {
        let l1 = Line2D::new(Point2D::new(0.0, 0.0), (1.0, 1.0));
        let l2 = Line2D::new(Point2D::new(2.0, 0.0), (0.0, 1.0));
        let p = l1.intersection(&l2).unwrap();
        assert_abs_diff_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-12);

        // Parallel lines have no intersection.
        let l3 = Line2D::new(Point2D::new(0.0, 1.0), (1.0, 1.0));
        assert!(l1.intersection(&l3).is_none());
    }

    #[test]
    fn line_point_distance() {
        let l = Line2D::new(Point2D::new(0.0, 0.0), (1.0, 0.0));
        assert_abs_diff_eq!(l.distance_to_point(&Point2D::new(5.0, 3.0)), 3.0, epsilon = 1e-12);
    }
}
