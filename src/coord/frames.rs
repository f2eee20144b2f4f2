// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frame transforms between the AltAz sky frame, a telescope (or nominal)
//! tangent-plane frame, and the tilted ground frame.
//!
//! Both projected frames share the same rotation, parametrized by a pointing
//! direction: `R = Rot_y(-(pi/2 - alt)) * Rot_z(az)`. The telescope frame
//! additionally projects onto the tangent plane as `(x/z, y/z)`; the tilted
//! ground frame applies the rotation to ground positions without projecting.

use super::{CartesianDirection, Point2D, SphericalDirection};

type Mat3 = [[f64; 3]; 3];

fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn mat_apply(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

fn mat_apply_transposed(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[1][0] * v[1] + m[2][0] * v[2],
        m[0][1] * v[0] + m[1][1] * v[1] + m[2][1] * v[2],
        m[0][2] * v[0] + m[1][2] * v[1] + m[2][2] * v[2],
    ]
}

fn pointing_rotation(pointing: SphericalDirection) -> Mat3 {
    let (sa, ca) = pointing.azimuth.sin_cos();
    let rot_z = [[ca, -sa, 0.0], [sa, ca, 0.0], [0.0, 0.0, 1.0]];
    // Rot_y(-(pi/2 - alt)): cos = sin(alt), sin = -cos(alt).
    let (sh, ch) = pointing.altitude.sin_cos();
    let rot_y = [[sh, 0.0, -ch], [0.0, 1.0, 0.0], [ch, 0.0, sh]];
    mat_mul(&rot_y, &rot_z)
}

/// A tangent-plane frame aligned with a pointing direction. The pointing
/// itself projects to the origin; coordinates are offsets in radians.
///
/// Constructed from the array pointing, the same type serves as the nominal
/// frame used to intersect per-telescope image axes.
#[derive(Clone, Debug)]
pub struct TelescopeFrame {
    pub pointing: SphericalDirection,
    rotation: Mat3,
}

impl TelescopeFrame {
    pub fn new(pointing: SphericalDirection) -> TelescopeFrame {
        TelescopeFrame {
            pointing,
            rotation: pointing_rotation(pointing),
        }
    }

    /// Project a sky direction into this frame.
    pub fn from_altaz(&self, direction: &SphericalDirection) -> Point2D {
        let c = direction.to_cartesian();
        let r = mat_apply(&self.rotation, [c.x, c.y, c.z]);
        Point2D::new(r[0] / r[2], r[1] / r[2])
    }

    /// Take a frame offset back to the sky. This is the exact inverse of
    /// [`TelescopeFrame::from_altaz`]: the offset is lifted to the unit
    /// direction `(u, v, 1)/|..|` and rotated back.
    pub fn to_altaz(&self, point: &Point2D) -> SphericalDirection {
        let norm = (point.x * point.x + point.y * point.y + 1.0).sqrt();
        let local = [point.x / norm, point.y / norm, 1.0 / norm];
        let r = mat_apply_transposed(&self.rotation, local);
        CartesianDirection::new(r[0], r[1], r[2]).to_spherical()
    }
}

/// The ground plane rotated perpendicular to a pointing direction. Used to
/// intersect shower axes in space.
#[derive(Clone, Debug)]
pub struct TiltedGroundFrame {
    pub pointing: SphericalDirection,
    rotation: Mat3,
}

impl TiltedGroundFrame {
    pub fn new(pointing: SphericalDirection) -> TiltedGroundFrame {
        TiltedGroundFrame {
            pointing,
            rotation: pointing_rotation(pointing),
        }
    }

    /// Rotate a ground position into the tilted frame.
    pub fn to_tilted(&self, ground: [f64; 3]) -> [f64; 3] {
        mat_apply(&self.rotation, ground)
    }

    /// Rotate a tilted-frame position back to the ground system.
    pub fn to_ground(&self, tilted: [f64; 3]) -> [f64; 3] {
        mat_apply_transposed(&self.rotation, tilted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pointing_projects_to_origin() {
        let pointing = SphericalDirection::new(1.1, 1.2);
        let frame = TelescopeFrame::new(pointing);
        let p = frame.from_altaz(&pointing);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn altaz_round_trip() {
        let pointings = [
            SphericalDirection::new(0.0, std::f64::consts::FRAC_PI_2),
            SphericalDirection::new(3.0, 1.2),
            SphericalDirection::new(-1.0, 0.4),
        ];
        let directions = [
            SphericalDirection::new(0.05, 1.5),
            SphericalDirection::new(3.02, 1.18),
            SphericalDirection::new(-1.04, 0.38),
        ];
        for frame in pointings.map(TelescopeFrame::new) {
            for dir in &directions {
                let projected = frame.from_altaz(dir);
                let back = frame.to_altaz(&projected);
                assert_abs_diff_eq!(back.azimuth, dir.azimuth, epsilon = 1e-9);
                assert_abs_diff_eq!(back.altitude, dir.altitude, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn tilted_round_trip() {
        let frame = TiltedGroundFrame::new(SphericalDirection::new(0.7, 1.1));
        let ground = [120.0, -45.0, 8.0];
        let back = frame.to_ground(frame.to_tilted(ground));
        for i in 0..3 {
            assert_abs_diff_eq!(back[i], ground[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn tilted_frame_is_a_rotation() {
        // Lengths are preserved, so telescope separations survive the
        // transform.
        let frame = TiltedGroundFrame::new(SphericalDirection::new(0.3, 1.4));
        let t = frame.to_tilted([30.0, 40.0, 0.0]);
        let norm = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        assert_abs_diff_eq!(norm, 50.0, epsilon = 1e-9);
    }
}
