// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image parameter computations over a cleaned (masked) image.

use ndarray::prelude::*;

use crate::camera::CameraGeometry;
use crate::coord::{Line2D, Point2D};
use crate::event::{
    ConcentrationParameters, ExtraParameters, HillasParameters, IntensityParameters,
    LeakageParameters, MorphologyParameters,
};
use crate::math::symmetric_eigen_2x2;

/// Weighted image moments: the Hillas ellipse. The masked image must be
/// zero outside the cleaning mask; positions are taken in the
/// field-of-view frame.
pub fn hillas_parameters(geometry: &CameraGeometry, masked_image: &Array1<f64>) -> HillasParameters {
    let intensity = masked_image.sum();
    let x = geometry.pix_x_fov.dot(masked_image) / intensity;
    let y = geometry.pix_y_fov.dot(masked_image) / intensity;
    let r = x.hypot(y);
    let phi = y.atan2(x);

    let delta_x = &geometry.pix_x_fov - x;
    let delta_y = &geometry.pix_y_fov - y;
    // Second moments with Bessel correction.
    let norm = intensity - 1.0;
    let cov_xx = (&delta_x * &delta_x).dot(masked_image) / norm;
    let cov_yy = (&delta_y * &delta_y).dot(masked_image) / norm;
    let cov_xy = (&delta_x * &delta_y).dot(masked_image) / norm;

    let (length, width, psi) = match symmetric_eigen_2x2(cov_xx, cov_xy, cov_yy) {
        Some(eigen) => {
            let psi = if eigen.major_axis.0 != 0.0 {
                eigen.major_axis.1.atan2(eigen.major_axis.0)
            } else {
                std::f64::consts::FRAC_PI_2
            };
            (eigen.major.sqrt(), eigen.minor.sqrt(), psi)
        }
        None => {
            log::warn!("Eigenvalue decomposition failed; shape parameters are NaN");
            (f64::NAN, f64::NAN, f64::NAN)
        }
    };

    // Third and fourth moments along the major axis.
    let longitudinal = &delta_x * psi.cos() + &delta_y * psi.sin();
    let m3 = longitudinal.mapv(|l| l.powi(3)).dot(masked_image);
    let m4 = longitudinal.mapv(|l| l.powi(4)).dot(masked_image);
    let skewness = m3 / length.powi(3);
    let kurtosis = m4 / length.powi(4);

    HillasParameters {
        x,
        y,
        length,
        width,
        psi,
        phi,
        r,
        intensity,
        skewness,
        kurtosis,
    }
}

/// Intensity and pixel fractions on the outermost one and two pixel rings.
pub fn leakage_parameters(
    geometry: &CameraGeometry,
    masked_image: &Array1<f64>,
) -> LeakageParameters {
    let border_1 = geometry.border_pixel_mask(1);
    let border_2 = geometry.border_pixel_mask(2);
    let intensity = masked_image.sum();
    let image_pixels = masked_image.iter().filter(|&&v| v > 0.0).count();

    let on_border = |mask: &[bool]| -> f64 {
        masked_image
            .iter()
            .zip(mask)
            .filter(|(_, &m)| m)
            .map(|(&v, _)| v)
            .sum()
    };
    let covered = |mask: &[bool]| -> usize {
        masked_image
            .iter()
            .zip(mask)
            .filter(|(&v, &m)| m || v > 0.0)
            .count()
    };

    LeakageParameters {
        intensity_width_1: on_border(&border_1) / intensity,
        intensity_width_2: on_border(&border_2) / intensity,
        pixels_width_1: covered(&border_1) as f64 / image_pixels as f64,
        pixels_width_2: covered(&border_2) as f64 / image_pixels as f64,
    }
}

/// Fractions of the total intensity in small on-axis windows.
pub fn concentration_parameters(
    geometry: &CameraGeometry,
    masked_image: &Array1<f64>,
    hillas: &HillasParameters,
) -> ConcentrationParameters {
    let intensity = hillas.intensity;
    let n = masked_image.len();

    // One equivalent pixel diameter around the centroid, in the
    // field-of-view frame.
    let mean_pixel_width =
        geometry.pix_area.mapv(f64::sqrt).sum() / n as f64 / geometry.effective_focal_length;

    let (sin_psi, cos_psi) = hillas.psi.sin_cos();
    let mut cog_sum = 0.0;
    let mut core_sum = 0.0;
    let mut pixel_max = 0.0f64;
    for i in 0..n {
        let w = masked_image[i];
        pixel_max = pixel_max.max(w);
        let dx = geometry.pix_x_fov[i] - hillas.x;
        let dy = geometry.pix_y_fov[i] - hillas.y;
        if dx.hypot(dy) < mean_pixel_width {
            cog_sum += w;
        }
        let longitudinal = dx * cos_psi + dy * sin_psi;
        let transverse = -dx * sin_psi + dy * cos_psi;
        let in_ellipse = (longitudinal / hillas.length).powi(2)
            + (transverse / hillas.width).powi(2)
            <= 1.0;
        if in_ellipse {
            core_sum += w;
        }
    }

    ConcentrationParameters {
        cog: cog_sum / intensity,
        core: core_sum / intensity,
        pixel: pixel_max / intensity,
    }
}

/// Count cleaned pixels and their connected components (islands), bucketed
/// by size.
pub fn morphology_parameters(
    geometry: &CameraGeometry,
    mask: &[bool],
    small_island_max: i64,
    medium_island_max: i64,
) -> MorphologyParameters {
    let mut seen = vec![false; mask.len()];
    let mut morphology = MorphologyParameters::default();
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || seen[start] {
            continue;
        }
        // Flood the island.
        let mut size: i64 = 0;
        seen[start] = true;
        stack.push(start);
        while let Some(pixel) = stack.pop() {
            size += 1;
            for &neighbor in geometry.neighbors(pixel) {
                if mask[neighbor] && !seen[neighbor] {
                    seen[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        morphology.n_pixels += size as i32;
        morphology.n_islands += 1;
        if size <= small_island_max {
            morphology.n_small_islands += 1;
        } else if size <= medium_island_max {
            morphology.n_medium_islands += 1;
        } else {
            morphology.n_large_islands += 1;
        }
    }
    morphology
}

/// Charge statistics over the cleaned pixels.
pub fn intensity_parameters(masked_image: &Array1<f64>) -> IntensityParameters {
    let selected: Vec<f64> = masked_image.iter().copied().filter(|&v| v > 0.0).collect();
    if selected.is_empty() {
        return IntensityParameters::default();
    }
    let n = selected.len() as f64;
    let mean = selected.iter().sum::<f64>() / n;
    let variance = selected.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    IntensityParameters {
        intensity_max: selected.iter().cloned().fold(f64::MIN, f64::max),
        intensity_mean: mean,
        intensity_std: variance.sqrt(),
    }
}

/// Axis quantities for downstream direction estimation: the distance of the
/// major axis from the frame origin, the longitudinal distance of the
/// centroid from the origin's axis projection, and the angle between the
/// axis and the centroid radius vector.
pub fn extra_parameters(hillas: &HillasParameters) -> ExtraParameters {
    let axis = Line2D::new(
        Point2D::new(hillas.x, hillas.y),
        (hillas.psi.cos(), hillas.psi.sin()),
    );
    let miss = axis.distance_to_point(&Point2D::new(0.0, 0.0));
    let disp = (hillas.r * hillas.r - miss * miss).max(0.0).sqrt();
    let mut theta = (hillas.psi - hillas.phi).abs() % std::f64::consts::PI;
    if theta > std::f64::consts::FRAC_PI_2 {
        theta = std::f64::consts::PI - theta;
    }
    ExtraParameters { miss, disp, theta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    /// A horizontal two-blob image on a 7x7 unit grid, focal length 1 so
    /// the field-of-view frame equals the focal plane.
    fn grid(n_side: usize) -> CameraGeometry {
        let n = n_side * n_side;
        let pix_x = Array1::from_iter((0..n).map(|i| (i % n_side) as f64));
        let pix_y = Array1::from_iter((0..n).map(|i| (i / n_side) as f64));
        let mut cam = CameraGeometry::new(
            "ParamTest".to_string(),
            pix_x,
            pix_y,
            Array1::ones(n),
            Array1::from_elem(n, 2),
            0.0,
            false,
        )
        .unwrap();
        cam.set_effective_focal_length(1.0);
        cam
    }

    #[test]
    fn hillas_of_a_horizontal_pair() {
        let cam = grid(7);
        let mut image = Array1::zeros(49);
        // Equal charges at (2, 3) and (4, 3): centroid (3, 3), axis along x.
        image[3 * 7 + 2] = 50.0;
        image[3 * 7 + 4] = 50.0;
        let h = hillas_parameters(&cam, &image);
        assert_abs_diff_eq!(h.intensity, 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h.x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h.y, 3.0, epsilon = 1e-12);
        // Covariance along x: 100 / 99; width exactly zero.
        assert_abs_diff_eq!(h.length, (100.0f64 / 99.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(h.width, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h.psi.sin().abs(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h.r, (18.0f64).sqrt(), epsilon = 1e-12);
        // Symmetric charge: no skew.
        assert_abs_diff_eq!(h.skewness, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn hillas_fails_gracefully_on_single_pixel() {
        // A one-pixel image has intensity 1 and the Bessel division by zero
        // poisons the covariance; shape parameters must come out NaN.
        let cam = grid(5);
        let mut image = Array1::zeros(25);
        image[12] = 1.0;
        let h = hillas_parameters(&cam, &image);
        assert!(h.length.is_nan());
        assert!(h.width.is_nan());
        assert!(h.psi.is_nan());
        assert_abs_diff_eq!(h.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn leakage_fractions() {
        let cam = grid(5);
        let mut image = Array1::zeros(25);
        // One pixel on the outer ring, one on the second ring.
        image[0] = 30.0;
        image[6] = 10.0;
        let l = leakage_parameters(&cam, &image);
        assert_abs_diff_eq!(l.intensity_width_1, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(l.intensity_width_2, 1.0, epsilon = 1e-12);
        // Union of the border ring (16 pixels) and the lit pixels.
        assert_abs_diff_eq!(l.pixels_width_1, 17.0 / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(l.pixels_width_2, 24.0 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn concentration_hottest_pixel() {
        let cam = grid(5);
        let mut image = Array1::zeros(25);
        image[12] = 60.0;
        image[13] = 40.0;
        let h = hillas_parameters(&cam, &image);
        let c = concentration_parameters(&cam, &image, &h);
        assert_abs_diff_eq!(c.pixel, 0.6, epsilon = 1e-12);
        assert!(c.cog > 0.0);
    }

    #[test]
    fn morphology_islands_and_buckets() {
        let cam = grid(7);
        let mut mask = vec![false; 49];
        // A 2-pixel island, and a separate 5-pixel row.
        mask[0] = true;
        mask[1] = true;
        for i in 0..5 {
            mask[3 * 7 + 1 + i] = true;
        }
        let m = morphology_parameters(&cam, &mask, 3, 10);
        assert_eq!(m.n_pixels, 7);
        assert_eq!(m.n_islands, 2);
        assert_eq!(m.n_small_islands, 1);
        assert_eq!(m.n_medium_islands, 1);
        assert_eq!(m.n_large_islands, 0);
    }

    #[test]
    fn intensity_statistics() {
        let image = ndarray::array![0.0, 2.0, 4.0, 0.0];
        let s = intensity_parameters(&image);
        assert_abs_diff_eq!(s.intensity_max, 4.0);
        assert_abs_diff_eq!(s.intensity_mean, 3.0);
        assert_abs_diff_eq!(s.intensity_std, 1.0);
    }

    #[test]
    fn extra_miss_and_disp() {
        // Axis along x through (3, 2): miss is the y offset, disp the x
        // offset of the centroid from the origin's perpendicular foot.
        let hillas = HillasParameters {
            x: 3.0,
            y: 2.0,
            psi: 0.0,
            r: (13.0f64).sqrt(),
            phi: (2.0f64).atan2(3.0),
            ..Default::default()
        };
        let e = extra_parameters(&hillas);
        assert_abs_diff_eq!(e.miss, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(e.disp, 3.0, epsilon = 1e-12);
    }
}
