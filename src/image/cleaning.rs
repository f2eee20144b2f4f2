// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image cleaning: selecting the pixels that carry shower signal.

use ndarray::prelude::*;
use strum_macros::{Display, EnumIter, EnumString};

use crate::camera::CameraGeometry;
use crate::config::{get_bool, get_f64, get_i64, ConfigError};

/// The closed set of image cleaners selectable from configuration.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, PartialEq, Eq)]
pub enum CleanerKind {
    #[strum(serialize = "Tailcuts_cleaner")]
    Tailcuts,
}

/// Two-threshold cleaning with neighbor-based retention.
///
/// Picture pixels are above `picture_thresh` (optionally requiring
/// `min_number_picture_neighbors` picture neighbors); boundary pixels are
/// above `boundary_thresh` and adjacent to a picture pixel.
#[derive(Clone, Copy, Debug)]
pub struct TailcutsCleaner {
    picture_thresh: f64,
    boundary_thresh: f64,
    keep_isolated_pixels: bool,
    min_number_picture_neighbors: i64,
}

impl TailcutsCleaner {
    pub fn new(config: Option<&serde_json::Value>) -> Result<TailcutsCleaner, ConfigError> {
        let defaults = TailcutsCleaner::default_config();
        let config = config.unwrap_or(&defaults);
        Ok(TailcutsCleaner {
            picture_thresh: get_f64(config, "picture_thresh")?,
            boundary_thresh: get_f64(config, "boundary_thresh")?,
            keep_isolated_pixels: get_bool(config, "keep_isolated_pixels")?,
            min_number_picture_neighbors: get_i64(config, "min_number_picture_neighbors")?,
        })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "picture_thresh": 10.0,
            "boundary_thresh": 5.0,
            "keep_isolated_pixels": false,
            "min_number_picture_neighbors": 2,
        })
    }

    pub fn clean(&self, geometry: &CameraGeometry, image: &Array1<f64>) -> Vec<bool> {
        tailcuts_clean(
            geometry,
            image,
            self.picture_thresh,
            self.boundary_thresh,
            self.keep_isolated_pixels,
            self.min_number_picture_neighbors,
        )
    }
}

/// The tailcuts procedure, vectorized over pixels.
pub fn tailcuts_clean(
    geometry: &CameraGeometry,
    image: &Array1<f64>,
    picture_thresh: f64,
    boundary_thresh: f64,
    keep_isolated_pixels: bool,
    min_number_picture_neighbors: i64,
) -> Vec<bool> {
    let above_picture: Vec<bool> = image.iter().map(|&v| v >= picture_thresh).collect();

    let in_picture: Vec<bool> = if keep_isolated_pixels || min_number_picture_neighbors == 0 {
        above_picture.clone()
    } else {
        let picture_neighbors = geometry.count_selected_neighbors(&above_picture);
        above_picture
            .iter()
            .zip(&picture_neighbors)
            .map(|(&above, &n)| above && i64::from(n) >= min_number_picture_neighbors)
            .collect()
    };

    let above_boundary: Vec<bool> = image.iter().map(|&v| v >= boundary_thresh).collect();
    let has_picture_neighbor: Vec<bool> = geometry
        .count_selected_neighbors(&in_picture)
        .iter()
        .map(|&n| n > 0)
        .collect();

    if keep_isolated_pixels {
        above_boundary
            .iter()
            .zip(&has_picture_neighbor)
            .zip(&in_picture)
            .map(|((&boundary, &near_pic), &pic)| (boundary && near_pic) || pic)
            .collect()
    } else {
        let has_boundary_neighbor: Vec<bool> = geometry
            .count_selected_neighbors(&above_boundary)
            .iter()
            .map(|&n| n > 0)
            .collect();
        above_boundary
            .iter()
            .zip(&has_picture_neighbor)
            .zip(&in_picture)
            .zip(&has_boundary_neighbor)
            .map(|(((&boundary, &near_pic), &pic), &near_bnd)| {
                (boundary && near_pic) || (pic && near_bnd)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn grid(n_side: usize) -> CameraGeometry {
        let n = n_side * n_side;
        let pix_x = Array1::from_iter((0..n).map(|i| (i % n_side) as f64));
        let pix_y = Array1::from_iter((0..n).map(|i| (i / n_side) as f64));
        CameraGeometry::new(
            "CleanTest".to_string(),
            pix_x,
            pix_y,
            Array1::ones(n),
            Array1::from_elem(n, 2),
            0.0,
            false,
        )
        .unwrap()
    }

    #[test]
    fn keeps_core_and_adjacent_boundary() {
        let cam = grid(5);
        let mut image = Array1::zeros(25);
        // Two neighboring picture pixels in the middle row with one boundary
        // neighbor and one faint (dropped) pixel further out.
        image[11] = 20.0;
        image[12] = 20.0;
        image[13] = 6.0;
        image[14] = 4.0;
        let mask = tailcuts_clean(&cam, &image, 10.0, 5.0, false, 1);
        assert!(mask[11] && mask[12] && mask[13]);
        assert!(!mask[14]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 3);
    }

    #[test]
    fn min_picture_neighbors_drops_lone_cores() {
        let cam = grid(5);
        let mut image = Array1::zeros(25);
        image[12] = 20.0;
        let mask = tailcuts_clean(&cam, &image, 10.0, 5.0, false, 1);
        assert!(mask.iter().all(|&m| !m));

        // The same single core survives when isolated pixels are kept.
        let mask = tailcuts_clean(&cam, &image, 10.0, 5.0, true, 1);
        assert!(mask[12]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 1);
    }

    #[test]
    fn reduces_to_picture_threshold_cut() {
        // With boundary >= picture, no neighbor requirement and isolated
        // pixels kept, the mask is exactly `image >= picture_thresh`.
        let cam = grid(4);
        let image = Array1::from_iter((0..16).map(|i| i as f64));
        let mask = tailcuts_clean(&cam, &image, 8.0, 9.0, true, 0);
        for (i, &m) in mask.iter().enumerate() {
            assert_eq!(m, image[i] >= 8.0);
        }
    }
}
