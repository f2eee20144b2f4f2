// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera pixel geometry and the derived neighbor graph.

use std::collections::HashMap;
use std::sync::RwLock;

use log::debug;
use ndarray::prelude::*;
use thiserror::Error;

use crate::constants::{NEIGHBOR_RADIUS_HEX, NEIGHBOR_RADIUS_SQUARE_DIAGONAL};

#[derive(Error, Debug)]
pub enum CameraGeometryError {
    #[error("Pixel arrays have inconsistent lengths ({x}, {y}, {area}, {shape})")]
    MismatchedArrays {
        x: usize,
        y: usize,
        area: usize,
        shape: usize,
    },

    #[error("Invalid pixel type {0}; expected 0 (circle), 1 (hexagon) or 2 (square)")]
    InvalidPixelType(i32),
}

/// The physical shape of the pixels, which decides the neighbor-search
/// parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelShape {
    Circle,
    Hexagon,
    Square,
}

impl PixelShape {
    pub fn from_tag(tag: i32) -> Result<PixelShape, CameraGeometryError> {
        match tag {
            0 => Ok(PixelShape::Circle),
            1 => Ok(PixelShape::Hexagon),
            2 => Ok(PixelShape::Square),
            other => Err(CameraGeometryError::InvalidPixelType(other)),
        }
    }
}

/// The pixel layout of one camera. Pixel ids are the indices 0..n_pixels.
///
/// The neighbor graph is built once at construction by a k-nearest-neighbor
/// search with a shape-dependent radius multiplier, and is guaranteed
/// symmetric with no self loops. Border masks are memoized per width.
#[derive(Debug)]
pub struct CameraGeometry {
    pub camera_name: String,
    /// Pixel x positions on the focal plane \[m\]
    pub pix_x: Array1<f64>,
    /// Pixel y positions on the focal plane \[m\]
    pub pix_y: Array1<f64>,
    /// Pixel x positions in the field-of-view frame \[rad\]
    pub pix_x_fov: Array1<f64>,
    /// Pixel y positions in the field-of-view frame \[rad\]
    pub pix_y_fov: Array1<f64>,
    /// Pixel areas \[m^2\]
    pub pix_area: Array1<f64>,
    /// Raw pixel type tags (0 circle, 1 hexagon, 2 square)
    pub pix_type: Array1<i32>,
    /// Camera rotation \[deg\]
    pub cam_rotation: f64,
    /// Effective focal length used for the field-of-view projection \[m\]
    pub effective_focal_length: f64,
    neighbors: Vec<Vec<usize>>,
    border_masks: RwLock<HashMap<usize, Vec<bool>>>,
}

impl Clone for CameraGeometry {
    fn clone(&self) -> CameraGeometry {
        CameraGeometry {
            camera_name: self.camera_name.clone(),
            pix_x: self.pix_x.clone(),
            pix_y: self.pix_y.clone(),
            pix_x_fov: self.pix_x_fov.clone(),
            pix_y_fov: self.pix_y_fov.clone(),
            pix_area: self.pix_area.clone(),
            pix_type: self.pix_type.clone(),
            cam_rotation: self.cam_rotation,
            effective_focal_length: self.effective_focal_length,
            neighbors: self.neighbors.clone(),
            // The memoized masks are cheap to recompute; start fresh.
            border_masks: RwLock::new(HashMap::new()),
        }
    }
}

impl CameraGeometry {
    pub fn new(
        camera_name: String,
        pix_x: Array1<f64>,
        pix_y: Array1<f64>,
        pix_area: Array1<f64>,
        pix_type: Array1<i32>,
        cam_rotation: f64,
        diagonal_neighbors: bool,
    ) -> Result<CameraGeometry, CameraGeometryError> {
        if pix_x.len() != pix_y.len()
            || pix_x.len() != pix_area.len()
            || pix_x.len() != pix_type.len()
        {
            return Err(CameraGeometryError::MismatchedArrays {
                x: pix_x.len(),
                y: pix_y.len(),
                area: pix_area.len(),
                shape: pix_type.len(),
            });
        }
        let shape = match pix_type.first() {
            Some(&tag) => PixelShape::from_tag(tag)?,
            None => PixelShape::Hexagon,
        };
        let neighbors = build_neighbors(&pix_x, &pix_y, shape, diagonal_neighbors);
        let n_pixels = pix_x.len();
        Ok(CameraGeometry {
            camera_name,
            pix_x,
            pix_y,
            pix_x_fov: Array1::zeros(n_pixels),
            pix_y_fov: Array1::zeros(n_pixels),
            pix_area,
            pix_type,
            cam_rotation,
            effective_focal_length: 1.0,
            neighbors,
            border_masks: RwLock::new(HashMap::new()),
        })
    }

    /// Project the focal-plane positions into field-of-view angles using the
    /// effective focal length \[m\]. Called when the telescope description is
    /// assembled.
    pub fn set_effective_focal_length(&mut self, focal_length: f64) {
        self.effective_focal_length = focal_length;
        self.pix_x_fov = &self.pix_x / focal_length;
        self.pix_y_fov = &self.pix_y / focal_length;
    }

    pub fn n_pixels(&self) -> usize {
        self.pix_x.len()
    }

    pub fn shape(&self) -> PixelShape {
        self.pix_type
            .first()
            .and_then(|&t| PixelShape::from_tag(t).ok())
            .unwrap_or(PixelShape::Hexagon)
    }

    /// Neighbor pixel ids of `pixel`, sorted ascending.
    pub fn neighbors(&self, pixel: usize) -> &[usize] {
        &self.neighbors[pixel]
    }

    /// The sparse neighbor-graph product `neigh . v`: for each pixel, the
    /// number of its neighbors for which `selected` is true.
    pub fn count_selected_neighbors(&self, selected: &[bool]) -> Vec<u32> {
        self.neighbors
            .iter()
            .map(|neigh| neigh.iter().filter(|&&j| selected[j]).count() as u32)
            .collect()
    }

    /// Border-pixel mask: width 1 selects pixels whose degree is below the
    /// maximum degree of the graph; larger widths propagate inwards one
    /// neighbor step at a time. Memoized.
    pub fn border_pixel_mask(&self, width: usize) -> Vec<bool> {
        if let Some(mask) = self.border_masks.read().unwrap().get(&width) {
            return mask.clone();
        }
        debug!(
            "Computing border pixel mask for width {width} of camera {}",
            self.camera_name
        );

        let degrees: Vec<usize> = self.neighbors.iter().map(Vec::len).collect();
        let max_degree = degrees.iter().copied().max().unwrap_or(0);
        let mut mask: Vec<bool> = degrees.iter().map(|&d| d < max_degree).collect();
        for _ in 1..width {
            let grown = self.count_selected_neighbors(&mask);
            for (m, g) in mask.iter_mut().zip(grown) {
                *m = *m || g > 0;
            }
        }

        self.border_masks
            .write()
            .unwrap()
            .entry(width)
            .or_insert(mask)
            .clone()
    }
}

/// k-nearest-neighbor graph construction. Hexagonal and circular pixels look
/// for 6 candidates within 1.4x the nearest-neighbor distance; square pixels
/// for 4 within 1.4x, or 8 within 1.99x when diagonals are requested.
/// Distances compare squared, and the result is symmetrized.
fn build_neighbors(
    pix_x: &Array1<f64>,
    pix_y: &Array1<f64>,
    shape: PixelShape,
    diagonal: bool,
) -> Vec<Vec<usize>> {
    let n = pix_x.len();
    let (k, radius) = match shape {
        PixelShape::Circle | PixelShape::Hexagon => (6, NEIGHBOR_RADIUS_HEX),
        PixelShape::Square => {
            if diagonal {
                (8, NEIGHBOR_RADIUS_SQUARE_DIAGONAL)
            } else {
                (4, NEIGHBOR_RADIUS_HEX)
            }
        }
    };
    let radius_sq = radius * radius;

    let mut neighbors: Vec<Vec<usize>> = vec![Vec::with_capacity(k); n];
    let mut dist_sq = vec![(0usize, 0f64); n];
    for i in 0..n {
        for (j, d) in dist_sq.iter_mut().enumerate() {
            let dx = pix_x[i] - pix_x[j];
            let dy = pix_y[i] - pix_y[j];
            *d = (j, dx * dx + dy * dy);
        }
        dist_sq.sort_by(|a, b| a.1.total_cmp(&b.1));

        // dist_sq[0] is the pixel itself.
        let candidates = &dist_sq[1..(k + 1).min(n)];
        let min_sq = match candidates.first() {
            Some(&(_, d)) => d,
            None => continue,
        };
        for &(j, d) in candidates {
            if d < radius_sq * min_sq {
                neighbors[i].push(j);
            }
        }
    }

    // The per-pixel nearest distance varies across irregular layouts, which
    // can leave one-directional links; the graph invariant is symmetry.
    for i in 0..n {
        let linked = neighbors[i].clone();
        for j in linked {
            if !neighbors[j].contains(&i) {
                neighbors[j].push(i);
            }
        }
    }
    for neigh in &mut neighbors {
        neigh.sort_unstable();
    }
    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A square-pixel test camera on a regular grid with unit spacing.
    pub(crate) fn square_grid(n_side: usize) -> CameraGeometry {
        let n = n_side * n_side;
        let pix_x = Array1::from_iter((0..n).map(|i| (i % n_side) as f64));
        let pix_y = Array1::from_iter((0..n).map(|i| (i / n_side) as f64));
        CameraGeometry::new(
            format!("TestCam{n_side}x{n_side}"),
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
    fn square_grid_neighbors() {
        let cam = square_grid(4);
        assert_eq!(cam.neighbors(5), &[1, 4, 6, 9]);
        assert_eq!(cam.neighbors(0), &[1, 4]);
        assert_eq!(cam.neighbors(2), &[1, 3, 6]);
    }

    #[test]
    fn square_grid_diagonal_neighbors() {
        let n_side = 4;
        let n = n_side * n_side;
        let pix_x = Array1::from_iter((0..n).map(|i| (i % n_side) as f64));
        let pix_y = Array1::from_iter((0..n).map(|i| (i / n_side) as f64));
        let cam = CameraGeometry::new(
            "TestCamDiag".to_string(),
            pix_x,
            pix_y,
            Array1::ones(n),
            Array1::from_elem(n, 2),
            0.0,
            true,
        )
        .unwrap();
        assert_eq!(cam.neighbors(5), &[0, 1, 2, 4, 6, 8, 9, 10]);
    }

    #[test]
    fn neighbor_graph_is_symmetric_without_self_loops() {
        let cam = square_grid(5);
        for i in 0..cam.n_pixels() {
            assert!(!cam.neighbors(i).contains(&i));
            for &j in cam.neighbors(i) {
                assert!(cam.neighbors(j).contains(&i), "{j} does not link back to {i}");
            }
        }
    }

    #[test]
    fn border_mask_counts() {
        let cam = square_grid(5);
        let width1 = cam.border_pixel_mask(1);
        assert_eq!(width1.iter().filter(|&&m| m).count(), 16);
        let width2 = cam.border_pixel_mask(2);
        assert_eq!(width2.iter().filter(|&&m| m).count(), 24);
    }

    #[test]
    fn border_mask_grows_with_width() {
        let cam = square_grid(5);
        for width in 1..4 {
            let inner = cam.border_pixel_mask(width);
            let outer = cam.border_pixel_mask(width + 1);
            for (a, b) in inner.iter().zip(&outer) {
                assert!(!a | b);
            }
        }
    }

    #[test]
    fn hexagonal_row_layout() {
        // Two offset rows of hexagons: the middle pixel of the bottom row
        // touches its two row neighbors and the two pixels above.
        let pix_x = ndarray::array![0.0, 1.0, 2.0, 0.5, 1.5];
        let pix_y = ndarray::array![0.0, 0.0, 0.0, 0.866, 0.866];
        let cam = CameraGeometry::new(
            "HexTest".to_string(),
            pix_x,
            pix_y,
            Array1::ones(5),
            Array1::from_elem(5, 1),
            0.0,
            false,
        )
        .unwrap();
        assert_eq!(cam.neighbors(1), &[0, 2, 3, 4]);
    }
}
