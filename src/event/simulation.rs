// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use ndarray::prelude::*;

use crate::subarray::TelId;

/// Ground truth of one simulated air shower.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedShower {
    /// Primary particle energy \[TeV\]
    pub energy: f64,
    /// Shower altitude angle \[rad\]
    pub alt: f64,
    /// Shower azimuth angle \[rad\]
    pub az: f64,
    /// Core x position \[m\]
    pub core_x: f64,
    /// Core y position \[m\]
    pub core_y: f64,
    /// Height of the first interaction \[m\]
    pub h_first_int: f64,
    /// Depth of the shower maximum \[g/cm^2\]
    pub x_max: f64,
    /// Height of the shower maximum \[m\]
    pub h_max: f64,
    /// Atmospheric depth where the primary was injected \[g/cm^2\]
    pub starting_grammage: f64,
    /// Primary particle id
    pub shower_primary_id: i32,
}

/// Noise-free photo-electron image of one telescope.
#[derive(Clone, Debug)]
pub struct SimulatedCamera {
    pub true_image: Array1<i32>,
    pub true_image_sum: i32,
    /// True impact parameter of the shower axis for this telescope \[m\]
    pub impact_parameter: f64,
}

/// Simulation truth attached to one event: the shower that produced it and
/// the per-telescope true images.
#[derive(Clone, Debug, Default)]
pub struct SimulatedEvent {
    pub shower: SimulatedShower,
    pub tels: BTreeMap<TelId, SimulatedCamera>,
}
