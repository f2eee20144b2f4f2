// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The telescope array: per-telescope descriptions and ground positions.

use std::collections::BTreeMap;

use crate::camera::CameraDescription;

/// Telescope identifier as carried by the event stream. Ids are sparse and
/// need not start at zero.
pub type TelId = i32;

/// Optical parameters of one telescope.
#[derive(Clone, Debug)]
pub struct OpticsDescription {
    pub optics_name: String,
    pub num_mirrors: i32,
    /// Total reflective mirror area \[m^2\]
    pub mirror_area: f64,
    /// Equivalent focal length \[m\]
    pub equivalent_focal_length: f64,
    /// Effective focal length, including the camera plate scale \[m\]
    pub effective_focal_length: f64,
}

/// A telescope pairs a camera (geometry and readout) with its optics.
#[derive(Clone, Debug)]
pub struct TelescopeDescription {
    pub camera: CameraDescription,
    pub optics: OpticsDescription,
}

impl TelescopeDescription {
    pub fn new(mut camera: CameraDescription, optics: OpticsDescription) -> TelescopeDescription {
        camera
            .geometry
            .set_effective_focal_length(optics.effective_focal_length);
        TelescopeDescription { camera, optics }
    }
}

/// The subarray: telescope descriptions and positions keyed by telescope id.
/// Built once by the event source and shared read-only by the processors.
#[derive(Clone, Debug, Default)]
pub struct SubarrayDescription {
    pub tels: BTreeMap<TelId, TelescopeDescription>,
    /// Telescope positions relative to the array reference point \[m\]
    pub tel_positions: BTreeMap<TelId, [f64; 3]>,
    /// Array reference position \[m\]
    pub reference_position: [f64; 3],
}

impl SubarrayDescription {
    pub fn n_tels(&self) -> usize {
        self.tels.len()
    }

    pub fn tel_ids(&self) -> Vec<TelId> {
        self.tels.keys().copied().collect()
    }

    pub fn position(&self, tel_id: TelId) -> Option<[f64; 3]> {
        self.tel_positions.get(&tel_id).copied()
    }
}
