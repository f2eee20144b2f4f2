// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::subarray::TelId;

/// Reconstructed shower geometry from one reconstructor. Angles in radians,
/// positions in metres. The uncertainties are the weighted variances of the
/// intersection cloud.
#[derive(Clone, Debug)]
pub struct ReconstructedGeometry {
    pub is_valid: bool,
    pub alt: f64,
    pub az: f64,
    pub alt_uncertainty: f64,
    pub az_uncertainty: f64,
    pub core_x: f64,
    pub core_y: f64,
    pub tilted_core_x: f64,
    pub tilted_core_y: f64,
    pub tilted_core_uncertainty_x: f64,
    pub tilted_core_uncertainty_y: f64,
    /// Height of the shower maximum \[m\]
    pub hmax: f64,
    /// Angular separation from the simulated direction, when available
    pub direction_error: f64,
    /// Telescopes that entered the stereo combination.
    pub telescopes: Vec<TelId>,
}

impl Default for ReconstructedGeometry {
    fn default() -> ReconstructedGeometry {
        ReconstructedGeometry {
            is_valid: false,
            alt: f64::NAN,
            az: f64::NAN,
            alt_uncertainty: f64::NAN,
            az_uncertainty: f64::NAN,
            core_x: f64::NAN,
            core_y: f64::NAN,
            tilted_core_x: f64::NAN,
            tilted_core_y: f64::NAN,
            tilted_core_uncertainty_x: f64::NAN,
            tilted_core_uncertainty_y: f64::NAN,
            hmax: f64::NAN,
            direction_error: f64::NAN,
            telescopes: Vec::new(),
        }
    }
}

/// Estimated primary energy from one reconstructor. A hook for estimator
/// models; nothing in this crate fills it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconstructedEnergy {
    pub estimate_energy: f64,
    pub is_valid: bool,
}

/// Distance from a telescope to the reconstructed shower axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct TelImpactParameter {
    /// \[m\]
    pub distance: f64,
    pub distance_uncertainty: f64,
}

/// Per-telescope quantities derived from a reconstructed geometry.
#[derive(Clone, Debug, Default)]
pub struct TelReconstruction {
    /// Impact parameter per reconstructor name.
    pub impact: BTreeMap<String, TelImpactParameter>,
    pub estimate_energy: f64,
    pub estimate_disp: f64,
}

/// Reconstructed shower information for one event, keyed by reconstructor
/// name in configuration order.
#[derive(Clone, Debug, Default)]
pub struct Dl2Event {
    pub geometry: IndexMap<String, ReconstructedGeometry>,
    pub energy: IndexMap<String, ReconstructedEnergy>,
    pub tels: BTreeMap<TelId, TelReconstruction>,
}

impl Dl2Event {
    pub fn add_tel_impact(&mut self, tel_id: TelId, reconstructor: &str, distance: f64) {
        self.tels
            .entry(tel_id)
            .or_default()
            .impact
            .insert(reconstructor.to_string(), TelImpactParameter {
                distance,
                distance_uncertainty: 0.0,
            });
    }
}
