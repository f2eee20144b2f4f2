// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Static configuration of the simulation run, decoded from the MC run
//! header.

/// The subset of the MC run header that downstream analysis cares about.
/// Angles are radians, energies TeV, lengths metres.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationConfig {
    /// Original simulation run number
    pub run_number: i32,
    /// Air-shower program version * 1000
    pub corsika_version: f64,
    /// Detector-simulation program version * 1000
    pub simtel_version: f64,
    /// Lower limit of the simulated primary energy range \[TeV\]
    pub energy_range_min: f64,
    /// Upper limit of the simulated primary energy range \[TeV\]
    pub energy_range_max: f64,
    /// Power-law spectral index of the generated spectrum
    pub spectral_index: f64,
    /// Height of the observation level \[m\]
    pub obs_level: f64,
    /// Core scatter mode (0 circular, 1 rectangular)
    pub core_pos_mode: i32,
    /// Core scatter range along x (or scatter radius) \[m\]
    pub core_range_x: f64,
    /// Core scatter range along y \[m\]
    pub core_range_y: f64,
    /// Inner viewcone angle \[rad\]
    pub viewcone_min: f64,
    /// Outer viewcone angle \[rad\]
    pub viewcone_max: f64,
    /// Number of simulated showers in the run
    pub n_showers: i32,
    /// How often each shower is reused with a rethrown core
    pub shower_reuse: i32,
    /// Primary particle id of the run
    pub primary_id: i32,
    /// Injection height of the primary \[m\]
    pub injection_height: f64,
    /// Identifier of the atmosphere profile in use
    pub atmosphere_id: i32,
}
