// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tabulated atmosphere model carried by simulation inputs.

use ndarray::prelude::*;

/// Atmospheric profile as a table over altitude levels. Only table lookup is
/// supported; the profile is carried through to the output file as-is.
#[derive(Clone, Debug, Default)]
pub struct TableAtmosphereModel {
    pub name: String,
    /// Altitude above sea level \[km\]
    pub alt_km: Array1<f64>,
    /// Density at each level \[g/cm^3\]
    pub rho: Array1<f64>,
    /// Vertical column density from space down to each level \[g/cm^2\]
    pub thick: Array1<f64>,
    /// Index of refraction minus one at each level
    pub refidx_m1: Array1<f64>,
}

impl TableAtmosphereModel {
    pub fn n_levels(&self) -> usize {
        self.alt_km.len()
    }
}
