// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use crate::subarray::TelId;

/// Where one telescope was pointing at trigger time \[rad\].
#[derive(Clone, Copy, Debug, Default)]
pub struct TelescopePointing {
    pub azimuth: f64,
    pub altitude: f64,
}

/// Array and per-telescope pointing of one event \[rad\].
#[derive(Clone, Debug, Default)]
pub struct Pointing {
    pub array_azimuth: f64,
    pub array_altitude: f64,
    pub tels: BTreeMap<TelId, TelescopePointing>,
}

impl Pointing {
    /// The per-telescope pointing, falling back on the array pointing for
    /// telescopes that did not report their own.
    pub fn tel_pointing(&self, tel_id: TelId) -> TelescopePointing {
        self.tels.get(&tel_id).copied().unwrap_or(TelescopePointing {
            azimuth: self.array_azimuth,
            altitude: self.array_altitude,
        })
    }
}
