// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

/// Integrated per-pixel charges and pulse arrival times of one telescope.
#[derive(Clone, Debug)]
pub struct Dl0Camera {
    /// Integrated charge per pixel \[p.e.\]
    pub image: Array1<f64>,
    /// Pulse peak time per pixel \[ns\]
    pub peak_time: Array1<f64>,
}
