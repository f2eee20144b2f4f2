// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

use super::parameters::ImageParameters;

/// Cleaned image of one telescope plus its parametrization.
#[derive(Clone, Debug)]
pub struct Dl1Camera {
    /// Charge per pixel, copied from DL0 \[p.e.\]
    pub image: Array1<f64>,
    /// Peak time per pixel \[ns\]
    pub peak_time: Array1<f64>,
    /// Cleaning mask; true where the pixel survived.
    pub mask: Vec<bool>,
    pub parameters: ImageParameters,
}
