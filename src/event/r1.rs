// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

/// Calibrated single-channel waveforms of one telescope: pedestal
/// subtracted, scaled to photo-electrons, with the retained gain channel
/// recorded per pixel.
#[derive(Clone, Debug)]
pub struct R1Camera {
    /// Shape (n_pixels, n_samples)
    pub waveform: Array2<f64>,
    /// Which gain channel was kept per pixel (0 high, 1 low).
    pub gain_selection: Array1<i32>,
}

impl R1Camera {
    pub fn n_pixels(&self) -> usize {
        self.waveform.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.waveform.ncols()
    }
}
