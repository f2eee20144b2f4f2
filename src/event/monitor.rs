// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

/// Per-telescope calibration monitor data: pedestals and DC-to-photoelectron
/// conversion per gain channel. Updated by monitor blocks in the stream and
/// snapshotted into each event.
#[derive(Clone, Debug)]
pub struct TelMonitor {
    pub n_channels: usize,
    pub n_pixels: usize,
    /// Pedestal per sample, per channel and pixel \[ADC\]
    pub pedestal_per_sample: [Array1<f64>; 2],
    /// ADC-to-p.e. conversion factor per channel and pixel
    pub dc_to_pe: [Array1<f64>; 2],
}

impl TelMonitor {
    /// Neutral monitor for inputs that never send calibration blocks: zero
    /// pedestal, unit gain.
    pub fn unit(n_pixels: usize) -> TelMonitor {
        TelMonitor {
            n_channels: 2,
            n_pixels,
            pedestal_per_sample: [Array1::zeros(n_pixels), Array1::zeros(n_pixels)],
            dc_to_pe: [Array1::ones(n_pixels), Array1::ones(n_pixels)],
        }
    }
}
