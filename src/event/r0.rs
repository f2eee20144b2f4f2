// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

/// Raw ADC waveforms of one telescope, shape (n_pixels, n_samples) per gain
/// channel. Channel 0 is high gain, channel 1 low gain; single-channel
/// cameras leave channel 1 all zero.
#[derive(Clone, Debug)]
pub struct R0Camera {
    pub waveform: [Array2<u16>; 2],
    /// Per-pixel sum over samples, populated only by some input variants.
    pub waveform_sum: Option<[Array1<u32>; 2]>,
}

impl R0Camera {
    pub fn n_pixels(&self) -> usize {
        self.waveform[0].nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.waveform[0].ncols()
    }
}
