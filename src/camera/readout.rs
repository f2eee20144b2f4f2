// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera readout parameters.

use ndarray::prelude::*;

/// Waveform digitization parameters of one camera.
#[derive(Clone, Debug)]
pub struct CameraReadout {
    pub camera_name: String,
    /// Sampling rate of the waveform \[GHz\]
    pub sampling_rate: f64,
    /// Expected pulse shape for a signal, one row per gain channel.
    pub reference_pulse_shape: Array2<f64>,
    /// Time covered by one sample of the reference pulse shape \[ns\]
    pub reference_pulse_sample_width: f64,
    /// Number of gain channels (1 or 2)
    pub n_channels: usize,
    pub n_pixels: usize,
    /// Number of waveform samples for normal events
    pub n_samples: usize,
}

impl CameraReadout {
    /// Width of one digitized sample \[ns\].
    pub fn sample_width_ns(&self) -> f64 {
        1.0 / self.sampling_rate
    }
}
