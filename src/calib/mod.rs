// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Waveform calibration: gain selection, R0 to R1 conversion and the
//! R1 to DL0 charge extraction.

mod extractor;

pub use extractor::{
    compute_integration_correction, extract_around_peak, ExtractorKind, FullWaveFormExtractor,
    ImageExtractor, LocalPeakExtractor,
};

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::prelude::*;
use rayon::prelude::*;

use crate::config::{get_str, merge_with_defaults, ConfigError};
use crate::event::{ArrayEvent, Dl0Camera, Dl0Event, R0Camera, R1Camera, TelMonitor};
use crate::subarray::{SubarrayDescription, TelId};

/// Decide the retained gain channel per pixel. If the low-gain channel never
/// fired (all zero), everything stays on high gain; otherwise a pixel moves
/// to low gain as soon as any of its high-gain samples exceeds the
/// saturation threshold.
pub fn select_gain_channel(waveform: &[Array2<u16>; 2], threshold: f64) -> Array1<i32> {
    let n_pixels = waveform[0].nrows();
    if waveform[1].iter().all(|&s| s == 0) {
        return Array1::zeros(n_pixels);
    }
    Array1::from_iter((0..n_pixels).map(|pixel| {
        let saturated = waveform[0]
            .row(pixel)
            .iter()
            .any(|&s| f64::from(s) > threshold);
        i32::from(saturated)
    }))
}

/// R0 to R1: keep one gain channel per pixel, subtract its pedestal and
/// scale ADC counts to photo-electrons with the monitor calibration.
pub fn r0_to_r1(r0: &R0Camera, monitor: &TelMonitor, gain_threshold: f64) -> R1Camera {
    let n_pixels = r0.n_pixels();
    let n_samples = r0.n_samples();
    let gain_selection = select_gain_channel(&r0.waveform, gain_threshold);

    let mut waveform = Array2::zeros((n_pixels, n_samples));
    for pixel in 0..n_pixels {
        let channel = gain_selection[pixel] as usize;
        let pedestal = monitor.pedestal_per_sample[channel][pixel];
        let scale = monitor.dc_to_pe[channel][pixel];
        for sample in 0..n_samples {
            waveform[(pixel, sample)] =
                (f64::from(r0.waveform[channel][(pixel, sample)]) - pedestal) * scale;
        }
    }
    R1Camera {
        waveform,
        gain_selection,
    }
}

/// The R1 to DL0 stage: per-telescope windowed pulse integration with an
/// extractor chosen by configuration.
pub struct Calibrator {
    subarray: Arc<SubarrayDescription>,
    extractor: ImageExtractor,
}

impl Calibrator {
    pub fn new(
        subarray: Arc<SubarrayDescription>,
        config: Option<&serde_json::Value>,
    ) -> Result<Calibrator, ConfigError> {
        let config = merge_with_defaults(Calibrator::default_config(), config);
        let kind_tag = get_str(&config, "image_extractor_type")?;
        let kind = ExtractorKind::from_str(&kind_tag).map_err(|_| ConfigError::BadValue {
            key: "image_extractor_type".to_string(),
            value: kind_tag,
        })?;
        let extractor = match kind {
            ExtractorKind::FullWaveFormExtractor => {
                ImageExtractor::FullWaveForm(FullWaveFormExtractor)
            }
            ExtractorKind::LocalPeakExtractor => ImageExtractor::LocalPeak(
                LocalPeakExtractor::new(config.get("LocalPeakExtractor"))?,
            ),
        };
        Ok(Calibrator {
            subarray,
            extractor,
        })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "image_extractor_type": "LocalPeakExtractor",
            "LocalPeakExtractor": LocalPeakExtractor::default_config(),
        })
    }

    /// Populate DL0 from R1. Telescopes are independent, so the per-pixel
    /// integration runs on the rayon pool.
    pub fn calibrate(&self, event: &mut ArrayEvent) {
        let r1 = match &event.r1 {
            Some(r1) => r1,
            None => return,
        };
        let extracted: Vec<(TelId, Dl0Camera)> = r1
            .tels
            .par_iter()
            .filter_map(|(&tel_id, camera)| {
                let readout = &self.subarray.tels.get(&tel_id)?.camera.readout;
                let (image, peak_time) = self.extractor.extract(
                    &camera.waveform,
                    &camera.gain_selection,
                    readout,
                    tel_id,
                );
                Some((tel_id, Dl0Camera { image, peak_time }))
            })
            .collect();

        let mut dl0 = Dl0Event::new();
        dl0.tels = extracted.into_iter().collect::<BTreeMap<_, _>>();
        event.dl0 = Some(dl0);
    }
}
