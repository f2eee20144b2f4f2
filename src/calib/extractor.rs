// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Charge extraction from calibrated waveforms.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use ndarray::prelude::*;
use strum_macros::{Display, EnumIter, EnumString};

use crate::camera::CameraReadout;
use crate::config::{get_bool, get_i64, ConfigError};
use crate::subarray::TelId;

/// The closed set of charge extractors selectable from configuration.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, PartialEq, Eq)]
pub enum ExtractorKind {
    FullWaveFormExtractor,
    LocalPeakExtractor,
}

/// Sum `waveform[pixel, start..end)` where the window is
/// `[peak - shift, peak - shift + width)` clipped to the valid sample range,
/// and compute the intensity-weighted peak time \[ns\] over the positive
/// samples of the window. Pixels with zero integrated charge get peak time
/// zero rather than a division by zero.
pub fn extract_around_peak(
    waveform: &Array2<f64>,
    peak_index: &[usize],
    window_width: usize,
    window_shift: usize,
    sampling_rate_ghz: f64,
) -> (Array1<f64>, Array1<f64>) {
    let n_pixels = waveform.nrows();
    let n_samples = waveform.ncols();
    let mut charge = Array1::zeros(n_pixels);
    let mut peak_time = Array1::zeros(n_pixels);

    for pixel in 0..n_pixels {
        let window_start = peak_index[pixel] as isize - window_shift as isize;
        let window_end = window_start + window_width as isize;
        let start = window_start.max(0) as usize;
        let end = (window_end.max(0) as usize).min(n_samples);

        let mut sum = 0.0;
        let mut time_sum = 0.0;
        for sample in start..end {
            let value = waveform[(pixel, sample)];
            sum += value;
            if value > 0.0 {
                time_sum += sample as f64 * value;
            }
        }
        charge[pixel] = sum;
        peak_time[pixel] = if sum != 0.0 {
            time_sum / sum / sampling_rate_ghz
        } else {
            0.0
        };
    }
    (charge, peak_time)
}

/// Per-channel integration correction from the reference pulse shape.
///
/// The reference pulse is resampled into bins of the digitization width by
/// first-touch assignment (each reference sample lands in the first bin
/// containing its time), normalized to unit total, and integrated over the
/// same window the extractor uses around the resampled peak. The correction
/// is the inverse of that integral, or 1.0 when the integral vanishes.
pub fn compute_integration_correction(
    reference_pulse: &Array2<f64>,
    reference_pulse_sample_width_ns: f64,
    sample_width_ns: f64,
    window_width: usize,
    window_shift: usize,
) -> Vec<f64> {
    let n_channels = reference_pulse.nrows();
    let mut correction = vec![1.0; n_channels];

    for (channel, corr) in correction.iter_mut().enumerate() {
        let pulse = reference_pulse.row(channel);
        if pulse.is_empty() {
            continue;
        }
        let max_pulse_time = (pulse.len() as f64 - 0.5) * reference_pulse_sample_width_ns;
        let n_bins = (max_pulse_time / sample_width_ns).ceil() as usize;
        if n_bins == 0 {
            continue;
        }
        let bin_width = max_pulse_time / n_bins as f64;

        let mut sampled = vec![0.0; n_bins];
        for (i, &value) in pulse.iter().enumerate() {
            let time = (i as f64 + 0.5) * reference_pulse_sample_width_ns;
            let bin = ((time / bin_width) as usize).min(n_bins - 1);
            sampled[bin] += value;
        }
        let total_weight: f64 = pulse.sum();
        if total_weight != 0.0 {
            for s in &mut sampled {
                *s /= total_weight;
            }
        }

        let peak_bin = sampled
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let start = peak_bin.saturating_sub(window_shift);
        let end = (start + window_width).min(n_bins);
        if start >= end {
            continue;
        }
        let integral: f64 = sampled[start..end].iter().sum();
        if integral != 0.0 {
            *corr = 1.0 / integral;
        }
    }
    correction
}

/// Integrate every sample of every pixel: window = full trace, shift = 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullWaveFormExtractor;

impl FullWaveFormExtractor {
    pub fn extract(
        &self,
        waveform: &Array2<f64>,
        sampling_rate_ghz: f64,
    ) -> (Array1<f64>, Array1<f64>) {
        let peaks = vec![0; waveform.nrows()];
        extract_around_peak(waveform, &peaks, waveform.ncols(), 0, sampling_rate_ghz)
    }
}

/// Integrate a fixed window around each pixel's sample maximum, optionally
/// corrected for the charge fraction the window misses on the reference
/// pulse. The correction vector is computed once per telescope.
#[derive(Debug)]
pub struct LocalPeakExtractor {
    window_width: usize,
    window_shift: usize,
    apply_correction: bool,
    corrections: Mutex<HashMap<TelId, Arc<Vec<f64>>>>,
}

impl LocalPeakExtractor {
    pub fn new(config: Option<&serde_json::Value>) -> Result<LocalPeakExtractor, ConfigError> {
        let defaults = LocalPeakExtractor::default_config();
        let config = config.unwrap_or(&defaults);
        Ok(LocalPeakExtractor {
            window_width: get_i64(config, "window_width")? as usize,
            window_shift: get_i64(config, "window_shift")? as usize,
            apply_correction: get_bool(config, "apply_correction")?,
            corrections: Mutex::new(HashMap::new()),
        })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "window_width": 7,
            "window_shift": 3,
            "apply_correction": true,
        })
    }

    pub fn extract(
        &self,
        waveform: &Array2<f64>,
        gain_selection: &Array1<i32>,
        readout: &CameraReadout,
        tel_id: TelId,
    ) -> (Array1<f64>, Array1<f64>) {
        let peaks: Vec<usize> = (0..waveform.nrows())
            .map(|pixel| {
                waveform
                    .row(pixel)
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
            .collect();
        let (mut charge, peak_time) = extract_around_peak(
            waveform,
            &peaks,
            self.window_width,
            self.window_shift,
            readout.sampling_rate,
        );

        if self.apply_correction {
            let correction = self.correction_for(readout, tel_id);
            if !correction.is_empty() {
                for (pixel, value) in charge.iter_mut().enumerate() {
                    let channel = (gain_selection[pixel] as usize).min(correction.len() - 1);
                    *value *= correction[channel];
                }
            }
        }
        (charge, peak_time)
    }

    fn correction_for(&self, readout: &CameraReadout, tel_id: TelId) -> Arc<Vec<f64>> {
        let mut cache = self.corrections.lock().unwrap();
        Arc::clone(cache.entry(tel_id).or_insert_with(|| {
            debug!("Computing integration correction for telescope {tel_id}");
            Arc::new(compute_integration_correction(
                &readout.reference_pulse_shape,
                readout.reference_pulse_sample_width,
                readout.sample_width_ns(),
                self.window_width,
                self.window_shift,
            ))
        }))
    }
}

/// The extractor chosen by the calibrator configuration.
#[derive(Debug)]
pub enum ImageExtractor {
    FullWaveForm(FullWaveFormExtractor),
    LocalPeak(LocalPeakExtractor),
}

impl ImageExtractor {
    pub fn extract(
        &self,
        waveform: &Array2<f64>,
        gain_selection: &Array1<i32>,
        readout: &CameraReadout,
        tel_id: TelId,
    ) -> (Array1<f64>, Array1<f64>) {
        match self {
            ImageExtractor::FullWaveForm(e) => e.extract(waveform, readout.sampling_rate),
            ImageExtractor::LocalPeak(e) => e.extract(waveform, gain_selection, readout, tel_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn full_waveform_charges_and_times() {
        // Pixel k carries the constant trace [k, k, k, k] at 1 GHz.
        let n_pixels = 5;
        let waveform = Array2::from_shape_fn((n_pixels, 4), |(pixel, _)| pixel as f64);
        let (charge, peak_time) = FullWaveFormExtractor.extract(&waveform, 1.0);
        for k in 0..n_pixels {
            assert_abs_diff_eq!(charge[k], 4.0 * k as f64, epsilon = 1e-12);
            let expected = if k == 0 { 0.0 } else { 1.5 };
            assert_abs_diff_eq!(peak_time[k], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn window_is_clipped_at_the_trace_edges() {
        let mut waveform = Array2::zeros((1, 6));
        waveform[(0, 0)] = 10.0;
        waveform[(0, 1)] = 4.0;
        // Peak at sample 0 with shift 3: the window [-3, 4) clips to [0, 4).
        let (charge, _) = extract_around_peak(&waveform, &[0], 7, 3, 1.0);
        assert_abs_diff_eq!(charge[0], 14.0, epsilon = 1e-12);

        // Peak at the last sample: [2, 9) clips to [2, 6).
        let mut waveform = Array2::zeros((1, 6));
        waveform[(0, 5)] = 8.0;
        waveform[(0, 4)] = 2.0;
        let (charge, peak_time) = extract_around_peak(&waveform, &[5], 7, 3, 1.0);
        assert_abs_diff_eq!(charge[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(peak_time[0], (4.0 * 2.0 + 5.0 * 8.0) / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn local_peak_extracts_the_pulse() {
        let readout = test_readout();
        let extractor = LocalPeakExtractor::new(Some(&serde_json::json!({
            "window_width": 3,
            "window_shift": 1,
            "apply_correction": false,
        })))
        .unwrap();
        let mut waveform = Array2::zeros((1, 10));
        for (sample, value) in [(3, 1.0), (4, 5.0), (5, 2.0)] {
            waveform[(0, sample)] = value;
        }
        let gains = Array1::zeros(1);
        let (charge, peak_time) = extractor.extract(&waveform, &gains, &readout, 1);
        assert_abs_diff_eq!(charge[0], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            peak_time[0],
            (3.0 + 4.0 * 5.0 + 5.0 * 2.0) / 8.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn integration_correction_inverts_the_window_fraction() {
        // A triangular reference pulse sampled at the digitization width:
        // resampling is then the identity and the correction is the inverse
        // of the in-window fraction.
        let pulse = ndarray::array![[0.0, 1.0, 4.0, 1.0, 0.0, 0.0]];
        let correction = compute_integration_correction(&pulse, 1.0, 1.0, 3, 1);
        // Window [1, 4) holds everything.
        assert_abs_diff_eq!(correction[0], 1.0, epsilon = 1e-9);

        let narrow = compute_integration_correction(&pulse, 1.0, 1.0, 1, 0);
        // Window [2, 3) holds 4/6 of the pulse.
        assert_abs_diff_eq!(narrow[0], 6.0 / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn correction_is_memoized_and_applied_per_channel() {
        let readout = test_readout();
        let extractor = LocalPeakExtractor::new(Some(&serde_json::json!({
            "window_width": 1,
            "window_shift": 0,
            "apply_correction": true,
        })))
        .unwrap();
        let mut waveform = Array2::zeros((2, 6));
        waveform[(0, 2)] = 4.0;
        waveform[(1, 2)] = 4.0;
        let gains = ndarray::array![0, 1];
        let (charge, _) = extractor.extract(&waveform, &gains, &readout, 7);
        // Channel 0 reference pulse concentrates 4/6 in the peak bin;
        // channel 1 is flat over 6 bins.
        assert_abs_diff_eq!(charge[0], 4.0 * 6.0 / 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(charge[1], 4.0 * 6.0, epsilon = 1e-9);
        assert_eq!(extractor.corrections.lock().unwrap().len(), 1);
    }

    fn test_readout() -> CameraReadout {
        CameraReadout {
            camera_name: "TestCam".to_string(),
            sampling_rate: 1.0,
            reference_pulse_shape: ndarray::array![
                [0.0, 1.0, 4.0, 1.0, 0.0, 0.0],
                [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
            ],
            reference_pulse_sample_width: 1.0,
            n_channels: 2,
            n_pixels: 2,
            n_samples: 6,
        }
    }
}
