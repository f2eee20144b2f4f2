// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The sequential event-processing pipeline behind the `convert`
//! subcommand: source -> calibrator -> image processor -> shower processor
//! -> writer, with quality histograms filled along the way.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};

use crate::calib::Calibrator;
use crate::error::LactError;
use crate::image::ImageProcessor;
use crate::io::write::DataWriter;
use crate::reco::{HillasReconstructor, ShowerProcessor};
use crate::source::{SimtelEventSource, SourceOptions};
use crate::stats::{Axis, Histogram, Histogram1D, Statistics};
use crate::subarray::TelId;

/// Options of one `convert` run.
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Maximum number of events; -1 for unlimited.
    pub max_events: i64,
    /// Telescope filter; empty selects the whole array.
    pub allowed_tels: Vec<TelId>,
    /// Component configuration patch (see each component's
    /// `default_config`).
    pub config: Option<serde_json::Value>,
    /// Checked between events; set it to stop the run early.
    pub cancel: Option<Arc<AtomicBool>>,
    pub show_progress: bool,
    /// URL (or mount) prefix for `/eos` paths.
    pub url_prefix: String,
}

impl Default for PipelineOptions {
    fn default() -> PipelineOptions {
        PipelineOptions {
            max_events: -1,
            allowed_tels: Vec::new(),
            config: None,
            cancel: None,
            show_progress: false,
            url_prefix: String::new(),
        }
    }
}

/// What a pipeline run produced.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertSummary {
    pub n_events: u64,
    pub n_reconstructed: u64,
    pub cancelled: bool,
}

fn quality_statistics() -> Statistics {
    let mut statistics = Statistics::new();
    if let Ok(axis) = Axis::log(1.0, 1.0e6, 60) {
        statistics.add_histogram("hillas_intensity", Histogram::One(Histogram1D::new(axis)));
    }
    statistics.add_histogram(
        "multiplicity",
        Histogram::One(Histogram1D::new(Axis::regular(0.0, 50.0, 50))),
    );
    statistics.add_histogram(
        "direction_error",
        Histogram::One(Histogram1D::new(Axis::regular(0.0, 0.1, 100))),
    );
    statistics
}

/// Run the whole pipeline over one input file.
pub fn run_convert(
    input: &Path,
    output: &Path,
    options: PipelineOptions,
) -> Result<ConvertSummary, LactError> {
    let config = options.config.as_ref();
    let mut source_options: SourceOptions = match config.and_then(|c| c.get("SimtelEventSource")) {
        Some(section) => serde_json::from_value(section.clone())
            .map_err(|e| LactError::Config(format!("Bad SimtelEventSource section: {e}")))?,
        None => SourceOptions::default(),
    };
    // Command-line switches take precedence over the configuration file.
    source_options.max_events = options.max_events;
    if !options.allowed_tels.is_empty() {
        source_options.allowed_tels = options.allowed_tels.clone();
    }
    if !options.url_prefix.is_empty() {
        source_options.url_prefix = options.url_prefix.clone();
    }
    let mut source = SimtelEventSource::new(input, source_options)?;
    let subarray = source.subarray();
    info!(
        "Processing {} with {} telescopes",
        input.display(),
        subarray.n_tels()
    );

    let calibrator = Calibrator::new(
        Arc::clone(&subarray),
        config.and_then(|c| c.get("Calibrator")),
    )?;
    let image_processor = ImageProcessor::new(
        Arc::clone(&subarray),
        config.and_then(|c| c.get("ImageProcessor")),
    )?;
    let shower_processor = ShowerProcessor::new(
        Arc::clone(&subarray),
        config.and_then(|c| c.get("ShowerProcessor")),
    )?;

    let mut writer = DataWriter::new(output, config.and_then(|c| c.get("DataWriter")))?;
    writer.write_subarray(&subarray)?;
    if let Some(atmosphere) = source.atmosphere() {
        writer.write_atmosphere(atmosphere)?;
    }
    if let Some(simulation_config) = source.simulation_config() {
        writer.write_simulation_config(simulation_config)?;
    }
    let metadata: Vec<(TelId, String, String)> = source
        .global_metadata()
        .iter()
        .map(|(name, value)| (-1, name.clone(), value.clone()))
        .chain(source.tel_metadata().iter().flat_map(|(tel_id, entries)| {
            entries
                .iter()
                .map(move |(name, value)| (*tel_id, name.clone(), value.clone()))
        }))
        .collect();
    writer.write_metadata(
        metadata
            .iter()
            .map(|(tel_id, name, value)| (*tel_id, name.as_str(), value.as_str())),
    )?;

    let mut statistics = quality_statistics();
    let mut summary = ConvertSummary::default();
    let progress = progress_bar(options.show_progress);

    loop {
        if let Some(cancel) = &options.cancel {
            if cancel.load(Ordering::Relaxed) {
                info!("Cancellation requested; stopping before the next event");
                summary.cancelled = true;
                break;
            }
        }
        let mut event = match source.next_event()? {
            Some(event) => event,
            None => break,
        };

        calibrator.calibrate(&mut event);
        image_processor.process(&mut event);
        shower_processor.process(&mut event);

        if let Some(dl1) = &event.dl1 {
            statistics.fill_1d("multiplicity", dl1.tels.len() as f64);
            for camera in dl1.tels.values() {
                statistics.fill_1d("hillas_intensity", camera.parameters.hillas.intensity);
            }
        }
        if let Some(dl2) = &event.dl2 {
            if let Some(geometry) = dl2.geometry.get(HillasReconstructor::NAME) {
                if geometry.is_valid {
                    summary.n_reconstructed += 1;
                    if geometry.direction_error.is_finite() {
                        statistics.fill_1d("direction_error", geometry.direction_error);
                    }
                }
            }
        }

        writer.write_event(&event)?;
        summary.n_events += 1;
        progress.inc(1);
    }
    progress.finish_and_clear();

    writer.write_statistics(&statistics)?;
    writer.close()?;
    debug!(
        "Sync recovery skipped {} bytes over the whole stream",
        source.skipped_bytes()
    );
    info!(
        "Wrote {} events ({} with a valid stereo geometry) to {}",
        summary.n_events,
        summary.n_reconstructed,
        output.display()
    );
    Ok(summary)
}

fn progress_bar(visible: bool) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {pos} events processed")
            .unwrap(),
    );
    if !visible {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }
    bar
}
