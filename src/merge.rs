// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Merging several data files into one: the first input seeds the static
//! metadata, statistics add up, and every event is re-emitted in order.
//!
//! The output is indistinguishable from a single-run file, except that
//! event ids must already be unique across the inputs; that is the
//! caller's responsibility.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn};
use thiserror::Error;

use crate::config::merge_with_defaults;
use crate::io::read::{DataFileReader, ReaderError};
use crate::io::write::{DataWriter, WriterError};
use crate::stats::{Statistics, StatsError};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("No input files were given")]
    NoInputs,

    #[error("{0}")]
    Reader(#[from] ReaderError),

    #[error("{0}")]
    Writer(#[from] WriterError),

    #[error("Statistics of the inputs don't line up: {0}")]
    Stats(#[from] StatsError),
}

/// What `merge_files` did.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeSummary {
    pub n_inputs: usize,
    pub n_events: u64,
}

/// A merge re-emits every level it finds, so the default configuration
/// turns every level on; a caller patch can narrow that down.
pub fn merge_default_config() -> serde_json::Value {
    let mut config = DataWriter::default_config();
    for key in [
        "write_r0",
        "write_r1",
        "write_dl0",
        "write_dl1",
        "write_dl1_image",
        "write_dl2",
        "write_monitor",
        "write_pointing",
        "write_simulated_camera",
    ] {
        config[key] = serde_json::Value::Bool(true);
    }
    config
}

pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    config: Option<&serde_json::Value>,
    show_progress: bool,
) -> Result<MergeSummary, MergeError> {
    if inputs.is_empty() {
        return Err(MergeError::NoInputs);
    }
    let config = merge_with_defaults(merge_default_config(), config);
    let url_prefix = config
        .get("eos_url")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let mut writer = DataWriter::new(output, Some(&config))?;
    let mut statistics = Statistics::new();
    let mut summary = MergeSummary {
        n_inputs: inputs.len(),
        ..Default::default()
    };
    let mut seen_event_ids: std::collections::HashSet<u64> = std::collections::HashSet::new();

    for (input_index, input) in inputs.iter().enumerate() {
        info!("Merging {}", input.display());
        let reader = DataFileReader::open(input, &url_prefix)?;

        if input_index == 0 {
            if let Some(subarray) = reader.subarray() {
                writer.write_subarray(subarray)?;
            }
            if let Some(atmosphere) = reader.atmosphere() {
                writer.write_atmosphere(atmosphere)?;
            }
            if let Some(simulation_config) = reader.simulation_config() {
                writer.write_simulation_config(simulation_config)?;
            }
        }
        statistics.merge(reader.statistics())?;

        let progress = progress_bar(reader.n_events() as u64, show_progress, input_index);
        for event in reader {
            let event = event?;
            if !seen_event_ids.insert(event.event_id) {
                warn!(
                    "Duplicate event id {} while merging {}; downstream joins will be ambiguous",
                    event.event_id,
                    input.display()
                );
            }
            writer.write_event(&event)?;
            summary.n_events += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();
    }

    writer.write_statistics(&statistics)?;
    writer.close()?;
    info!(
        "Merged {} events from {} inputs",
        summary.n_events, summary.n_inputs
    );
    Ok(summary)
}

fn progress_bar(length: u64, visible: bool, input_index: usize) -> ProgressBar {
    let bar = ProgressBar::new(length)
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg}: [{wide_bar:.blue}] {pos}/{len} events")
                .unwrap()
                .progress_chars("=> "),
        )
        .with_message(format!("Input {}", input_index + 1));
    if !visible {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }
    bar
}
