// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Offline event reconstruction for the LACT imaging atmospheric Cherenkov
//! telescope array.
//!
//! Raw waveform data moves through a sequence of data levels -- R0 (raw ADC)
//! to R1 (calibrated samples) to DL0 (integrated charges) to DL1 (cleaned,
//! parametrized images) to DL2 (reconstructed shower geometry) -- and each
//! level can be persisted to a columnar analysis file.

pub mod atmosphere;
pub mod calib;
pub mod camera;
pub mod cli;
pub mod config;
pub(crate) mod constants;
pub mod coord;
pub(crate) mod error;
pub mod event;
pub mod image;
pub mod io;
pub(crate) mod math;
pub mod merge;
pub mod pipeline;
pub mod query;
pub mod reco;
pub mod simconfig;
pub mod source;
pub mod stats;
pub mod subarray;

// Re-exports.
pub use config::{load_config_file, merge_with_defaults, ConfigError};
pub use error::LactError;
pub use event::ArrayEvent;
pub use io::read::DataFileReader;
pub use io::write::DataWriter;
pub use merge::merge_files;
pub use pipeline::{run_convert, ConvertSummary, PipelineOptions};
pub use source::{SimtelEventSource, SourceOptions};
pub use subarray::{SubarrayDescription, TelId};
