// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The thin command-line front-ends over the library pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use itertools::Itertools;
use log::{debug, warn};
use strum::IntoEnumIterator;

use crate::calib::ExtractorKind;
use crate::config::load_config_file;
use crate::error::LactError;
use crate::image::CleanerKind;
use crate::merge::merge_files;
use crate::pipeline::{run_convert, PipelineOptions};
use crate::subarray::TelId;

// Computed once so the help text always lists what is actually registered.
lazy_static::lazy_static! {
    static ref CONFIG_HELP: String = format!(
        "Path to a JSON configuration file patching the component defaults. Registered image extractors: {}. Registered cleaners: {}.",
        ExtractorKind::iter().map(|k| k.to_string()).join(", "),
        CleanerKind::iter().map(|k| k.to_string()).join(", "),
    );
}

#[derive(Parser, Debug)]
#[clap(
    name = "lact-reduce",
    about = "Offline event reconstruction for the LACT telescope array",
    version
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// The verbosity of the program. The default is to print high-level
    /// information.
    #[clap(short, long, global = true, parse(from_occurrences))]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a raw event stream through calibration, image
    /// parametrization and stereo reconstruction into a data file.
    Convert(ConvertArgs),

    /// Merge several data files into one.
    Merge(MergeArgs),
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Path to the input event stream (.gz and .zst are handled
    /// transparently).
    #[clap(short = 'i', long, help_heading = "INPUT AND OUTPUT")]
    pub input: PathBuf,

    /// Path to the output data file.
    #[clap(short = 'o', long, help_heading = "INPUT AND OUTPUT")]
    pub output: PathBuf,

    #[clap(short = 'c', long, help = CONFIG_HELP.as_str(), help_heading = "INPUT AND OUTPUT")]
    pub config: Option<PathBuf>,

    /// Stop after this many events; -1 processes everything.
    #[clap(short = 'n', long, default_value = "-1", allow_hyphen_values = true, help_heading = "PROCESSING")]
    pub max_events: i64,

    /// Only process these telescope ids.
    #[clap(long, multiple_values(true), help_heading = "PROCESSING")]
    pub tels: Option<Vec<TelId>>,

    /// URL (or mount) prefix for /eos paths.
    #[clap(long, default_value = "", help_heading = "INPUT AND OUTPUT")]
    pub eos_url: String,

    /// Don't draw progress bars.
    #[clap(long, help_heading = "USER INTERFACE")]
    pub no_progress_bars: bool,
}

#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// Input data files; may be given several times and may contain glob
    /// patterns.
    #[clap(short = 'i', long = "input", required = true, multiple_occurrences(true), help_heading = "INPUT AND OUTPUT")]
    pub inputs: Vec<String>,

    /// Path to the merged output file.
    #[clap(short = 'o', long, help_heading = "INPUT AND OUTPUT")]
    pub output: PathBuf,

    /// Path to a JSON configuration file patching the writer defaults.
    #[clap(short = 'c', long, help_heading = "INPUT AND OUTPUT")]
    pub config: Option<PathBuf>,

    /// Don't draw progress bars.
    #[clap(long, help_heading = "USER INTERFACE")]
    pub no_progress_bars: bool,
}

pub fn setup_logging(level: u8) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(match level {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

pub fn run_convert_command(args: ConvertArgs) -> Result<(), LactError> {
    let config = match &args.config {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };
    let options = PipelineOptions {
        max_events: args.max_events,
        allowed_tels: args.tels.unwrap_or_default(),
        config,
        cancel: None,
        show_progress: !args.no_progress_bars,
        url_prefix: args.eos_url,
    };
    run_convert(&args.input, &args.output, options)?;
    Ok(())
}

pub fn run_merge_command(args: MergeArgs) -> Result<(), LactError> {
    let config = match &args.config {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };
    let inputs = expand_inputs(&args.inputs);
    debug!("Merging {} inputs", inputs.len());
    merge_files(&inputs, &args.output, config.as_ref(), !args.no_progress_bars)?;
    Ok(())
}

/// Expand glob patterns in the input list, keeping plain paths as they are.
fn expand_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(paths) => {
                let mut matched: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
                if matched.is_empty() {
                    // Not a pattern (or nothing there); let the reader
                    // report the real problem.
                    inputs.push(PathBuf::from(pattern));
                } else {
                    matched.sort();
                    inputs.extend(matched);
                }
            }
            Err(e) => {
                warn!("Bad input pattern {pattern}: {e}");
                inputs.push(PathBuf::from(pattern));
            }
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_args_parse() {
        let args = Args::parse_from([
            "lact-reduce",
            "convert",
            "-i",
            "run1.simtel.zst",
            "-o",
            "run1.lact",
            "-n",
            "10",
            "--tels",
            "1",
            "2",
            "-vv",
        ]);
        assert_eq!(args.verbosity, 2);
        match args.command {
            Command::Convert(convert) => {
                assert_eq!(convert.max_events, 10);
                assert_eq!(convert.tels, Some(vec![1, 2]));
                assert_eq!(convert.input, PathBuf::from("run1.simtel.zst"));
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn merge_args_accept_repeated_inputs() {
        let args = Args::parse_from([
            "lact-reduce",
            "merge",
            "-i",
            "a.lact",
            "-i",
            "b.lact",
            "-o",
            "merged.lact",
        ]);
        match args.command {
            Command::Merge(merge) => {
                assert_eq!(merge.inputs, vec!["a.lact".to_string(), "b.lact".to_string()]);
            }
            other => panic!("parsed {other:?}"),
        }
    }
}
