// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The lact-reduce binary. Exit codes: 0 on success, 1 on argument errors,
//! 2 on processing errors.

use clap::Parser;
use log::error;

use lact_reduce::cli::{
    run_convert_command, run_merge_command, setup_logging, Args, Command,
};

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // clap renders its own message (including --help output).
            let _ = e.print();
            let code = if e.use_stderr() { 1 } else { 0 };
            std::process::exit(code);
        }
    };
    if setup_logging(args.verbosity).is_err() {
        eprintln!("Failed to initialize the logger");
        std::process::exit(2);
    }

    let result = match args.command {
        Command::Convert(convert) => run_convert_command(convert),
        Command::Merge(merge) => run_merge_command(merge),
    };
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(2);
    }
}
