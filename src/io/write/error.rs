// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::io::table::TableError;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Output file {path} exists and overwrite is disabled")]
    AlreadyExists { path: PathBuf },

    #[error("Couldn't create {path}: {err}")]
    FileOpen { path: PathBuf, err: std::io::Error },

    #[error("Unsupported output type '{0}'")]
    BadOutputType(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Table(#[from] TableError),
}
