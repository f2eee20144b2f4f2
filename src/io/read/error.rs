// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::camera::CameraGeometryError;
use crate::io::table::TableError;
use crate::stats::StatsError;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("{0}")]
    Table(#[from] TableError),

    #[error("Event index {index} is out of range; the file holds {available} events")]
    IndexOutOfRange { index: usize, available: usize },

    #[error("Table '{table}' column '{column}' holds an unexpected type")]
    BadCell { table: String, column: String },

    #[error("Persisted camera geometry is inconsistent: {0}")]
    Camera(#[from] CameraGeometryError),

    #[error("Persisted histogram is inconsistent: {0}")]
    Stats(#[from] StatsError),
}
