// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventioError {
    #[error("Couldn't open {path}: {err}")]
    FileOpen { path: String, err: std::io::Error },

    #[error("Corrupt block: {what}")]
    CorruptBlock { what: &'static str },

    #[error("Block payload of type {block_type} is malformed: {what}")]
    BadPayload { block_type: u32, what: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
