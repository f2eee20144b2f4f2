// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::io::eventio::EventioError;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{0}")]
    Eventio(#[from] EventioError),

    #[error("{what} is not supported on a stream source")]
    UnsupportedFeature { what: &'static str },

    #[error("Event index {index} is out of range; the source holds {available} events")]
    IndexOutOfRange { index: usize, available: usize },
}
