// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for everything lact_reduce does. This should be the *only*
//! error enum that callers of the crate need to look at.

use thiserror::Error;

use crate::config::ConfigError;
use crate::io::eventio::EventioError;
use crate::io::read::ReaderError;
use crate::io::table::TableError;
use crate::io::write::WriterError;
use crate::merge::MergeError;
use crate::query::QueryError;
use crate::source::SourceError;
use crate::stats::StatsError;

/// The only publicly visible error of the crate. Sub-errors are classified
/// by the concern a user would act on.
#[derive(Error, Debug)]
pub enum LactError {
    /// Reading the raw event stream failed.
    #[error("{0}")]
    Source(String),

    /// A configuration document is missing keys, has wrong types or names
    /// unknown components.
    #[error("{0}")]
    Config(String),

    /// A telescope-selection expression did not parse.
    #[error("{0}")]
    Query(String),

    /// Writing the output data file failed.
    #[error("{0}")]
    Write(String),

    /// Reading a data file back failed.
    #[error("{0}")]
    Read(String),

    /// Merging data files failed.
    #[error("{0}")]
    Merge(String),

    /// Histogram bookkeeping failed.
    #[error("{0}")]
    Stats(String),

    /// Anything that can't be clarified further, e.g. plain IO errors.
    #[error("{0}")]
    Generic(String),
}

impl From<SourceError> for LactError {
    fn from(e: SourceError) -> Self {
        let s = e.to_string();
        match e {
            SourceError::Eventio(EventioError::Io(_)) => Self::Generic(s),
            SourceError::Eventio(_)
            | SourceError::UnsupportedFeature { .. }
            | SourceError::IndexOutOfRange { .. } => Self::Source(s),
        }
    }
}

impl From<EventioError> for LactError {
    fn from(e: EventioError) -> Self {
        let s = e.to_string();
        match e {
            EventioError::Io(_) => Self::Generic(s),
            EventioError::FileOpen { .. }
            | EventioError::CorruptBlock { .. }
            | EventioError::BadPayload { .. } => Self::Source(s),
        }
    }
}

impl From<ConfigError> for LactError {
    fn from(e: ConfigError) -> Self {
        let s = e.to_string();
        match e {
            ConfigError::Io { .. } => Self::Generic(s),
            ConfigError::MissingKey { .. }
            | ConfigError::WrongType { .. }
            | ConfigError::BadValue { .. }
            | ConfigError::Parse { .. } => Self::Config(s),
        }
    }
}

impl From<QueryError> for LactError {
    fn from(e: QueryError) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<WriterError> for LactError {
    fn from(e: WriterError) -> Self {
        let s = e.to_string();
        match e {
            WriterError::Config(e) => Self::from(e),
            WriterError::AlreadyExists { .. }
            | WriterError::FileOpen { .. }
            | WriterError::BadOutputType(_)
            | WriterError::Table(_) => Self::Write(s),
        }
    }
}

impl From<ReaderError> for LactError {
    fn from(e: ReaderError) -> Self {
        let s = e.to_string();
        match e {
            ReaderError::Stats(_) => Self::Stats(s),
            ReaderError::Table(_)
            | ReaderError::IndexOutOfRange { .. }
            | ReaderError::BadCell { .. }
            | ReaderError::Camera(_) => Self::Read(s),
        }
    }
}

impl From<MergeError> for LactError {
    fn from(e: MergeError) -> Self {
        let s = e.to_string();
        match e {
            MergeError::Reader(e) => Self::from(e),
            MergeError::Writer(e) => Self::from(e),
            MergeError::Stats(_) => Self::Stats(s),
            MergeError::NoInputs => Self::Merge(s),
        }
    }
}

impl From<TableError> for LactError {
    fn from(e: TableError) -> Self {
        let s = e.to_string();
        match e {
            TableError::Io(_) => Self::Generic(s),
            _ => Self::Write(s),
        }
    }
}

impl From<StatsError> for LactError {
    fn from(e: StatsError) -> Self {
        Self::Stats(e.to_string())
    }
}

impl From<std::io::Error> for LactError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
