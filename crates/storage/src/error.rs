// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{any::Any, num::ParseIntError, path::PathBuf};

use parley_error::{ErrorExt, StackError, StatusCode};
use snafu::Snafu;

use crate::backend::Keyspace;

/// Storage layer errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Invalid key: expected 8 bytes, got {len}"))]
    InvalidKey {
        len: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Invalid id '{id}'"))]
    InvalidId {
        id:     String,
        source: ParseIntError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{what} not found"))]
    NotFound {
        what: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    #[snafu(display("Failed to {op} in keyspace {keyspace}"))]
    Backend {
        op:       &'static str,
        keyspace: Keyspace,
        source:   redb::Error,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },

    #[snafu(display("Failed to open database at {}", path.display()))]
    OpenDatabase {
        path:   PathBuf,
        source: redb::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to create data directory {}", path.display()))]
    CreateDataDir {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Counter '{key}' holds {len} bytes, expected 8"))]
    CorruptCounter {
        key: String,
        len: usize,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Counter '{key}' cannot advance by {delta}"))]
    CounterExhausted {
        key:   String,
        delta: u64,
        #[snafu(implicit)]
        loc:   snafu::Location,
    },

    #[snafu(display("Sequence bandwidth must be greater than zero"))]
    ZeroBandwidth {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to reserve ids from counter '{key}'"))]
    AllocationFailed {
        key:    String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub const fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

impl StackError for Error {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}, at {}", self.location()));
        if let Some(next) = self.next() {
            next.debug_fmt(layer + 1, buf);
        }
    }

    fn next(&self) -> Option<&dyn StackError> {
        match self {
            Self::AllocationFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl Error {
    const fn location(&self) -> &snafu::Location {
        match self {
            Self::InvalidKey { loc, .. }
            | Self::InvalidId { loc, .. }
            | Self::NotFound { loc, .. }
            | Self::Backend { loc, .. }
            | Self::OpenDatabase { loc, .. }
            | Self::CreateDataDir { loc, .. }
            | Self::CorruptCounter { loc, .. }
            | Self::CounterExhausted { loc, .. }
            | Self::ZeroBandwidth { loc }
            | Self::AllocationFailed { loc, .. } => loc,
        }
    }
}

impl ErrorExt for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidKey { .. } | Self::InvalidId { .. } => StatusCode::InvalidArgument,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::ZeroBandwidth { .. } => StatusCode::Internal,
            Self::Backend { .. }
            | Self::OpenDatabase { .. }
            | Self::CreateDataDir { .. }
            | Self::CorruptCounter { .. }
            | Self::CounterExhausted { .. }
            | Self::AllocationFailed { .. } => StatusCode::StorageUnavailable,
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}
