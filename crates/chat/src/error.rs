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

use std::{any::Any, net::AddrParseError};

use parley_error::{ErrorExt, StackError, StatusCode};
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{reason}"))]
    Validation {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Could not parse address '{address}'"))]
    InvalidAddress {
        address: String,
        source:  AddrParseError,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Failed to {op}"))]
    Storage {
        op:     &'static str,
        source: parley_storage::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to encode message {id}"))]
    Encode {
        id:     u64,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Storage task did not complete"))]
    Join {
        source: tokio::task::JoinError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl StackError for Error {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}, at {}", self.location()));
        if let Some(next) = self.next() {
            next.debug_fmt(layer + 1, buf);
        }
    }

    fn next(&self) -> Option<&dyn StackError> {
        match self {
            Self::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error {
    const fn location(&self) -> &snafu::Location {
        match self {
            Self::Validation { loc, .. }
            | Self::InvalidAddress { loc, .. }
            | Self::Storage { loc, .. }
            | Self::Encode { loc, .. }
            | Self::Join { loc, .. } => loc,
        }
    }
}

impl ErrorExt for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidAddress { .. } => StatusCode::InvalidArgument,
            Self::Storage { source, .. } => source.status_code(),
            Self::Encode { .. } | Self::Join { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

#[cfg(test)]
mod tests {
    use snafu::ResultExt;

    use super::*;

    #[test]
    fn storage_errors_keep_their_category() {
        let not_found: Result<Vec<u8>> = parley_storage::MessageStore::new(
            std::sync::Arc::new(parley_storage::MemoryStore::new()),
            8,
        )
        .get(3)
        .context(StorageSnafu { op: "load message" });
        let err = not_found.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotFound);
        assert_eq!(err.output_msg(), "message 3 not found");
    }

    #[test]
    fn stack_trace_carries_locations_through_storage() {
        let err = parley_storage::key::parse_id("x")
            .context(StorageSnafu { op: "parse id" })
            .unwrap_err();
        let stack = err.stack_trace();
        assert_eq!(stack.len(), 2);
        assert!(stack[0].starts_with("0: Failed to parse id, at "), "{stack:?}");
        assert!(stack[0].contains("error.rs"), "{stack:?}");
        assert!(stack[1].starts_with("1: Invalid id 'x', at "), "{stack:?}");
    }

    #[test]
    fn address_errors_are_client_errors() {
        let err = "nope"
            .parse::<std::net::IpAddr>()
            .context(InvalidAddressSnafu { address: "nope" })
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert_eq!(err.output_msg(), "Could not parse address 'nope'");
    }
}
