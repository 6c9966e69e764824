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

use std::{any::Any, error::Error as StdError, sync::Arc};

use http::StatusCode as HttpStatusCode;
use serde::Serialize;
use strum::EnumProperty;

/// Client-facing error category.
///
/// Every error that can cross the HTTP boundary maps to exactly one of these.
/// The category decides the response status and how much of the error text is
/// shown to the caller.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    strum_macros::EnumProperty,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    #[strum(props(http_status = "400"))]
    InvalidArgument,
    #[strum(props(http_status = "404"))]
    NotFound,
    #[strum(props(http_status = "424"))]
    StorageUnavailable,
    #[strum(props(http_status = "500"))]
    Internal,
    #[strum(props(http_status = "500"))]
    Unknown,
}

impl StatusCode {
    pub fn http_status(self) -> HttpStatusCode {
        self.get_str("http_status")
            .and_then(|value| value.parse::<u16>().ok())
            .and_then(|value| HttpStatusCode::from_u16(value).ok())
            .unwrap_or(HttpStatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether the error text may be shown to clients verbatim.
    pub const fn is_client_visible(self) -> bool {
        matches!(self, Self::InvalidArgument | Self::NotFound)
    }
}

pub trait StackError: StdError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>);

    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }

    fn transparent(&self) -> bool { false }
}

pub trait ErrorExt: StackError {
    fn status_code(&self) -> StatusCode { StatusCode::Unknown }

    fn as_any(&self) -> &dyn Any;

    /// Message safe to hand to a client.
    ///
    /// Storage and internal failures collapse to their category; raw backend
    /// text is only ever logged.
    fn output_msg(&self) -> String
    where
        Self: Sized,
    {
        match self.status_code() {
            StatusCode::StorageUnavailable => "Storage unavailable".to_string(),
            StatusCode::Unknown | StatusCode::Internal => {
                format!("Internal error: {}", self.status_code() as u32)
            }
            StatusCode::InvalidArgument | StatusCode::NotFound => {
                let error = self.last();
                if error.transparent() {
                    if let Some(external_error) = error.source() {
                        return format!("{external_error}");
                    }
                }
                format!("{error}")
            }
        }
    }

    /// Renders the whole error chain, one layer per entry, for logs.
    fn stack_trace(&self) -> Vec<String>
    where
        Self: Sized,
    {
        let mut buf = Vec::new();
        self.debug_fmt(0, &mut buf);
        buf
    }
}

impl<T: ?Sized + StackError> StackError for Arc<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

impl<T: StackError> StackError for Box<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct Leaf(StatusCode);

    impl fmt::Display for Leaf {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "leaf failed at /var/lib/db")
        }
    }

    impl StdError for Leaf {}

    impl StackError for Leaf {
        fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
            buf.push(format!("{layer}: {self}"));
        }

        fn next(&self) -> Option<&dyn StackError> { None }
    }

    impl ErrorExt for Leaf {
        fn status_code(&self) -> StatusCode { self.0 }

        fn as_any(&self) -> &dyn Any { self as _ }
    }

    #[test]
    fn http_status_follows_category() {
        assert_eq!(StatusCode::InvalidArgument.http_status(), HttpStatusCode::BAD_REQUEST);
        assert_eq!(StatusCode::NotFound.http_status(), HttpStatusCode::NOT_FOUND);
        assert_eq!(
            StatusCode::StorageUnavailable.http_status(),
            HttpStatusCode::FAILED_DEPENDENCY
        );
        assert_eq!(
            StatusCode::Unknown.http_status(),
            HttpStatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn status_code_parses_from_snake_case() {
        let code: StatusCode = "storage_unavailable".parse().unwrap();
        assert_eq!(code, StatusCode::StorageUnavailable);
        assert_eq!(StatusCode::NotFound.to_string(), "not_found");
    }

    #[test]
    fn storage_details_are_hidden() {
        let msg = Leaf(StatusCode::StorageUnavailable).output_msg();
        assert_eq!(msg, "Storage unavailable");
        assert!(!Leaf(StatusCode::Internal).output_msg().contains("/var/lib"));
    }

    #[test]
    fn client_errors_keep_their_text() {
        let msg = Leaf(StatusCode::InvalidArgument).output_msg();
        assert_eq!(msg, "leaf failed at /var/lib/db");
        assert_eq!(Leaf(StatusCode::NotFound).stack_trace().len(), 1);
    }
}
