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

use std::any::Any;

use axum::{Json, response::IntoResponse};
use parley_error::{ErrorExt, StackError, StatusCode};
use serde::Serialize;
use snafu::Snafu;
use strum::EnumProperty;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code:    StatusCode,
    pub message: String,
}

#[derive(Debug, Snafu, strum_macros::EnumProperty)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("{reason}"))]
    #[strum(props(status_code = "invalid_argument"))]
    InvalidArgument { reason: String },

    #[snafu(transparent)]
    Chat { source: parley_chat::Error },

    #[snafu(transparent)]
    Storage { source: parley_storage::Error },
}

impl ErrorExt for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Chat { source } => source.status_code(),
            Self::Storage { source } => source.status_code(),
            _ => self
                .get_str("status_code")
                .and_then(|value| value.parse().ok())
                .unwrap_or(StatusCode::Unknown),
        }
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

impl StackError for ApiError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        match self.next() {
            Some(next) => next.debug_fmt(layer, buf),
            None => buf.push(format!("{layer}: {self}")),
        }
    }

    fn next(&self) -> Option<&dyn StackError> {
        match self {
            Self::Chat { source } => Some(source),
            Self::Storage { source } => Some(source),
            Self::InvalidArgument { .. } => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let code = self.status_code();
        if code.is_client_visible() {
            debug!(%code, error = %self, "Request rejected");
        } else {
            error!(%code, stack = ?self.stack_trace(), "Request failed");
        }
        let body = Json(ErrorBody {
            code,
            message: self.output_msg(),
        });
        (code.http_status(), body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http;
    use parley_storage::key;

    use super::*;

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err: ApiError = key::parse_id("abc").unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert_eq!(err.into_response().status(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_text_reaches_the_client() {
        let err: ApiError = parley_chat::PostMessage::default()
            .validate()
            .unwrap_err()
            .into();
        assert_eq!(
            err.output_msg(),
            "body must include a valid content and address field"
        );
    }

    #[test]
    fn invalid_argument_uses_its_property() {
        let err = InvalidArgumentSnafu {
            reason: "Could not parse request body",
        }
        .build();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert_eq!(err.stack_trace(), vec!["0: Could not parse request body"]);
    }
}
