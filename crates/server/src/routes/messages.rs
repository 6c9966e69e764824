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

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use parley_chat::{Message, PostMessage};
use parley_storage::key;
use tracing::debug;

use super::ChatState;
use crate::error::{ApiResult, InvalidArgumentSnafu};

pub(super) async fn list(State(state): State<ChatState>) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.pipeline.list().await?))
}

pub(super) async fn get(
    State(state): State<ChatState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = key::parse_id(&id)?;
    let stored = state.pipeline.get(id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], stored))
}

/// The body is parsed as JSON whatever its content type; the web client
/// posts without one.
pub(super) async fn post(State(state): State<ChatState>, body: Bytes) -> ApiResult<&'static str> {
    let request: PostMessage = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Unreadable post body");
        InvalidArgumentSnafu {
            reason: "Could not parse request body",
        }
        .build()
    })?;
    state.pipeline.post(request).await?;
    Ok("Message posted")
}

pub(super) async fn delete(
    State(state): State<ChatState>,
    Path(id): Path<String>,
) -> ApiResult<&'static str> {
    let id = key::parse_id(&id)?;
    state.pipeline.delete(id).await?;
    Ok("Message deleted")
}
