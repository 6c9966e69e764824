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

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::ChatState;
use crate::error::ApiResult;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SetUserParams {
    address:  String,
    username: String,
}

pub(super) async fn set(
    State(state): State<ChatState>,
    Query(params): Query<SetUserParams>,
) -> ApiResult<String> {
    state.users.set(&params.address, &params.username).await?;
    Ok(format!("Username set to {}", params.username))
}

pub(super) async fn get(
    State(state): State<ChatState>,
    Path(address): Path<String>,
) -> ApiResult<String> {
    Ok(state.users.get(&address).await?)
}
