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

//! Chat routes: messages, users, the event stream and metrics.

mod events;
mod messages;
mod metrics;
mod users;

use axum::{
    Router,
    routing::{any, delete, get, post},
};
use parley_chat::{Pipeline, UserDirectory};

pub use self::metrics::metrics_routes;

/// Shared state of the chat handlers.
#[derive(Clone)]
pub struct ChatState {
    pub pipeline: Pipeline,
    pub users:    UserDirectory,
}

/// Returns a route handler for [`crate::http::start_rest_server`] that mounts
/// the chat routes.
pub fn chat_routes(state: ChatState) -> impl Fn(Router) -> Router + Send + Sync + 'static {
    move |router| router.merge(chat_router(state.clone()))
}

// The web client calls several of these with a trailing slash.
fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/", any(root))
        .route("/message/all", get(messages::list))
        .route("/message/all/", get(messages::list))
        .route("/message/get/{id}", get(messages::get))
        .route("/message/post", post(messages::post))
        .route("/message/post/", post(messages::post))
        .route("/message/delete/{id}", delete(messages::delete))
        .route("/user/set", post(users::set))
        .route("/user/set/", post(users::set))
        .route("/user/get/{address}", get(users::get))
        .route("/events", get(events::subscribe))
        .route("/events/", get(events::subscribe))
        .with_state(state)
}

async fn root() -> &'static str { "Go away" }
