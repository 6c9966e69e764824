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

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{self, KeepAlive, Sse},
};
use futures::{Stream, stream};
use parley_chat::Event;
use tracing::debug;

use super::ChatState;

/// Long-lived server-sent events stream of message events.
///
/// The stream ends when the notification bus closes.
pub(super) async fn subscribe(
    State(state): State<ChatState>,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    debug!("Event stream opened");
    let subscription = state.pipeline.subscribe();
    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next_event().await?;
        Some((Ok(to_sse(&event)), subscription))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(event: &Event) -> sse::Event {
    let sse = sse::Event::default()
        .event(event.kind().to_string())
        .data(event.data());
    match event {
        Event::Created { id, .. } => sse.id(id.to_string()),
        Event::Deleted { .. } => sse,
    }
}

