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

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use parley_storage::{MessageStore, Sequence, Storage};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    bus::{NotificationBus, PublishOutcome, Subscription},
    error::{EncodeSnafu, JoinSnafu, Result, StorageSnafu},
    metrics::{MESSAGES_DELETED, MESSAGES_POSTED},
    model::{Message, PostMessage},
};

/// Runs storage work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context(JoinSnafu)?
}

/// Validate, allocate, persist, publish.
///
/// Cheap to clone; every clone shares the same stores and bus.
#[derive(Clone)]
pub struct Pipeline {
    messages: Arc<MessageStore>,
    sequence: Arc<Sequence>,
    bus:      Arc<NotificationBus>,
}

impl Pipeline {
    pub fn new(storage: &Storage, bus: Arc<NotificationBus>) -> Self {
        Self {
            messages: Arc::clone(&storage.messages),
            sequence: Arc::clone(&storage.sequence),
            bus,
        }
    }

    /// Stores a new message and announces it.
    ///
    /// Nothing is published unless the write succeeded. An allocation failure
    /// aborts before anything is written. Once the write starts, the event is
    /// published even if the returned future is dropped.
    pub async fn post(&self, request: PostMessage) -> Result<Message> {
        let origin = request.validate()?;
        let content = request.content;
        let messages = Arc::clone(&self.messages);
        let sequence = Arc::clone(&self.sequence);
        let bus = Arc::clone(&self.bus);

        blocking(move || {
            let id = sequence
                .next()
                .context(StorageSnafu { op: "allocate message id" })?;
            let message = Message {
                created_at: Utc::now(),
                content,
                id,
                origin,
            };
            let payload = serde_json::to_vec(&message).context(EncodeSnafu { id })?;
            messages
                .put(id, &payload)
                .context(StorageSnafu { op: "store message" })?;

            MESSAGES_POSTED.inc();
            info!(id, origin = %message.origin, "Message posted");
            announce(&bus, bus.publish_created(id, payload), id);
            Ok(message)
        })
        .await
    }

    /// Deletes a message. Deleting an id that was never stored still succeeds
    /// and is still announced, also when the returned future is dropped
    /// after the delete started.
    pub async fn delete(&self, id: u64) -> Result<()> {
        let messages = Arc::clone(&self.messages);
        let bus = Arc::clone(&self.bus);
        blocking(move || {
            messages
                .delete(id)
                .context(StorageSnafu { op: "delete message" })?;

            MESSAGES_DELETED.inc();
            info!(id, "Message deleted");
            announce(&bus, bus.publish_deleted(id), id);
            Ok(())
        })
        .await
    }

    /// Stored bytes of one message, exactly as written.
    pub async fn get(&self, id: u64) -> Result<Bytes> {
        let messages = Arc::clone(&self.messages);
        blocking(move || {
            messages
                .get(id)
                .map(Bytes::from)
                .context(StorageSnafu { op: "load message" })
        })
        .await
    }

    /// Every stored message in ascending id order.
    pub async fn list(&self) -> Result<Vec<Message>> {
        let messages = Arc::clone(&self.messages);
        blocking(move || {
            let mut listed = Vec::new();
            for value in messages.scan_all() {
                let value = value.context(StorageSnafu { op: "list messages" })?;
                match serde_json::from_slice::<Message>(&value) {
                    Ok(message) => listed.push(message),
                    Err(e) => warn!(error = %e, "Skipping undecodable message"),
                }
            }
            Ok(listed)
        })
        .await
    }

    pub fn subscribe(&self) -> Subscription { self.bus.subscribe() }
}

fn announce(bus: &NotificationBus, outcome: PublishOutcome, id: u64) {
    match outcome {
        PublishOutcome::Delivered(_) => {}
        PublishOutcome::NoReaders => debug!(id, "Nobody listening for event"),
        PublishOutcome::Closed => {
            warn!(id, mode = %bus.mode(), "Event bus closed, event not published");
        }
    }
}
