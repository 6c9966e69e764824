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

//! In-process relay of message events to connected readers.
//!
//! Nothing is buffered for readers that are not connected: an event either
//! reaches a reader that is waiting right now or it is dropped and counted.
//! Publishing never blocks.
//!
//! Two delivery modes exist:
//! - [`DeliveryMode::Compete`]: each event goes to exactly one waiting reader,
//!   readers compete for events. A reader only counts as waiting while it is
//!   inside [`Subscription::next_event`].
//! - [`DeliveryMode::FanOut`]: every open subscription receives every event
//!   through its own bounded queue; a subscription that falls more than the
//!   queue capacity behind skips the oldest events.

use std::{borrow::Cow, collections::VecDeque, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    oneshot,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::{EVENT_STREAMS, EVENTS_DROPPED, EVENTS_PUBLISHED};

/// Default per-subscription queue length in fan-out mode.
pub const DEFAULT_FAN_OUT_CAPACITY: usize = 256;

/// A message lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A message was stored; `payload` is its serialized form.
    Created { id: u64, payload: Bytes },
    /// A delete request for `id` was applied.
    Deleted { id: u64 },
}

/// Name of an event on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::IntoStaticStr)]
pub enum EventKind {
    #[strum(serialize = "message")]
    Created,
    #[strum(serialize = "message_deleted")]
    Deleted,
}

impl Event {
    pub const fn id(&self) -> u64 {
        match self {
            Self::Created { id, .. } | Self::Deleted { id } => *id,
        }
    }

    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::Created,
            Self::Deleted { .. } => EventKind::Deleted,
        }
    }

    /// Event body: the message JSON for creations, the bare id for deletions.
    pub fn data(&self) -> Cow<'_, str> {
        match self {
            Self::Created { payload, .. } => String::from_utf8_lossy(payload),
            Self::Deleted { id } => Cow::Owned(id.to_string()),
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeliveryMode {
    /// One waiting reader per event.
    #[default]
    Compete,
    /// Every subscription gets every event.
    FanOut,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct BusConfig {
    #[builder(default)]
    pub mode:             DeliveryMode,
    /// Queue length per subscription in fan-out mode
    #[default(DEFAULT_FAN_OUT_CAPACITY)]
    #[builder(default = DEFAULT_FAN_OUT_CAPACITY)]
    pub fan_out_capacity: usize,
}

/// What happened to a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to this many readers.
    Delivered(usize),
    /// Nobody was listening; the event is gone.
    NoReaders,
    /// The bus was closed.
    Closed,
}

type Waiters = Arc<Mutex<VecDeque<oneshot::Sender<Event>>>>;

enum Relay {
    Compete(Waiters),
    FanOut(broadcast::Sender<Event>),
}

pub struct NotificationBus {
    relay:  Relay,
    mode:   DeliveryMode,
    closed: CancellationToken,
}

impl NotificationBus {
    pub fn new(config: &BusConfig) -> Self {
        let relay = match config.mode {
            DeliveryMode::Compete => Relay::Compete(Waiters::default()),
            DeliveryMode::FanOut => {
                let (tx, _) = broadcast::channel(config.fan_out_capacity.max(1));
                Relay::FanOut(tx)
            }
        };
        Self {
            relay,
            mode: config.mode,
            closed: CancellationToken::new(),
        }
    }

    pub const fn mode(&self) -> DeliveryMode { self.mode }

    pub fn publish_created(&self, id: u64, payload: impl Into<Bytes>) -> PublishOutcome {
        self.publish(Event::Created {
            id,
            payload: payload.into(),
        })
    }

    pub fn publish_deleted(&self, id: u64) -> PublishOutcome { self.publish(Event::Deleted { id }) }

    pub fn publish(&self, event: Event) -> PublishOutcome {
        let kind: &'static str = event.kind().into();
        let id = event.id();
        if self.closed.is_cancelled() {
            return PublishOutcome::Closed;
        }

        let outcome = match &self.relay {
            Relay::Compete(waiters) => hand_off(waiters, event),
            Relay::FanOut(tx) => tx
                .send(event)
                .map_or(PublishOutcome::NoReaders, PublishOutcome::Delivered),
        };

        match outcome {
            PublishOutcome::Delivered(readers) => {
                EVENTS_PUBLISHED.with_label_values(&[kind]).inc();
                debug!(event = kind, id, readers, "Published event");
            }
            PublishOutcome::NoReaders | PublishOutcome::Closed => {
                EVENTS_DROPPED.with_label_values(&[kind]).inc();
                debug!(event = kind, id, "No reader waiting, event dropped");
            }
        }
        outcome
    }

    pub fn subscribe(&self) -> Subscription {
        EVENT_STREAMS.inc();
        let source = match &self.relay {
            Relay::Compete(waiters) => Source::Compete(Arc::clone(waiters)),
            Relay::FanOut(tx) => Source::FanOut(tx.subscribe()),
        };
        Subscription {
            source,
            closed: self.closed.clone(),
        }
    }

    /// Readers that would receive an event published now.
    pub fn waiting_readers(&self) -> usize {
        match &self.relay {
            Relay::Compete(waiters) => waiters.lock().iter().filter(|w| !w.is_closed()).count(),
            Relay::FanOut(tx) => tx.receiver_count(),
        }
    }

    /// Ends every subscription and refuses further events.
    pub fn close(&self) {
        self.closed.cancel();
        if let Relay::Compete(waiters) = &self.relay {
            waiters.lock().clear();
        }
    }
}

fn hand_off(waiters: &Mutex<VecDeque<oneshot::Sender<Event>>>, mut event: Event) -> PublishOutcome {
    let mut waiters = waiters.lock();
    while let Some(waiter) = waiters.pop_front() {
        match waiter.send(event) {
            Ok(()) => return PublishOutcome::Delivered(1),
            // reader stopped waiting; try the next one
            Err(returned) => event = returned,
        }
    }
    PublishOutcome::NoReaders
}

enum Source {
    Compete(Waiters),
    FanOut(broadcast::Receiver<Event>),
}

/// A reader's handle on the bus.
pub struct Subscription {
    source: Source,
    closed: CancellationToken,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the bus is closed.
    ///
    /// Dropping the returned future gives up the wait with no side effects.
    pub async fn next_event(&mut self) -> Option<Event> {
        let closed = self.closed.clone();
        tokio::select! {
            biased;
            () = closed.cancelled() => None,
            event = self.recv() => event,
        }
    }

    async fn recv(&mut self) -> Option<Event> {
        match &mut self.source {
            Source::Compete(waiters) => {
                let (tx, rx) = oneshot::channel();
                {
                    let mut waiters = waiters.lock();
                    waiters.retain(|w| !w.is_closed());
                    waiters.push_back(tx);
                }
                rx.await.ok()
            }
            Source::FanOut(rx) => loop {
                match rx.recv().await {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        EVENTS_DROPPED.with_label_values(&["lagged"]).inc_by(skipped);
                        warn!(skipped, "Event subscription fell behind, skipping events");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) { EVENT_STREAMS.dec(); }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;

    fn bus(mode: DeliveryMode) -> Arc<NotificationBus> {
        Arc::new(NotificationBus::new(
            &BusConfig::builder().mode(mode).fan_out_capacity(2).build(),
        ))
    }

    async fn wait_for_readers(bus: &NotificationBus, readers: usize) {
        timeout(Duration::from_secs(5), async {
            while bus.waiting_readers() != readers {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("readers never started waiting");
    }

    fn spawn_reader(bus: &NotificationBus) -> tokio::task::JoinHandle<Option<Event>> {
        let mut sub = bus.subscribe();
        tokio::spawn(async move { sub.next_event().await })
    }

    #[test]
    fn event_wire_names() {
        let created = Event::Created {
            id:      3,
            payload: Bytes::from_static(b"{\"ID\":3}"),
        };
        assert_eq!(created.kind().to_string(), "message");
        assert_eq!(created.data(), "{\"ID\":3}");
        let deleted = Event::Deleted { id: 9 };
        assert_eq!(deleted.kind().to_string(), "message_deleted");
        assert_eq!(deleted.data(), "9");
        assert_eq!("fan-out".parse::<DeliveryMode>().unwrap(), DeliveryMode::FanOut);
    }

    #[tokio::test]
    async fn compete_hands_event_to_waiting_reader() {
        let bus = bus(DeliveryMode::Compete);
        let reader = spawn_reader(&bus);
        wait_for_readers(&bus, 1).await;

        assert_eq!(bus.publish_created(7, "{}"), PublishOutcome::Delivered(1));
        let event = reader.await.unwrap().unwrap();
        assert_eq!(event.id(), 7);
        assert_eq!(event.kind(), EventKind::Created);
    }

    #[tokio::test]
    async fn compete_drops_events_nobody_waits_for() {
        let bus = bus(DeliveryMode::Compete);
        let mut sub = bus.subscribe();
        assert_eq!(bus.publish_deleted(1), PublishOutcome::NoReaders);

        let missed = timeout(Duration::from_millis(50), sub.next_event()).await;
        assert!(missed.is_err());
    }

    #[tokio::test]
    async fn compete_readers_each_get_one_event() {
        let bus = bus(DeliveryMode::Compete);
        let first = spawn_reader(&bus);
        let second = spawn_reader(&bus);
        wait_for_readers(&bus, 2).await;

        assert_eq!(bus.publish_deleted(1), PublishOutcome::Delivered(1));
        assert_eq!(bus.publish_deleted(2), PublishOutcome::Delivered(1));
        assert_eq!(bus.publish_deleted(3), PublishOutcome::NoReaders);

        let mut ids = vec![
            first.await.unwrap().unwrap().id(),
            second.await.unwrap().unwrap().id(),
        ];
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn compete_skips_readers_that_left() {
        let bus = bus(DeliveryMode::Compete);
        let gone = spawn_reader(&bus);
        wait_for_readers(&bus, 1).await;
        gone.abort();
        let _ = gone.await;

        let stays = spawn_reader(&bus);
        wait_for_readers(&bus, 1).await;
        assert_eq!(bus.publish_deleted(5), PublishOutcome::Delivered(1));
        assert_eq!(stays.await.unwrap(), Some(Event::Deleted { id: 5 }));
    }

    #[tokio::test]
    async fn fan_out_reaches_every_subscription() {
        let bus = bus(DeliveryMode::FanOut);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish_deleted(4), PublishOutcome::Delivered(2));
        assert_eq!(a.next_event().await, Some(Event::Deleted { id: 4 }));
        assert_eq!(b.next_event().await, Some(Event::Deleted { id: 4 }));
    }

    #[tokio::test]
    async fn fan_out_without_subscribers_drops() {
        let bus = bus(DeliveryMode::FanOut);
        assert_eq!(bus.publish_deleted(4), PublishOutcome::NoReaders);
    }

    #[tokio::test]
    async fn lagging_fan_out_subscription_skips_oldest() {
        let bus = bus(DeliveryMode::FanOut);
        let mut sub = bus.subscribe();
        for id in 0..5 {
            bus.publish_deleted(id);
        }
        assert_eq!(sub.next_event().await.map(|e| e.id()), Some(3));
        assert_eq!(sub.next_event().await.map(|e| e.id()), Some(4));
    }

    #[tokio::test]
    async fn close_ends_waiting_readers() {
        for mode in [DeliveryMode::Compete, DeliveryMode::FanOut] {
            let bus = bus(mode);
            let reader = spawn_reader(&bus);
            wait_for_readers(&bus, 1).await;

            bus.close();
            assert_eq!(reader.await.unwrap(), None);
            assert_eq!(bus.publish_deleted(1), PublishOutcome::Closed);
        }
    }
}
