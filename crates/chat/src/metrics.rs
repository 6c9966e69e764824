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

use std::sync::LazyLock;

use prometheus::{
    IntCounter, IntCounterVec, IntGauge, register_int_counter, register_int_counter_vec,
    register_int_gauge,
};

pub const EVENT_LABEL: &str = "event";

pub static MESSAGES_POSTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("parley_messages_posted_total", "Messages stored").unwrap()
});

pub static MESSAGES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("parley_messages_deleted_total", "Delete requests applied").unwrap()
});

pub static EVENTS_PUBLISHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "parley_events_published_total",
        "Notification events handed to at least one reader",
        &[EVENT_LABEL]
    )
    .unwrap()
});

pub static EVENTS_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "parley_events_dropped_total",
        "Notification events nobody received",
        &[EVENT_LABEL]
    )
    .unwrap()
});

pub static EVENT_STREAMS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("parley_event_streams", "Open event subscriptions").unwrap()
});
