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

//! Message ingestion and live notification for parley.
//!
//! [`Pipeline`] turns a post request into a stored [`Message`] and a
//! [`NotificationBus`] event; [`UserDirectory`] keeps display names.

pub mod bus;
mod error;
pub mod metrics;
mod model;
mod pipeline;
mod users;

pub use bus::{
    BusConfig, DeliveryMode, Event, EventKind, NotificationBus, PublishOutcome, Subscription,
};
pub use error::{Error, Result};
pub use model::{Message, PostMessage};
pub use pipeline::Pipeline;
pub use users::UserDirectory;
