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

//! Persistence for parley.
//!
//! - [`key`]: 8-byte big-endian message keys
//! - [`backend`]: the [`KvStore`] trait with redb and in-memory backends
//! - [`Sequence`]: batch id allocation from a persisted counter
//! - [`MessageStore`] and [`UserStore`]: typed views over the keyspaces

pub mod backend;
mod config;
mod error;
pub mod key;
mod message;
mod sequence;
mod user;

pub use backend::{Keyspace, KvStore, MemoryStore, RedbStore};
pub use config::{DATABASE_FILE, Storage, StorageConfig};
pub use error::{Error, Result};
pub use message::{DEFAULT_SCAN_PAGE_SIZE, MessageScan, MessageStore};
pub use sequence::{DEFAULT_BANDWIDTH, ID_COUNTER_KEY, SEQUENCE_LEASES, Sequence};
pub use user::UserStore;
