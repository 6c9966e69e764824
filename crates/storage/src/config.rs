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

use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tracing::info;

use crate::{
    backend::{KvStore, MemoryStore, RedbStore},
    error::Result,
    message::{DEFAULT_SCAN_PAGE_SIZE, MessageStore},
    sequence::{DEFAULT_BANDWIDTH, ID_COUNTER_KEY, Sequence},
    user::UserStore,
};

/// File name of the database inside `data_dir`.
pub const DATABASE_FILE: &str = "parley.redb";

/// Configuration for the persistent state of a parley node.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, bon::Builder)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the database file
    #[default(PathBuf::from("database"))]
    #[builder(default = PathBuf::from("database"), into)]
    pub data_dir:           PathBuf,
    /// Keep everything in memory; nothing survives a restart
    #[default = false]
    #[builder(default = false)]
    pub in_memory:          bool,
    /// Ids reserved per counter round-trip
    #[default(DEFAULT_BANDWIDTH)]
    #[builder(default = DEFAULT_BANDWIDTH)]
    pub sequence_bandwidth: u64,
    /// Entries fetched per page when listing messages
    #[default(DEFAULT_SCAN_PAGE_SIZE)]
    #[builder(default = DEFAULT_SCAN_PAGE_SIZE)]
    pub scan_page_size:     usize,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf { self.data_dir.join(DATABASE_FILE) }

    /// Opens the configured backend and builds the stores on top of it.
    pub fn open(&self) -> Result<Storage> {
        let kv: Arc<dyn KvStore> = if self.in_memory {
            info!("Using in-memory storage");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(RedbStore::open(self.database_path())?)
        };
        Storage::with_backend(kv, self)
    }
}

/// Every store of a node, sharing one backend.
#[derive(Clone)]
pub struct Storage {
    pub messages: Arc<MessageStore>,
    pub users:    Arc<UserStore>,
    pub sequence: Arc<Sequence>,
}

impl Storage {
    pub fn with_backend(kv: Arc<dyn KvStore>, config: &StorageConfig) -> Result<Self> {
        let sequence = Sequence::new(Arc::clone(&kv), ID_COUNTER_KEY, config.sequence_bandwidth)?;
        Ok(Self {
            messages: Arc::new(MessageStore::new(Arc::clone(&kv), config.scan_page_size)),
            users: Arc::new(UserStore::new(kv)),
            sequence: Arc::new(sequence),
        })
    }
}
