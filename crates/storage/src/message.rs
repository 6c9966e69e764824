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

use snafu::OptionExt;

use crate::{
    backend::{Keyspace, KvStore, Scan, scan},
    error::{NotFoundSnafu, Result},
    key,
};

/// Default number of entries fetched per scan page.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 256;

/// Serialized messages keyed by encoded id.
///
/// The store only deals in bytes; the message format belongs to the caller.
pub struct MessageStore {
    store:     Arc<dyn KvStore>,
    page_size: usize,
}

impl MessageStore {
    pub fn new(store: Arc<dyn KvStore>, page_size: usize) -> Self { Self { store, page_size } }

    /// Writes `value` under `id`. Retrying with the same pair is harmless.
    pub fn put(&self, id: u64, value: &[u8]) -> Result<()> {
        self.store.put(Keyspace::Messages, &key::encode(id), value)
    }

    pub fn get(&self, id: u64) -> Result<Vec<u8>> {
        self.store
            .get(Keyspace::Messages, &key::encode(id))?
            .context(NotFoundSnafu {
                what: format!("message {id}"),
            })
    }

    /// Deleting an id that was never stored succeeds.
    pub fn delete(&self, id: u64) -> Result<()> {
        self.store.delete(Keyspace::Messages, &key::encode(id))
    }

    /// All stored messages in ascending id order.
    ///
    /// Zero-length values are hidden entries, not messages, and are skipped.
    pub fn scan_all(&self) -> MessageScan {
        MessageScan {
            inner: scan(Arc::clone(&self.store), Keyspace::Messages, self.page_size),
        }
    }
}

/// Iterator returned by [`MessageStore::scan_all`].
pub struct MessageScan {
    inner: Scan,
}

impl Iterator for MessageScan {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok((_, value)) if value.is_empty() => {}
                Ok((_, value)) => return Some(Ok(value)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
