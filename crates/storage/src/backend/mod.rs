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

//! Ordered key-value backends.
//!
//! All persisted state lives in three keyspaces of one store. Keyspaces are
//! separate tables, so an address string that happens to be 8 bytes long can
//! never collide with an encoded message id, and neither can collide with the
//! sequence counter.

mod memory;
mod redb_store;

use std::{collections::VecDeque, sync::Arc};

use snafu::OptionExt;

pub use self::{memory::MemoryStore, redb_store::RedbStore};
use crate::error::{CorruptCounterSnafu, CounterExhaustedSnafu, Result};

/// Logical keyspace inside a [`KvStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Keyspace {
    /// Encoded message id to serialized message.
    #[display("messages")]
    Messages,
    /// Canonical address string to display name.
    #[display("users")]
    Users,
    /// Reserved keys such as the id counter.
    #[display("meta")]
    Meta,
}

impl Keyspace {
    pub const ALL: [Self; 3] = [Self::Messages, Self::Users, Self::Meta];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Messages => 0,
            Self::Users => 1,
            Self::Meta => 2,
        }
    }
}

/// A key and its value.
pub type Entry = (Vec<u8>, Vec<u8>);

/// Ordered key-value store shared by every component that persists state.
///
/// Each call is its own atomic unit. Implementations must be safe to call from
/// many threads at once.
pub trait KvStore: Send + Sync + 'static {
    fn get(&self, space: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Inserts or overwrites.
    fn put(&self, space: Keyspace, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removing an absent key is not an error.
    fn delete(&self, space: Keyspace, key: &[u8]) -> Result<()>;

    /// Returns up to `limit` entries whose keys sort strictly after `after`
    /// (or from the first key when `after` is `None`), in ascending key order.
    fn scan_page(&self, space: Keyspace, after: Option<&[u8]>, limit: usize)
    -> Result<Vec<Entry>>;

    /// Atomically adds `delta` to the big-endian `u64` stored under `key`
    /// (absent reads as zero) and returns the previous value.
    fn fetch_add(&self, space: Keyspace, key: &[u8], delta: u64) -> Result<u64>;

    /// Atomically replaces the counter under `key` with `new` if it currently
    /// equals `current`. Returns whether the swap happened.
    fn compare_and_swap(&self, space: Keyspace, key: &[u8], current: u64, new: u64)
    -> Result<bool>;
}

/// Lazy ascending scan over a keyspace, fetched one page at a time.
///
/// Every call to [`scan`] starts from the first key. Pages are read in
/// separate transactions, so writes landing mid-scan may or may not be seen.
pub struct Scan {
    store:     Arc<dyn KvStore>,
    space:     Keyspace,
    page_size: usize,
    cursor:    Option<Vec<u8>>,
    buffered:  VecDeque<Entry>,
    exhausted: bool,
}

pub fn scan(store: Arc<dyn KvStore>, space: Keyspace, page_size: usize) -> Scan {
    Scan {
        store,
        space,
        page_size: page_size.max(1),
        cursor: None,
        buffered: VecDeque::new(),
        exhausted: false,
    }
}

impl Iterator for Scan {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                return Some(Ok(entry));
            }
            if self.exhausted {
                return None;
            }
            match self
                .store
                .scan_page(self.space, self.cursor.as_deref(), self.page_size)
            {
                Ok(page) => {
                    match page.last() {
                        Some((key, _)) if page.len() == self.page_size => {
                            self.cursor = Some(key.clone());
                        }
                        _ => self.exhausted = true,
                    }
                    self.buffered.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

pub(crate) fn decode_counter(key: &[u8], raw: Option<&[u8]>) -> Result<u64> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    let bytes: [u8; 8] = raw.try_into().ok().context(CorruptCounterSnafu {
        key: String::from_utf8_lossy(key),
        len: raw.len(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

pub(crate) fn advance_counter(key: &[u8], current: u64, delta: u64) -> Result<u64> {
    current.checked_add(delta).context(CounterExhaustedSnafu {
        key: String::from_utf8_lossy(key),
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_crosses_page_boundaries() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        for i in 0u8..7 {
            store.put(Keyspace::Messages, &[i], &[i]).unwrap();
        }
        let keys: Vec<u8> = scan(Arc::clone(&store), Keyspace::Messages, 3)
            .map(|e| e.unwrap().0[0])
            .collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4, 5, 6]);

        // an exact multiple of the page size needs one extra empty page
        let keys = scan(Arc::clone(&store), Keyspace::Messages, 7).count();
        assert_eq!(keys, 7);
    }

    #[test]
    fn scan_of_empty_keyspace_ends_immediately() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        assert_eq!(scan(store, Keyspace::Users, 16).count(), 0);
    }

    #[test]
    fn counter_decoding() {
        assert_eq!(decode_counter(b"id", None).unwrap(), 0);
        assert_eq!(decode_counter(b"id", Some(&9u64.to_be_bytes())).unwrap(), 9);
        assert!(decode_counter(b"id", Some(b"abc")).is_err());
        assert!(advance_counter(b"id", u64::MAX, 1).is_err());
    }
}
