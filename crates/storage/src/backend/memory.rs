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

use std::{collections::BTreeMap, ops::Bound};

use parking_lot::RwLock;

use super::{Entry, Keyspace, KvStore, advance_counter, decode_counter};
use crate::error::Result;

/// In-process [`KvStore`] backed by one `BTreeMap` per keyspace.
///
/// Nothing survives a restart. Used by tests and `--in-memory` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    spaces: [RwLock<BTreeMap<Vec<u8>, Vec<u8>>>; 3],
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn space(&self, space: Keyspace) -> &RwLock<BTreeMap<Vec<u8>, Vec<u8>>> {
        &self.spaces[space.index()]
    }
}

impl KvStore for MemoryStore {
    fn get(&self, space: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.space(space).read().get(key).cloned())
    }

    fn put(&self, space: Keyspace, key: &[u8], value: &[u8]) -> Result<()> {
        self.space(space).write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, space: Keyspace, key: &[u8]) -> Result<()> {
        self.space(space).write().remove(key);
        Ok(())
    }

    fn scan_page(
        &self,
        space: Keyspace,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(self
            .space(space)
            .read()
            .range::<[u8], _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn fetch_add(&self, space: Keyspace, key: &[u8], delta: u64) -> Result<u64> {
        let mut map = self.space(space).write();
        let current = decode_counter(key, map.get(key).map(Vec::as_slice))?;
        let next = advance_counter(key, current, delta)?;
        map.insert(key.to_vec(), next.to_be_bytes().to_vec());
        Ok(current)
    }

    fn compare_and_swap(
        &self,
        space: Keyspace,
        key: &[u8],
        current: u64,
        new: u64,
    ) -> Result<bool> {
        let mut map = self.space(space).write();
        if decode_counter(key, map.get(key).map(Vec::as_slice))? != current {
            return Ok(false);
        }
        map.insert(key.to_vec(), new.to_be_bytes().to_vec());
        Ok(true)
    }
}
