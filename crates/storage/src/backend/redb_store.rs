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

use std::{
    fs,
    ops::Bound,
    path::{Path, PathBuf},
};

use redb::{Database, ReadableTable, TableDefinition};
use snafu::{IntoError, ResultExt};
use tracing::info;

use super::{Entry, Keyspace, KvStore, advance_counter, decode_counter};
use crate::error::{BackendSnafu, CreateDataDirSnafu, Error, OpenDatabaseSnafu, Result};

type RawTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

const MESSAGES: RawTable = TableDefinition::new("messages");
const USERS: RawTable = TableDefinition::new("users");
const META: RawTable = TableDefinition::new("meta");

const fn table_def(space: Keyspace) -> RawTable {
    match space {
        Keyspace::Messages => MESSAGES,
        Keyspace::Users => USERS,
        Keyspace::Meta => META,
    }
}

fn backend<E: Into<redb::Error>>(op: &'static str, keyspace: Keyspace) -> impl FnOnce(E) -> Error {
    move |e| BackendSnafu { op, keyspace }.into_error(e.into())
}

/// Persistent [`KvStore`] on a single redb file.
///
/// Every write commits its own transaction with immediate durability, so a
/// successful `put` survives a crash.
pub struct RedbStore {
    db:   Database,
    path: PathBuf,
}

impl RedbStore {
    /// Opens or creates the database file, creating parent directories and all
    /// keyspace tables as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context(CreateDataDirSnafu { path: parent })?;
        }

        let db = Database::create(path)
            .map_err(redb::Error::from)
            .context(OpenDatabaseSnafu { path })?;

        let txn = db
            .begin_write()
            .map_err(redb::Error::from)
            .context(OpenDatabaseSnafu { path })?;
        for space in Keyspace::ALL {
            txn.open_table(table_def(space))
                .map_err(backend("create table", space))?;
        }
        txn.commit()
            .map_err(redb::Error::from)
            .context(OpenDatabaseSnafu { path })?;

        info!(path = %path.display(), "Opened redb store");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl KvStore for RedbStore {
    fn get(&self, space: Keyspace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(backend("get", space))?;
        let table = txn.open_table(table_def(space)).map_err(backend("get", space))?;
        let value = table.get(key).map_err(backend("get", space))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, space: Keyspace, key: &[u8], value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write().map_err(backend("put", space))?;
        {
            let mut table = txn.open_table(table_def(space)).map_err(backend("put", space))?;
            table.insert(key, value).map_err(backend("put", space))?;
        }
        txn.commit().map_err(backend("put", space))
    }

    fn delete(&self, space: Keyspace, key: &[u8]) -> Result<()> {
        let txn = self.db.begin_write().map_err(backend("delete", space))?;
        {
            let mut table = txn
                .open_table(table_def(space))
                .map_err(backend("delete", space))?;
            table.remove(key).map_err(backend("delete", space))?;
        }
        txn.commit().map_err(backend("delete", space))
    }

    fn scan_page(
        &self,
        space: Keyspace,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let txn = self.db.begin_read().map_err(backend("scan", space))?;
        let table = txn.open_table(table_def(space)).map_err(backend("scan", space))?;
        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (
            after.map_or(Bound::Unbounded, Bound::Excluded),
            Bound::Unbounded,
        );

        let mut page = Vec::with_capacity(limit.min(1024));
        for item in table.range::<&[u8]>(bounds).map_err(backend("scan", space))?.take(limit) {
            let (key, value) = item.map_err(backend("scan", space))?;
            page.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(page)
    }

    fn fetch_add(&self, space: Keyspace, key: &[u8], delta: u64) -> Result<u64> {
        let txn = self.db.begin_write().map_err(backend("fetch_add", space))?;
        let current = {
            let mut table = txn
                .open_table(table_def(space))
                .map_err(backend("fetch_add", space))?;
            let raw = table
                .get(key)
                .map_err(backend("fetch_add", space))?
                .map(|guard| guard.value().to_vec());
            let current = decode_counter(key, raw.as_deref())?;
            let next = advance_counter(key, current, delta)?;
            table
                .insert(key, next.to_be_bytes().as_slice())
                .map_err(backend("fetch_add", space))?;
            current
        };
        txn.commit().map_err(backend("fetch_add", space))?;
        Ok(current)
    }

    fn compare_and_swap(
        &self,
        space: Keyspace,
        key: &[u8],
        current: u64,
        new: u64,
    ) -> Result<bool> {
        let txn = self.db.begin_write().map_err(backend("compare_and_swap", space))?;
        let matched = {
            let mut table = txn
                .open_table(table_def(space))
                .map_err(backend("compare_and_swap", space))?;
            let raw = table
                .get(key)
                .map_err(backend("compare_and_swap", space))?
                .map(|guard| guard.value().to_vec());
            let matched = decode_counter(key, raw.as_deref())? == current;
            if matched {
                table
                    .insert(key, new.to_be_bytes().as_slice())
                    .map_err(backend("compare_and_swap", space))?;
            }
            matched
        };
        if !matched {
            txn.abort().map_err(backend("compare_and_swap", space))?;
            return Ok(false);
        }
        txn.commit().map_err(backend("compare_and_swap", space))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("parley.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.put(Keyspace::Users, b"10.0.0.1", b"alice").unwrap();
            assert_eq!(store.fetch_add(Keyspace::Meta, b"id", 1000).unwrap(), 0);
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert_eq!(
            store.get(Keyspace::Users, b"10.0.0.1").unwrap().as_deref(),
            Some(b"alice".as_slice())
        );
        assert_eq!(store.fetch_add(Keyspace::Meta, b"id", 1000).unwrap(), 1000);
    }

    #[test]
    fn keyspaces_do_not_overlap() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("db.redb")).unwrap();

        // an 8-byte address string and an 8-byte message key
        store.put(Keyspace::Users, b"1.2.3.45", b"bob").unwrap();
        store.put(Keyspace::Messages, b"1.2.3.45", b"{}").unwrap();
        store.put(Keyspace::Meta, b"id", &7u64.to_be_bytes()).unwrap();

        assert_eq!(
            store.get(Keyspace::Users, b"1.2.3.45").unwrap().unwrap(),
            b"bob"
        );
        assert_eq!(
            store.get(Keyspace::Messages, b"1.2.3.45").unwrap().unwrap(),
            b"{}"
        );
        assert!(store.get(Keyspace::Messages, b"id").unwrap().is_none());
    }

    #[test]
    fn compare_and_swap_only_on_match() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("db.redb")).unwrap();
        store.fetch_add(Keyspace::Meta, b"id", 10).unwrap();

        assert!(!store.compare_and_swap(Keyspace::Meta, b"id", 3, 5).unwrap());
        assert!(store.compare_and_swap(Keyspace::Meta, b"id", 10, 4).unwrap());
        assert_eq!(store.fetch_add(Keyspace::Meta, b"id", 0).unwrap(), 4);
    }

    #[test]
    fn scan_page_resumes_after_cursor() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("db.redb")).unwrap();
        for i in [3u64, 1, 2, 5] {
            store
                .put(Keyspace::Messages, &i.to_be_bytes(), &i.to_be_bytes())
                .unwrap();
        }

        let first = store.scan_page(Keyspace::Messages, None, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].0, 2u64.to_be_bytes());

        let rest = store
            .scan_page(Keyspace::Messages, Some(&first[1].0), 10)
            .unwrap();
        let ids: Vec<u64> = rest
            .iter()
            .map(|(k, _)| u64::from_be_bytes(k.as_slice().try_into().unwrap()))
            .collect();
        assert_eq!(ids, vec![3, 5]);
    }
}
