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

use std::{net::IpAddr, sync::Arc};

use snafu::OptionExt;

use crate::{
    backend::{Keyspace, KvStore},
    error::{NotFoundSnafu, Result},
};

/// Display names keyed by network address.
pub struct UserStore {
    store: Arc<dyn KvStore>,
}

impl UserStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self { Self { store } }

    /// Stores `username` under the canonical text form of `address`,
    /// replacing any previous name.
    pub fn set(&self, address: IpAddr, username: &str) -> Result<()> {
        self.store.put(
            Keyspace::Users,
            address.to_string().as_bytes(),
            username.as_bytes(),
        )
    }

    /// Looks up the raw address string as given.
    pub fn get(&self, address: &str) -> Result<String> {
        let raw = self
            .store
            .get(Keyspace::Users, address.as_bytes())?
            .context(NotFoundSnafu {
                what: format!("user {address}"),
            })?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;

    #[test]
    fn set_overwrites_and_uses_canonical_address() {
        let users = UserStore::new(Arc::new(MemoryStore::new()));
        let addr: IpAddr = "::ffff:0:0:1".parse().unwrap();
        users.set(addr, "alice").unwrap();
        users.set(addr, "bob").unwrap();

        assert_eq!(users.get(&addr.to_string()).unwrap(), "bob");
        assert!(users.get("10.9.9.9").unwrap_err().is_not_found());
    }
}
