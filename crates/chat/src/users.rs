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

use parley_storage::UserStore;
use snafu::{ResultExt, ensure};
use tracing::info;

use crate::{
    error::{InvalidAddressSnafu, Result, StorageSnafu, ValidationSnafu},
    pipeline::blocking,
};

/// Address to display-name lookups.
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<UserStore>,
}

impl UserDirectory {
    pub const fn new(users: Arc<UserStore>) -> Self { Self { users } }

    /// Records `username` for `address`, replacing any previous name.
    pub async fn set(&self, address: &str, username: &str) -> Result<IpAddr> {
        ensure!(
            !address.is_empty() && !username.is_empty(),
            ValidationSnafu {
                reason: "address and username are required",
            }
        );
        let ip = address
            .parse::<IpAddr>()
            .context(InvalidAddressSnafu { address })?;

        let users = Arc::clone(&self.users);
        let name = username.to_string();
        blocking(move || users.set(ip, &name).context(StorageSnafu { op: "store username" })).await?;
        info!(address = %ip, username, "Username set");
        Ok(ip)
    }

    pub async fn get(&self, address: &str) -> Result<String> {
        // stored under the canonical form, so `::0001` finds `::1`
        let key = address
            .parse::<IpAddr>()
            .map_or_else(|_| address.to_string(), |ip| ip.to_string());
        let users = Arc::clone(&self.users);
        blocking(move || users.get(&key).context(StorageSnafu { op: "load username" })).await
    }
}

#[cfg(test)]
mod tests {
    use parley_error::{ErrorExt, StatusCode};
    use parley_storage::MemoryStore;

    use super::*;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(UserStore::new(Arc::new(MemoryStore::new()))))
    }

    #[tokio::test]
    async fn set_then_get() {
        let users = directory();
        users.set("10.1.2.3", "ada").await.unwrap();
        users.set("10.1.2.3", "grace").await.unwrap();
        assert_eq!(users.get("10.1.2.3").await.unwrap(), "grace");
    }

    #[tokio::test]
    async fn lookups_use_canonical_addresses() {
        let users = directory();
        users.set("0:0:0:0:0:0:0:1", "local").await.unwrap();
        assert_eq!(users.get("::1").await.unwrap(), "local");
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let users = directory();
        let missing = users.set("", "ada").await.unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::InvalidArgument);
        let bad = users.set("not-an-ip", "ada").await.unwrap_err();
        assert_eq!(bad.status_code(), StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let err = directory().get("10.9.9.9").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotFound);
    }
}
