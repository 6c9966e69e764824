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

//! Batch id allocation.
//!
//! A [`Sequence`] reserves `bandwidth` ids at a time from a persisted counter
//! with one atomic read-modify-write, then hands them out from memory. Ids
//! reserved but not handed out before a crash are never reused; they are
//! simply skipped. This trades id density for one storage round-trip per
//! batch instead of per id.

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use prometheus::{IntCounter, register_int_counter};
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    backend::{Keyspace, KvStore},
    error::{AllocationFailedSnafu, Result, ZeroBandwidthSnafu},
};

/// Reserved key of the message id counter in [`Keyspace::Meta`].
pub const ID_COUNTER_KEY: &[u8] = b"id";

/// Ids reserved per counter round-trip unless configured otherwise.
pub const DEFAULT_BANDWIDTH: u64 = 1000;

pub static SEQUENCE_LEASES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "parley_sequence_leases_total",
        "Id batches reserved from the persisted counter"
    )
    .unwrap()
});

#[derive(Debug, Default)]
struct Lease {
    next:   u64,
    leased: u64,
}

/// Strictly increasing id source backed by a persisted counter.
///
/// Several sequences may share one counter (for example across restarts, or
/// two processes on one store); each reserves disjoint ranges, so ids stay
/// unique and each sequence's ids increase.
pub struct Sequence {
    store:     Arc<dyn KvStore>,
    key:       Vec<u8>,
    bandwidth: u64,
    lease:     Mutex<Lease>,
}

impl Sequence {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<Vec<u8>>, bandwidth: u64) -> Result<Self> {
        ensure!(bandwidth > 0, ZeroBandwidthSnafu);
        Ok(Self {
            store,
            key: key.into(),
            bandwidth,
            lease: Mutex::new(Lease::default()),
        })
    }

    pub const fn bandwidth(&self) -> u64 { self.bandwidth }

    /// Returns the next id, reserving a new batch first when the current one
    /// is used up.
    ///
    /// On failure nothing is handed out and the in-memory lease is unchanged.
    pub fn next(&self) -> Result<u64> {
        let mut lease = self.lease.lock();
        if lease.next == lease.leased {
            let start = self
                .store
                .fetch_add(Keyspace::Meta, &self.key, self.bandwidth)
                .context(AllocationFailedSnafu {
                    key: String::from_utf8_lossy(&self.key),
                })?;
            // fetch_add already proved start + bandwidth does not overflow
            lease.next = start;
            lease.leased = start + self.bandwidth;
            SEQUENCE_LEASES.inc();
            debug!(start, end = lease.leased, "Reserved id batch");
        }
        let id = lease.next;
        lease.next += 1;
        Ok(id)
    }

    /// Hands unissued ids back to the counter.
    ///
    /// Only succeeds when no other sequence reserved a batch after ours;
    /// otherwise the remainder is forfeited. Either way no id is ever issued
    /// twice.
    pub fn release(&self) -> Result<bool> {
        let mut lease = self.lease.lock();
        if lease.next == lease.leased {
            return Ok(false);
        }
        let returned = self.store.compare_and_swap(
            Keyspace::Meta,
            &self.key,
            lease.leased,
            lease.next,
        )?;
        if returned {
            debug!(from = lease.next, to = lease.leased, "Released unused ids");
            lease.leased = lease.next;
        }
        Ok(returned)
    }
}
