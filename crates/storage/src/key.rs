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

//! Fixed-width key encoding for message ids.
//!
//! Ids are stored as 8-byte big-endian keys so that byte-lexicographic key
//! order equals numeric id order, which lets a plain ordered scan return
//! messages oldest first.

use snafu::{OptionExt, ResultExt};

use crate::error::{InvalidIdSnafu, InvalidKeySnafu, Result};

/// Width of an encoded message key.
pub const KEY_LEN: usize = 8;

#[must_use]
pub const fn encode(id: u64) -> [u8; KEY_LEN] { id.to_be_bytes() }

pub fn decode(key: &[u8]) -> Result<u64> {
    let bytes: [u8; KEY_LEN] = key
        .try_into()
        .ok()
        .context(InvalidKeySnafu { len: key.len() })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Parses a decimal id as received in a request path.
pub fn parse_id(raw: &str) -> Result<u64> { raw.parse::<u64>().context(InvalidIdSnafu { id: raw }) }
