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

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use crate::error::{InvalidAddressSnafu, Result, ValidationSnafu};

/// A stored chat message.
///
/// Field names on the wire are the ones the bundled web client reads
/// (`Content`, `UserIP`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "Date")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "Content")]
    pub content:    String,
    #[serde(rename = "ID")]
    pub id:         u64,
    #[serde(rename = "UserIP")]
    pub origin:     IpAddr,
}

/// Body of a post request. Accepts `content`/`Content` and
/// `address`/`Address`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct PostMessage {
    #[serde(default, alias = "Content")]
    #[builder(into)]
    pub content: String,
    #[serde(default, alias = "Address")]
    #[builder(into)]
    pub address: String,
}

impl PostMessage {
    /// Checks both fields are present and returns the parsed address.
    pub fn validate(&self) -> Result<IpAddr> {
        ensure!(
            !self.content.is_empty() && !self.address.is_empty(),
            ValidationSnafu {
                reason: "body must include a valid content and address field",
            }
        );
        self.address
            .parse::<IpAddr>()
            .context(InvalidAddressSnafu {
                address: &self.address,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn message_uses_client_field_names() {
        let message = Message {
            created_at: "2024-05-01T10:00:00Z".parse().unwrap(),
            content:    "hi".to_string(),
            id:         4,
            origin:     "10.0.0.7".parse().unwrap(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["Content"], "hi");
        assert_eq!(json["ID"], 4);
        assert_eq!(json["UserIP"], "10.0.0.7");
        assert_eq!(json["Date"], "2024-05-01T10:00:00Z");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn post_body_accepts_either_casing() {
        let lower: PostMessage =
            serde_json::from_str(r#"{"content": "a", "address": "::1"}"#).unwrap();
        let upper: PostMessage =
            serde_json::from_str(r#"{"Content": "a", "Address": "::1"}"#).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn validation() {
        let ok = PostMessage::builder()
            .content("hi")
            .address("127.0.0.1")
            .build();
        assert_eq!(ok.validate().unwrap(), "127.0.0.1".parse::<IpAddr>().unwrap());

        let empty = PostMessage::builder().content("").address("127.0.0.1").build();
        assert!(matches!(empty.validate(), Err(Error::Validation { .. })));

        let missing: PostMessage = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert!(matches!(missing.validate(), Err(Error::Validation { .. })));

        let bad = PostMessage::builder().content("hi").address("localhost").build();
        assert!(matches!(bad.validate(), Err(Error::InvalidAddress { .. })));
    }
}
