//! Destination: a receiving address and its locking script.

use serde::{Deserialize, Serialize};

use super::{null_as_default, Metadata};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub xpub_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locking_script: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "type")]
    pub script_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
}
