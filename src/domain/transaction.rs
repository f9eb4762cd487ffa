//! Transactions, draft transactions and the configuration that drafts them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{null_as_default, Destination, Metadata};

/// Number of change outputs requested when drafting to recipients.
pub const DEFAULT_CHANGE_DESTINATIONS: u32 = 3;

/// Change-destination strategy used when drafting to recipients.
pub const DEFAULT_CHANGE_STRATEGY: &str = "random";

// ============================================================================
// Recorded transactions
// ============================================================================

/// A transaction known to the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub xpub_in_ids: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub xpub_out_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_inputs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_outputs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

// ============================================================================
// Drafts
// ============================================================================

/// An unsigned, server-computed transaction proposal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftTransaction {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub xpub_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub configuration: TransactionConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// What to draft. Sent as input; echoed back (with inputs, change and fee
/// filled in) inside a [`DraftTransaction`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionConfig {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inputs: Vec<TransactionInput>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<TransactionOutput>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub change_destinations: Vec<ChangeDestination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_destinations_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_number_of_destinations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_satoshis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_all_to: Option<String>,
}

impl TransactionConfig {
    /// A config paying `recipients`, with the default change settings.
    pub fn to_recipients(recipients: &[Recipient]) -> Self {
        Self {
            outputs: recipients.iter().map(TransactionOutput::from).collect(),
            change_number_of_destinations: Some(DEFAULT_CHANGE_DESTINATIONS),
            change_destinations_strategy: Some(DEFAULT_CHANGE_STRATEGY.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionInput {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub satoshis: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_index: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub script_pub_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_return: Option<OpReturn>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub scripts: Vec<ScriptOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymail_p4: Option<PaymailP4>,
}

impl From<&Recipient> for TransactionOutput {
    fn from(r: &Recipient) -> Self {
        Self {
            to: Some(r.to.clone()),
            satoshis: r.satoshis,
            op_return: r.op_return.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScriptOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub satoshis: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub script: String,
}

/// Paymail P2P resolution details for an output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymailP4 {
    #[serde(default, deserialize_with = "null_as_default")]
    pub alias: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_paymail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolution_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeDestination {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locking_script: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub draft_id: String,
}

/// Data-carrier output payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpReturn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub hex_parts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub string_parts: Vec<String>,
}

/// One payee of [`draft_to_recipients`](crate::transport::TransportService::draft_to_recipients).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Recipient {
    pub to: String,
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_return: Option<OpReturn>,
}

impl Recipient {
    pub fn new(to: impl Into<String>, satoshis: u64) -> Self {
        Self {
            to: to.into(),
            satoshis,
            op_return: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recipient_config() {
        let config = TransactionConfig::to_recipients(&[Recipient::new("alice@example.com", 1000)]);
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "outputs": [{"to": "alice@example.com", "satoshis": 1000}],
                "change_number_of_destinations": 3,
                "change_destinations_strategy": "random"
            })
        );
    }

    #[test]
    fn test_draft_from_server_shape() {
        let draft: DraftTransaction = serde_json::from_value(json!({
            "id": "draft-1",
            "xpub_id": "x1",
            "configuration": {
                "inputs": [{
                    "id": "utxo-1",
                    "satoshis": 5000,
                    "transaction_id": "aa",
                    "output_index": 1,
                    "script_pub_key": "76a9",
                    "destination": {
                        "id": "d1",
                        "address": "1abc",
                        "type": "pubkeyhash",
                        "num": 2,
                        "chain": 1,
                        "locking_script": "76a9"
                    }
                }],
                "outputs": [{
                    "to": "alice@example.com",
                    "satoshis": 1000,
                    "scripts": [{"address": "1alice", "satoshis": 1000, "script": "76a9"}],
                    "paymail_p4": {
                        "alias": "alice",
                        "domain": "example.com",
                        "resolution_type": "p2p"
                    }
                }],
                "change_destinations": [{
                    "address": "1chg",
                    "chain": 1,
                    "num": 3,
                    "locking_script": "76a9",
                    "draft_id": "draft-1"
                }],
                "change_satoshis": 3900,
                "fee": 100
            },
            "status": "draft",
            "expires_at": "2026-01-01T00:00:00Z",
            "hex": "0100"
        }))
        .unwrap();

        assert_eq!(draft.configuration.inputs[0].destination.as_ref().unwrap().num, 2);
        assert_eq!(draft.configuration.outputs[0].paymail_p4.as_ref().unwrap().alias, "alice");
        assert_eq!(draft.configuration.change_satoshis, Some(3900));
        assert_eq!(draft.configuration.fee, Some(100));
        assert!(draft.expires_at.is_some());
    }

    #[test]
    fn test_transaction_with_only_id() {
        let tx: Transaction = serde_json::from_value(json!({"id": "tx-1"})).unwrap();
        assert_eq!(tx.id, "tx-1");
        assert!(tx.hex.is_none());
        assert!(tx.xpub_in_ids.is_empty());
    }
}
