//! Wallet-ledger records exchanged with the bux server.
//!
//! These are plain serde DTOs: the server owns their schema and validation,
//! so every field the server may omit is optional here.

pub mod destination;
pub mod transaction;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub use destination::Destination;
pub use transaction::{
    ChangeDestination, DraftTransaction, OpReturn, PaymailP4, Recipient, ScriptOutput,
    Transaction, TransactionConfig, TransactionInput, TransactionOutput,
};

/// Free-form key/value metadata attached to a record.
pub type Metadata = Map<String, Value>;

/// Server-side filter conditions for transaction searches.
pub type Conditions = Map<String, Value>;

/// Metadata as sent on the wire: absent becomes an empty object.
pub fn process_metadata(metadata: Option<&Metadata>) -> Metadata {
    metadata.cloned().unwrap_or_default()
}

/// Read an explicit `null` as the field's default, like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
