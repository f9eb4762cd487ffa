//! GraphQL documents and their variables, one constructor per operation.
//!
//! Documents are fixed wire contracts with the bux server. Values that cannot
//! travel as variables (xpub, tx id, hex, reference id) are interpolated as
//! escaped string literals.

use serde::Serialize;

use crate::auth::{CanonicalBody, Variables};
use crate::domain::transaction::{DEFAULT_CHANGE_DESTINATIONS, DEFAULT_CHANGE_STRATEGY};
use crate::domain::{
    process_metadata, Conditions, Metadata, OpReturn, Recipient, TransactionConfig,
};
use crate::error::BuxError;

const DESTINATION_FIELDS: &str = "{
    id
    xpub_id
    locking_script
    type
    chain
    num
    address
    metadata
  }";

const TRANSACTION_FIELDS: &str = "{
    id
    hex
    xpub_in_ids
    xpub_out_ids
    block_hash
    block_height
    fee
    number_of_inputs
    number_of_outputs
    draft_id
    total_value
  }";

const DRAFT_TRANSACTION_FIELDS: &str = "{
    id
    xpub_id
    configuration {
      inputs {
        id
        satoshis
        transaction_id
        output_index
        script_pub_key
        destination {
          id
          address
          type
          num
          chain
          locking_script
        }
      }
      outputs {
        to
        satoshis
        scripts {
          address
          satoshis
          script
        }
        paymail_p4 {
          alias
          domain
          from_paymail
          note
          pub_key
          receive_endpoint
          reference_id
          resolution_type
        }
      }
      change_destinations {
        address
        chain
        num
        locking_script
        draft_id
      }
      change_satoshis
      fee
    }
    status
    expires_at
    hex
  }";

/// One entry of the `$outputs` list. `op_return` is always present, `null`
/// when the recipient has none.
#[derive(Debug, Serialize)]
struct RecipientOutput<'a> {
    to: &'a str,
    satoshis: u64,
    op_return: Option<&'a OpReturn>,
}

impl<'a> From<&'a Recipient> for RecipientOutput<'a> {
    fn from(r: &'a Recipient) -> Self {
        Self {
            to: &r.to,
            satoshis: r.satoshis,
            op_return: r.op_return.as_ref(),
        }
    }
}

/// A GraphQL document with its variables.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Top-level response field holding the payload.
    pub field: &'static str,
    pub query: String,
    pub variables: Variables,
}

impl Operation {
    /// The exact bytes to sign and send.
    pub fn body(&self) -> Result<CanonicalBody, BuxError> {
        CanonicalBody::encode(&self.query, &self.variables)
    }

    pub fn register_xpub(raw_xpub: &str, metadata: Option<&Metadata>) -> Result<Self, BuxError> {
        let query = format!(
            "mutation ($metadata: Map) {{
  xpub(
    xpub: {}
    metadata: $metadata
  ) {{
    id
  }}
}}",
            string_literal(raw_xpub)
        );
        let mut variables = Variables::new();
        variables.insert("metadata", &process_metadata(metadata))?;
        Ok(Self {
            field: "xpub",
            query,
            variables,
        })
    }

    pub fn get_destination(metadata: Option<&Metadata>) -> Result<Self, BuxError> {
        let query = format!(
            "mutation ($metadata: Map) {{
  destination(
    metadata: $metadata
  ) {}
}}",
            DESTINATION_FIELDS
        );
        let mut variables = Variables::new();
        variables.insert("metadata", &process_metadata(metadata))?;
        Ok(Self {
            field: "destination",
            query,
            variables,
        })
    }

    pub fn draft_transaction(
        config: &TransactionConfig,
        metadata: Option<&Metadata>,
    ) -> Result<Self, BuxError> {
        let query = format!(
            "mutation ($transactionConfig: TransactionConfigInput!, $metadata: Map) {{
  new_transaction(
    transaction_config: $transactionConfig
    metadata: $metadata
  ) {}
}}",
            DRAFT_TRANSACTION_FIELDS
        );
        let mut variables = Variables::new();
        variables.insert("transactionConfig", config)?;
        variables.insert("metadata", &process_metadata(metadata))?;
        Ok(Self {
            field: "new_transaction",
            query,
            variables,
        })
    }

    /// Draft to `recipients` with the change settings fixed in the document.
    pub fn draft_to_recipients(
        recipients: &[Recipient],
        metadata: Option<&Metadata>,
    ) -> Result<Self, BuxError> {
        let query = format!(
            "mutation ($outputs: [TransactionOutputInput]!, $metadata: Map) {{
  new_transaction(
    transaction_config: {{
      outputs: $outputs
      change_number_of_destinations: {}
      change_destinations_strategy: {}
    }}
    metadata: $metadata
  ) {}
}}",
            DEFAULT_CHANGE_DESTINATIONS,
            string_literal(DEFAULT_CHANGE_STRATEGY),
            DRAFT_TRANSACTION_FIELDS
        );
        let outputs: Vec<RecipientOutput<'_>> =
            recipients.iter().map(RecipientOutput::from).collect();
        let mut variables = Variables::new();
        variables.insert("outputs", &outputs)?;
        variables.insert("metadata", &process_metadata(metadata))?;
        Ok(Self {
            field: "new_transaction",
            query,
            variables,
        })
    }

    pub fn get_transaction(tx_id: &str) -> Self {
        let query = format!(
            "query {{
  transaction(
    txId: {}
  ) {}
}}",
            string_literal(tx_id),
            TRANSACTION_FIELDS
        );
        Self {
            field: "transaction",
            query,
            variables: Variables::new(),
        }
    }

    /// Filters are declared only when given, conditions before metadata.
    pub fn get_transactions(
        conditions: Option<&Conditions>,
        metadata: Option<&Metadata>,
    ) -> Result<Self, BuxError> {
        let mut args = QueryArguments::new();
        let mut variables = Variables::new();
        if let Some(conditions) = conditions {
            args = args.argument("conditions", "Map");
            variables.insert("conditions", conditions)?;
        }
        if let Some(metadata) = metadata {
            args = args.argument("metadata", "Map");
            variables.insert("metadata", metadata)?;
        }

        let query = format!(
            "query {}{{
  transactions{} {}
}}",
            args.declaration(),
            args.binding(),
            TRANSACTION_FIELDS
        );
        Ok(Self {
            field: "transactions",
            query,
            variables,
        })
    }

    pub fn record_transaction(
        hex: &str,
        reference_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Self, BuxError> {
        let query = format!(
            "mutation ($metadata: Map) {{
  transaction(
    hex: {}
    draft_id: {}
    metadata: $metadata
  ) {}
}}",
            string_literal(hex),
            string_literal(reference_id),
            TRANSACTION_FIELDS
        );
        let mut variables = Variables::new();
        variables.insert("metadata", &process_metadata(metadata))?;
        Ok(Self {
            field: "transaction",
            query,
            variables,
        })
    }
}

/// Optional operation arguments, rendered in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct QueryArguments {
    declarations: Vec<String>,
    bindings: Vec<String>,
}

impl QueryArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `$name: graphql_type` and bind it to the field argument `name`.
    pub fn argument(mut self, name: &str, graphql_type: &str) -> Self {
        self.declarations.push(format!("${}: {}", name, graphql_type));
        self.bindings.push(format!("{}: ${}", name, name));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// `($a: T, $b: U) ` or nothing.
    pub fn declaration(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("({}) ", self.declarations.join(", "))
    }

    /// `(a: $a, b: $b)` or nothing.
    pub fn binding(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("({})", self.bindings.join(", "))
    }
}

/// `value` as a quoted, escaped GraphQL string.
pub fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
