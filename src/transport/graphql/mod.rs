//! GraphQL transport: documents POSTed to the bux GraphQL endpoint.

pub mod query;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthScope, AuthSnapshot, Authenticator};
use crate::domain::{
    Conditions, Destination, DraftTransaction, Metadata, Recipient, Transaction, TransactionConfig,
};
use crate::error::{BuxError, GraphQlError, GraphQlErrors, TransportError};
use crate::http::WireClient;

pub use query::{Operation, QueryArguments};

use super::{TransportConfig, TransportKind, TransportService};

// ============================================================================
// Response envelopes
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpubData {
    pub xpub: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationData {
    pub destination: Option<Destination>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftTransactionData {
    pub new_transaction: Option<DraftTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsData {
    pub transactions: Option<Vec<Transaction>>,
}

// ============================================================================
// Transport
// ============================================================================

/// Talks to the bux GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct TransportGraphQl {
    wire: WireClient,
    auth: Authenticator,
}

impl TransportGraphQl {
    /// Sign, send and decode one operation, returning its `data` object.
    async fn execute<T: DeserializeOwned>(
        &self,
        auth: &AuthSnapshot,
        scope: AuthScope,
        op: &Operation,
    ) -> Result<T, BuxError> {
        auth.check(scope)?;
        let body = op.body()?;
        let headers = auth.headers(scope, &body)?;

        tracing::debug!(operation = op.field, signed = headers.is_signed(), "GraphQL request");
        let resp = self.wire.post(self.wire.base_url(), &body, &headers).await?;

        let decoded = match serde_json::from_str::<GraphQlResponse<T>>(&resp.body) {
            Ok(decoded) => decoded,
            Err(_) if !resp.is_success() => return Err(resp.status_error().into()),
            Err(e) => return Err(TransportError::Decode(e.to_string()).into()),
        };

        match decoded.errors {
            Some(errors) if !errors.is_empty() => {
                tracing::debug!(operation = op.field, count = errors.len(), "GraphQL errors");
                return Err(BuxError::Server(GraphQlErrors(errors)));
            }
            _ => {}
        }
        if !resp.is_success() {
            return Err(resp.status_error().into());
        }
        decoded.data.ok_or(BuxError::EmptyResponse(op.field))
    }

    /// Shared tail of both `new_transaction` variants.
    async fn draft(
        &self,
        auth: &AuthSnapshot,
        op: &Operation,
    ) -> Result<DraftTransaction, BuxError> {
        let data: DraftTransactionData = self.execute(auth, AuthScope::User, op).await?;
        let draft = data.new_transaction.ok_or(BuxError::EmptyResponse(op.field))?;
        if auth.debug() {
            tracing::info!("Draft transaction: {:?}", draft);
        }
        Ok(draft)
    }
}

#[async_trait]
impl TransportService for TransportGraphQl {
    fn init(config: TransportConfig) -> Result<Self, BuxError> {
        let wire = WireClient::new(&config.server_url, config.http_client.clone(), config.timeout)?;
        Ok(Self {
            auth: config.authenticator(),
            wire,
        })
    }

    fn kind(&self) -> TransportKind {
        TransportKind::GraphQl
    }

    fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    async fn register_xpub(
        &self,
        raw_xpub: &str,
        metadata: Option<&Metadata>,
    ) -> Result<(), BuxError> {
        let auth = self.auth.snapshot().await;
        auth.check(AuthScope::Admin)?;

        let op = Operation::register_xpub(raw_xpub, metadata)?;
        let data: XpubData = self.execute(&auth, AuthScope::Admin, &op).await?;
        if auth.debug() {
            tracing::info!("Registered xpub: {:?}", data.xpub);
        }
        Ok(())
    }

    async fn get_destination(&self, metadata: Option<&Metadata>) -> Result<Destination, BuxError> {
        let auth = self.auth.snapshot().await;
        let op = Operation::get_destination(metadata)?;
        let data: DestinationData = self.execute(&auth, AuthScope::User, &op).await?;
        let destination = data.destination.ok_or(BuxError::EmptyResponse(op.field))?;
        if auth.debug() {
            tracing::info!("Address for new destination: {}", destination.address);
        }
        Ok(destination)
    }

    async fn draft_transaction(
        &self,
        config: &TransactionConfig,
        metadata: Option<&Metadata>,
    ) -> Result<DraftTransaction, BuxError> {
        let auth = self.auth.snapshot().await;
        let op = Operation::draft_transaction(config, metadata)?;
        self.draft(&auth, &op).await
    }

    async fn draft_to_recipients(
        &self,
        recipients: &[Recipient],
        metadata: Option<&Metadata>,
    ) -> Result<DraftTransaction, BuxError> {
        let auth = self.auth.snapshot().await;
        let op = Operation::draft_to_recipients(recipients, metadata)?;
        self.draft(&auth, &op).await
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<Transaction, BuxError> {
        let auth = self.auth.snapshot().await;
        let op = Operation::get_transaction(tx_id);
        let data: TransactionData = self.execute(&auth, AuthScope::User, &op).await?;
        let transaction = data.transaction.ok_or(BuxError::EmptyResponse(op.field))?;
        if auth.debug() {
            tracing::info!("Transaction: {}", transaction.id);
        }
        Ok(transaction)
    }

    async fn get_transactions(
        &self,
        conditions: Option<&Conditions>,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<Transaction>, BuxError> {
        let auth = self.auth.snapshot().await;
        let op = Operation::get_transactions(conditions, metadata)?;
        let data: TransactionsData = self.execute(&auth, AuthScope::User, &op).await?;
        let transactions = data.transactions.ok_or(BuxError::EmptyResponse(op.field))?;
        if auth.debug() {
            tracing::info!("Transactions: {}", transactions.len());
        }
        Ok(transactions)
    }

    async fn record_transaction(
        &self,
        hex: &str,
        reference_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Transaction, BuxError> {
        let auth = self.auth.snapshot().await;
        let op = Operation::record_transaction(hex, reference_id, metadata)?;
        let data: TransactionData = self.execute(&auth, AuthScope::User, &op).await?;
        let transaction = data.transaction.ok_or(BuxError::EmptyResponse(op.field))?;
        if auth.debug() {
            tracing::info!("Transaction: {}", transaction.id);
        }
        Ok(transaction)
    }
}
