//! Transport layer: interchangeable wire protocols behind one trait.
//!
//! Every transport signs with the same [`Authenticator`] rules, so switching
//! between GraphQL and REST changes the wire format only.

pub mod graphql;
pub mod rest;

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::Authenticator;
use crate::domain::{
    Conditions, Destination, DraftTransaction, Metadata, Recipient, Transaction, TransactionConfig,
};
use crate::error::BuxError;
use crate::keys::ExtendedKey;

pub use crate::auth::Credentials;
pub use graphql::TransportGraphQl;
pub use rest::TransportHttp;

/// Built-in wire protocols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    GraphQl,
    Http,
}

impl TransportKind {
    pub fn default_url(self) -> &'static str {
        match self {
            TransportKind::GraphQl => crate::network::DEFAULT_GRAPHQL_URL,
            TransportKind::Http => crate::network::DEFAULT_HTTP_URL,
        }
    }
}

/// Everything a transport needs to initialize.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub server_url: String,
    pub http_client: Option<reqwest::Client>,
    pub timeout: Duration,
    pub credentials: Credentials,
    pub admin_key: Option<ExtendedKey>,
    pub sign_request: bool,
    pub debug: bool,
}

impl TransportConfig {
    pub fn new(server_url: &str, credentials: Credentials) -> Self {
        Self {
            server_url: server_url.to_string(),
            http_client: None,
            timeout: crate::network::DEFAULT_TIMEOUT,
            credentials,
            admin_key: None,
            sign_request: false,
            debug: false,
        }
    }

    pub(crate) fn authenticator(&self) -> Authenticator {
        Authenticator::new(
            self.credentials.clone(),
            self.admin_key.clone(),
            self.sign_request,
            self.debug,
        )
    }
}

/// One wire protocol to the bux server.
///
/// Each call performs at most one request. Dropping the returned future
/// aborts it; nothing is retried.
#[async_trait]
pub trait TransportService: Send + Sync {
    /// Build the transport from its configuration.
    fn init(config: TransportConfig) -> Result<Self, BuxError>
    where
        Self: Sized;

    fn kind(&self) -> TransportKind;

    /// Shared signing state and runtime toggles.
    fn authenticator(&self) -> &Authenticator;

    /// Register an xpub. Always signed with the admin key.
    async fn register_xpub(
        &self,
        raw_xpub: &str,
        metadata: Option<&Metadata>,
    ) -> Result<(), BuxError>;

    async fn get_destination(&self, metadata: Option<&Metadata>) -> Result<Destination, BuxError>;

    async fn draft_transaction(
        &self,
        config: &TransactionConfig,
        metadata: Option<&Metadata>,
    ) -> Result<DraftTransaction, BuxError>;

    /// Draft a payment to `recipients` with three random change destinations.
    async fn draft_to_recipients(
        &self,
        recipients: &[Recipient],
        metadata: Option<&Metadata>,
    ) -> Result<DraftTransaction, BuxError> {
        self.draft_transaction(&TransactionConfig::to_recipients(recipients), metadata)
            .await
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<Transaction, BuxError>;

    async fn get_transactions(
        &self,
        conditions: Option<&Conditions>,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<Transaction>, BuxError>;

    /// Record a signed transaction against the draft `reference_id`.
    async fn record_transaction(
        &self,
        hex: &str,
        reference_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Transaction, BuxError>;
}
