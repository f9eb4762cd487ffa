//! High-level client: `BuxClient` over a selected transport.
//!
//! The client forwards every operation to its [`TransportService`] untouched;
//! this module keeps the builder and the runtime setters.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{parse_access_key, Credentials};
use crate::domain::{
    Conditions, Destination, DraftTransaction, Metadata, Recipient, Transaction, TransactionConfig,
};
use crate::error::{AuthError, BuxError};
use crate::keys::ExtendedKey;
use crate::transport::{
    TransportConfig, TransportGraphQl, TransportHttp, TransportKind, TransportService,
};

/// The primary entry point for talking to a bux server.
///
/// Cheap to clone; clones share the transport and its signing state.
#[derive(Clone)]
pub struct BuxClient {
    transport: Arc<dyn TransportService>,
}

impl BuxClient {
    pub fn builder() -> BuxClientBuilder {
        BuxClientBuilder::default()
    }

    /// Wrap an already initialized transport.
    pub fn with_transport<T: TransportService + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &dyn TransportService {
        self.transport.as_ref()
    }

    // ── Options ──────────────────────────────────────────────────────────

    pub async fn set_admin_key(&self, admin_key: Option<ExtendedKey>) {
        self.transport.authenticator().set_admin_key(admin_key).await;
    }

    pub async fn set_debug(&self, debug: bool) {
        self.transport.authenticator().set_debug(debug).await;
    }

    pub async fn is_debug(&self) -> bool {
        self.transport.authenticator().is_debug().await
    }

    pub async fn set_sign_request(&self, sign_request: bool) {
        self.transport.authenticator().set_sign_request(sign_request).await;
    }

    pub async fn is_sign_request(&self) -> bool {
        self.transport.authenticator().is_sign_request().await
    }

    // ── Operations ───────────────────────────────────────────────────────

    pub async fn register_xpub(
        &self,
        raw_xpub: &str,
        metadata: Option<&Metadata>,
    ) -> Result<(), BuxError> {
        self.transport.register_xpub(raw_xpub, metadata).await
    }

    pub async fn get_destination(
        &self,
        metadata: Option<&Metadata>,
    ) -> Result<Destination, BuxError> {
        self.transport.get_destination(metadata).await
    }

    pub async fn draft_transaction(
        &self,
        config: &TransactionConfig,
        metadata: Option<&Metadata>,
    ) -> Result<DraftTransaction, BuxError> {
        self.transport.draft_transaction(config, metadata).await
    }

    pub async fn draft_to_recipients(
        &self,
        recipients: &[Recipient],
        metadata: Option<&Metadata>,
    ) -> Result<DraftTransaction, BuxError> {
        self.transport.draft_to_recipients(recipients, metadata).await
    }

    pub async fn get_transaction(&self, tx_id: &str) -> Result<Transaction, BuxError> {
        self.transport.get_transaction(tx_id).await
    }

    pub async fn get_transactions(
        &self,
        conditions: Option<&Conditions>,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<Transaction>, BuxError> {
        self.transport.get_transactions(conditions, metadata).await
    }

    pub async fn record_transaction(
        &self,
        hex: &str,
        reference_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Transaction, BuxError> {
        self.transport.record_transaction(hex, reference_id, metadata).await
    }
}

impl std::fmt::Debug for BuxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuxClient")
            .field("transport", &self.transport.kind())
            .finish()
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct BuxClientBuilder {
    kind: TransportKind,
    server_url: Option<String>,
    xpriv: Option<String>,
    xpub: Option<String>,
    access_key: Option<String>,
    admin_key: Option<String>,
    sign_request: Option<bool>,
    debug: bool,
    http_client: Option<reqwest::Client>,
    timeout: Option<Duration>,
}

impl BuxClientBuilder {
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Defaults to the local endpoint of the selected transport.
    pub fn server_url(mut self, url: &str) -> Self {
        self.server_url = Some(url.to_string());
        self
    }

    pub fn xpriv(mut self, xpriv: &str) -> Self {
        self.xpriv = Some(xpriv.to_string());
        self
    }

    pub fn xpub(mut self, xpub: &str) -> Self {
        self.xpub = Some(xpub.to_string());
        self
    }

    /// Hex-encoded secp256k1 private key.
    pub fn access_key(mut self, key: &str) -> Self {
        self.access_key = Some(key.to_string());
        self
    }

    pub fn admin_key(mut self, xpriv: &str) -> Self {
        self.admin_key = Some(xpriv.to_string());
        self
    }

    /// Defaults to on when an xpriv or access key is configured.
    pub fn sign_request(mut self, sign: bool) -> Self {
        self.sign_request = Some(sign);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn credentials(&self) -> Result<Credentials, BuxError> {
        let access_key = self.access_key.as_deref().map(parse_access_key).transpose()?;

        let credentials = match (&self.xpriv, &self.xpub) {
            (Some(xpriv), _) => Some(Credentials::from_xpriv(xpriv.parse()?)?),
            (None, Some(xpub)) => Some(Credentials::from_xpub(xpub.parse()?)),
            (None, None) => None,
        };

        match (credentials, access_key) {
            (Some(c), Some(key)) => Ok(c.with_access_key(key)),
            (Some(c), None) => Ok(c),
            (None, Some(key)) => Ok(Credentials::from_access_key(key)),
            (None, None) => Err(AuthError::MissingCredentials.into()),
        }
    }

    pub fn build(self) -> Result<BuxClient, BuxError> {
        let credentials = self.credentials()?;
        let admin_key = self
            .admin_key
            .as_deref()
            .map(str::parse::<ExtendedKey>)
            .transpose()?;
        if admin_key.as_ref().is_some_and(|k| !k.is_private()) {
            return Err(BuxError::Config("admin key must be an xpriv".to_string()));
        }

        let can_sign = credentials.xpriv().is_some() || credentials.access_key().is_some();
        let server_url = self
            .server_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_url());
        let config = TransportConfig {
            http_client: self.http_client,
            timeout: self.timeout.unwrap_or(crate::network::DEFAULT_TIMEOUT),
            admin_key,
            sign_request: self.sign_request.unwrap_or(can_sign),
            debug: self.debug,
            ..TransportConfig::new(server_url, credentials)
        };

        tracing::debug!(transport = ?self.kind, url = %config.server_url, "Building bux client");
        match self.kind {
            TransportKind::GraphQl => {
                Ok(BuxClient::with_transport(TransportGraphQl::init(config)?))
            }
            TransportKind::Http => Ok(BuxClient::with_transport(TransportHttp::init(config)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Network;

    fn xpriv() -> ExtendedKey {
        ExtendedKey::from_seed(&[5u8; 32], Network::Mainnet).unwrap()
    }

    #[test]
    fn test_build_requires_credentials() {
        let err = BuxClient::builder().build().unwrap_err();
        assert!(matches!(err, BuxError::Auth(AuthError::MissingCredentials)));
    }

    #[test]
    fn test_build_rejects_bad_xpriv() {
        let err = BuxClient::builder().xpriv("xprvnotakey").build().unwrap_err();
        assert!(matches!(err, BuxError::Key(_)));
    }

    #[test]
    fn test_admin_key_must_be_private() {
        let err = BuxClient::builder()
            .xpriv(&xpriv().to_string())
            .admin_key(&xpriv().neuter().to_string())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuxError::Config(_)));
    }

    #[tokio::test]
    async fn test_sign_request_defaults_follow_credentials() {
        let signing = BuxClient::builder().xpriv(&xpriv().to_string()).build().unwrap();
        assert!(signing.is_sign_request().await);

        let watching = BuxClient::builder()
            .xpub(&xpriv().neuter().to_string())
            .build()
            .unwrap();
        assert!(!watching.is_sign_request().await);
    }

    #[tokio::test]
    async fn test_setters_are_shared_by_clones() {
        let client = BuxClient::builder()
            .transport(TransportKind::Http)
            .xpriv(&xpriv().to_string())
            .build()
            .unwrap();
        let clone = client.clone();
        client.set_debug(true).await;
        client.set_sign_request(false).await;
        assert!(clone.is_debug().await);
        assert!(!clone.is_sign_request().await);
        assert_eq!(clone.transport().kind(), TransportKind::Http);
    }
}
