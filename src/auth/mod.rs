//! Authentication: credentials, request signing, and auth header sets.
//!
//! ## Header Contract
//!
//! Every request carries one of two header sets:
//!
//! - **Unsigned**: `auth_xpub: <xpub>` only. The server pairs this identity
//!   claim with its own out-of-band authorization.
//! - **Signed**: the identifier (`auth_xpub` or `auth_access_key`) plus
//!   `auth_hash`, `auth_nonce`, `auth_time` and `auth_signature`, computed
//!   over the exact body bytes that go on the wire.
//!
//! Xpub registration is admin-gated and always signed with the admin xpriv.
//!
//! ## Replay Protection
//!
//! The signed message includes a fresh 32-byte random nonce and a millisecond
//! timestamp, so no two requests share a signature. Enforcing a freshness
//! window is the server's job.

pub mod canonical;
pub mod message;
pub mod signature;

use std::sync::Arc;

use async_lock::RwLock;
use k256::ecdsa::SigningKey;

use crate::error::{AuthError, BuxError, KeyError};
use crate::keys::ExtendedKey;

pub use canonical::{CanonicalBody, Variables};
pub use signature::{
    create_access_key_signature, create_signature, parse_access_key, verify_signature,
    AuthPayload,
};

pub const AUTH_HEADER: &str = "auth_xpub";
pub const AUTH_ACCESS_KEY: &str = "auth_access_key";
pub const AUTH_HEADER_HASH: &str = "auth_hash";
pub const AUTH_HEADER_NONCE: &str = "auth_nonce";
pub const AUTH_HEADER_TIME: &str = "auth_time";
pub const AUTH_SIGNATURE: &str = "auth_signature";

// ============================================================================
// Credentials
// ============================================================================

/// The caller's own keys. At least one is always present.
#[derive(Clone)]
pub struct Credentials {
    xpriv: Option<ExtendedKey>,
    xpub: Option<ExtendedKey>,
    access_key: Option<SigningKey>,
}

impl Credentials {
    /// Sign with an xpriv; the xpub is derived from it.
    pub fn from_xpriv(xpriv: ExtendedKey) -> Result<Self, KeyError> {
        if !xpriv.is_private() {
            return Err(KeyError::InvalidPrivateKey(
                "expected an xpriv, got an xpub".to_string(),
            ));
        }
        Ok(Self {
            xpub: Some(xpriv.neuter()),
            xpriv: Some(xpriv),
            access_key: None,
        })
    }

    /// Identify by xpub only. Requests cannot be signed with these credentials.
    pub fn from_xpub(xpub: ExtendedKey) -> Self {
        Self {
            xpriv: None,
            xpub: Some(xpub.neuter()),
            access_key: None,
        }
    }

    /// Sign with an access key.
    pub fn from_access_key(key: SigningKey) -> Self {
        Self {
            xpriv: None,
            xpub: None,
            access_key: Some(key),
        }
    }

    /// Add an access key alongside an xpriv or xpub.
    pub fn with_access_key(mut self, key: SigningKey) -> Self {
        self.access_key = Some(key);
        self
    }

    pub fn xpriv(&self) -> Option<&ExtendedKey> {
        self.xpriv.as_ref()
    }

    pub fn xpub(&self) -> Option<&ExtendedKey> {
        self.xpub.as_ref()
    }

    pub fn access_key(&self) -> Option<&SigningKey> {
        self.access_key.as_ref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("xpriv", &self.xpriv.is_some())
            .field("xpub", &self.xpub.as_ref().map(|k| k.to_string()))
            .field("access_key", &self.access_key.is_some())
            .finish()
    }
}

// ============================================================================
// Header sets
// ============================================================================

/// Which key authorizes an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    /// Admin-gated: always signed with the admin xpriv.
    Admin,
    /// Signed with the user's xpriv or access key, or identified by xpub.
    User,
}

/// Auth headers for one request, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(Vec<(&'static str, String)>);

impl AuthHeaders {
    pub(crate) fn push(&mut self, name: &'static str, value: String) {
        self.0.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(n, v)| (*n, v.as_str()))
    }

    /// Whether this set carries a signature.
    pub fn is_signed(&self) -> bool {
        self.get(AUTH_SIGNATURE).is_some()
    }
}

// ============================================================================
// Authenticator
// ============================================================================

#[derive(Clone)]
struct AuthState {
    credentials: Credentials,
    admin_key: Option<ExtendedKey>,
    sign_request: bool,
    debug: bool,
}

/// Shared signing state of a transport: credentials plus the runtime toggles.
///
/// Cloning is cheap and clones share state, so setters on any handle are
/// seen by every transport call started afterwards.
#[derive(Clone)]
pub struct Authenticator {
    state: Arc<RwLock<AuthState>>,
}

impl Authenticator {
    pub fn new(
        credentials: Credentials,
        admin_key: Option<ExtendedKey>,
        sign_request: bool,
        debug: bool,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(AuthState {
                credentials,
                admin_key,
                sign_request,
                debug,
            })),
        }
    }

    pub async fn set_admin_key(&self, admin_key: Option<ExtendedKey>) {
        self.state.write().await.admin_key = admin_key;
    }

    pub async fn set_debug(&self, debug: bool) {
        self.state.write().await.debug = debug;
    }

    pub async fn is_debug(&self) -> bool {
        self.state.read().await.debug
    }

    pub async fn set_sign_request(&self, sign_request: bool) {
        self.state.write().await.sign_request = sign_request;
    }

    pub async fn is_sign_request(&self) -> bool {
        self.state.read().await.sign_request
    }

    pub async fn has_admin_key(&self) -> bool {
        self.state.read().await.admin_key.is_some()
    }

    /// Copy of the current state; a call uses one snapshot from start to end.
    pub async fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            state: self.state.read().await.clone(),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

/// Point-in-time view of an [`Authenticator`].
pub struct AuthSnapshot {
    state: AuthState,
}

impl AuthSnapshot {
    pub fn debug(&self) -> bool {
        self.state.debug
    }

    pub fn sign_request(&self) -> bool {
        self.state.sign_request
    }

    /// Fail early if `scope` cannot be authorized with these credentials.
    pub fn check(&self, scope: AuthScope) -> Result<(), AuthError> {
        let creds = &self.state.credentials;
        match scope {
            AuthScope::Admin => match &self.state.admin_key {
                Some(key) if key.is_private() => Ok(()),
                _ => Err(AuthError::MissingAdminKey),
            },
            AuthScope::User if self.state.sign_request => {
                if creds.xpriv.is_some() || creds.access_key.is_some() {
                    Ok(())
                } else {
                    Err(AuthError::MissingXPriv)
                }
            }
            AuthScope::User => creds.xpub.as_ref().map(|_| ()).ok_or(AuthError::MissingXPub),
        }
    }

    /// The header set for `body` under `scope`.
    pub fn headers(&self, scope: AuthScope, body: &CanonicalBody) -> Result<AuthHeaders, BuxError> {
        self.check(scope)?;
        let creds = &self.state.credentials;

        let payload = match scope {
            AuthScope::Admin => {
                let admin = self.state.admin_key.as_ref().ok_or(AuthError::MissingAdminKey)?;
                create_signature(admin, body.as_str())?
            }
            AuthScope::User if self.state.sign_request => match (&creds.xpriv, &creds.access_key) {
                (Some(xpriv), _) => create_signature(xpriv, body.as_str())?,
                (None, Some(key)) => create_access_key_signature(key, body.as_str())?,
                (None, None) => return Err(AuthError::MissingXPriv.into()),
            },
            AuthScope::User => {
                let xpub = creds.xpub.as_ref().ok_or(AuthError::MissingXPub)?;
                let mut headers = AuthHeaders::default();
                headers.push(AUTH_HEADER, xpub.to_string());
                return Ok(headers);
            }
        };
        Ok(payload.to_headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Network;

    fn xpriv(seed: u8) -> ExtendedKey {
        ExtendedKey::from_seed(&[seed; 32], Network::Mainnet).unwrap()
    }

    fn body() -> CanonicalBody {
        CanonicalBody::encode("query { transaction { id } }", &Variables::new()).unwrap()
    }

    #[tokio::test]
    async fn test_unsigned_sends_xpub_only() {
        let credentials = Credentials::from_xpriv(xpriv(1)).unwrap();
        let auth = Authenticator::new(credentials, None, false, false);
        let headers = auth.snapshot().await.headers(AuthScope::User, &body()).unwrap();
        assert_eq!(headers.get(AUTH_HEADER), Some(xpriv(1).neuter().to_string().as_str()));
        assert!(!headers.is_signed());
        assert_eq!(headers.iter().count(), 1);
    }

    #[tokio::test]
    async fn test_signed_user_request() {
        let credentials = Credentials::from_xpriv(xpriv(1)).unwrap();
        let auth = Authenticator::new(credentials, None, true, false);
        let body = body();
        let headers = auth.snapshot().await.headers(AuthScope::User, &body).unwrap();
        assert!(headers.is_signed());
        assert_eq!(headers.get(AUTH_HEADER), Some(xpriv(1).neuter().to_string().as_str()));

        let payload = AuthPayload {
            xpub: headers.get(AUTH_HEADER).map(str::to_string),
            access_key: None,
            auth_hash: headers.get(AUTH_HEADER_HASH).unwrap().to_string(),
            auth_nonce: headers.get(AUTH_HEADER_NONCE).unwrap().to_string(),
            auth_time: headers.get(AUTH_HEADER_TIME).unwrap().parse().unwrap(),
            signature: headers.get(AUTH_SIGNATURE).unwrap().to_string(),
        };
        assert!(verify_signature(&payload, body.as_str()).is_ok());
    }

    #[tokio::test]
    async fn test_admin_scope_uses_admin_key() {
        let auth = Authenticator::new(
            Credentials::from_xpriv(xpriv(1)).unwrap(),
            Some(xpriv(2)),
            false,
            false,
        );
        let headers = auth.snapshot().await.headers(AuthScope::Admin, &body()).unwrap();
        assert!(headers.is_signed());
        assert_eq!(headers.get(AUTH_HEADER), Some(xpriv(2).neuter().to_string().as_str()));
    }

    #[tokio::test]
    async fn test_admin_scope_without_admin_key() {
        let credentials = Credentials::from_xpriv(xpriv(1)).unwrap();
        let auth = Authenticator::new(credentials, None, true, false);
        let err = auth.snapshot().await.headers(AuthScope::Admin, &body()).unwrap_err();
        assert!(matches!(err, BuxError::Auth(AuthError::MissingAdminKey)));
    }

    #[tokio::test]
    async fn test_admin_key_must_be_private() {
        let auth = Authenticator::new(
            Credentials::from_xpriv(xpriv(1)).unwrap(),
            Some(xpriv(2).neuter()),
            true,
            false,
        );
        assert_eq!(
            auth.snapshot().await.check(AuthScope::Admin),
            Err(AuthError::MissingAdminKey)
        );
    }

    #[tokio::test]
    async fn test_signing_with_xpub_only_fails() {
        let auth = Authenticator::new(Credentials::from_xpub(xpriv(1).neuter()), None, true, false);
        let err = auth.snapshot().await.headers(AuthScope::User, &body()).unwrap_err();
        assert!(matches!(err, BuxError::Auth(AuthError::MissingXPriv)));
    }

    #[tokio::test]
    async fn test_access_key_signs_when_no_xpriv() {
        let key = parse_access_key(&"22".repeat(32)).unwrap();
        let auth = Authenticator::new(Credentials::from_access_key(key), None, true, false);
        let headers = auth.snapshot().await.headers(AuthScope::User, &body()).unwrap();
        assert!(headers.is_signed());
        assert!(headers.get(AUTH_ACCESS_KEY).is_some());
        assert!(headers.get(AUTH_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_unsigned_access_key_only_fails() {
        let key = parse_access_key(&"22".repeat(32)).unwrap();
        let auth = Authenticator::new(Credentials::from_access_key(key), None, false, false);
        assert_eq!(
            auth.snapshot().await.check(AuthScope::User),
            Err(AuthError::MissingXPub)
        );
    }

    #[tokio::test]
    async fn test_setters_apply_to_later_snapshots() {
        let credentials = Credentials::from_xpriv(xpriv(1)).unwrap();
        let auth = Authenticator::new(credentials, None, false, false);
        let before = auth.snapshot().await;
        auth.set_sign_request(true).await;
        auth.set_debug(true).await;
        auth.set_admin_key(Some(xpriv(3))).await;

        assert!(!before.sign_request());
        assert!(auth.is_sign_request().await);
        assert!(auth.is_debug().await);
        assert!(auth.has_admin_key().await);
        assert!(auth.snapshot().await.check(AuthScope::Admin).is_ok());
    }

    #[test]
    fn test_xpub_is_not_an_xpriv() {
        assert!(Credentials::from_xpriv(xpriv(1).neuter()).is_err());
    }
}
