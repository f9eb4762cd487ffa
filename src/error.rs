//! Unified client error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level client error.
#[derive(Error, Debug)]
pub enum BuxError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Errors reported by the server inside a GraphQL response envelope.
    #[error("Server error: {0}")]
    Server(GraphQlErrors),

    /// The server answered without the payload the operation asked for.
    #[error("Empty response: no `{0}` in response data")]
    EmptyResponse(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Wire-level errors. The client performs a single attempt per call, so
/// these are always the failure of that one attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Credential and request-signature errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("an admin xpriv is required for this operation")]
    MissingAdminKey,

    #[error("an xpriv or access key is required to sign requests")]
    MissingXPriv,

    #[error("an xpub is required to identify unsigned requests")]
    MissingXPub,

    #[error("no credentials configured: set an xpriv, xpub or access key")]
    MissingCredentials,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("auth hash does not match the request body")]
    HashMismatch,

    #[error("signature verification failed")]
    InvalidSignature,
}

/// Extended-key and raw-key errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    #[error("invalid extended key length: expected 78, got {0}")]
    InvalidLength(usize),

    #[error("unknown extended key version: {0}")]
    UnknownVersion(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("cannot derive a hardened child from a public key")]
    HardenedFromPublic,

    #[error("maximum derivation depth reached")]
    DepthExceeded,

    #[error("derived key is invalid for index {0}")]
    InvalidChild(u32),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid seed length: {0}")]
    InvalidSeed(usize),

    #[error("hmac: {0}")]
    Hmac(String),
}

/// A single error entry from a GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// All errors the server reported for one request, in the order received.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQlErrors(pub Vec<GraphQlError>);

impl GraphQlErrors {
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.message.as_str())
    }
}

impl fmt::Display for GraphQlErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.messages().collect::<Vec<_>>().join("; ");
        write!(f, "{}", joined)
    }
}

impl From<bs58::decode::Error> for KeyError {
    fn from(e: bs58::decode::Error) -> Self {
        KeyError::InvalidBase58(e.to_string())
    }
}

impl From<hex::FromHexError> for KeyError {
    fn from(e: hex::FromHexError) -> Self {
        KeyError::InvalidHex(e.to_string())
    }
}
