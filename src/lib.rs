//! # bux-client
//!
//! A Rust client for bux wallet-ledger servers: register xpubs, request
//! destinations, draft and record transactions, and query transaction
//! history over GraphQL or REST, with every request body signed by a
//! secp256k1 key.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: BIP32 keys, hashing, domain records, errors
//! 2. **Auth**: canonical bodies, Bitcoin Signed Message signatures, auth headers
//! 3. **HTTP**: `WireClient`, a single-attempt request executor
//! 4. **Transports**: `TransportGraphQl` and `TransportHttp` behind `TransportService`
//! 5. **High-Level Client**: `BuxClient` with its builder and runtime setters
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bux_client::prelude::*;
//!
//! let client = BuxClient::builder()
//!     .server_url("http://localhost:3003/graphql")
//!     .xpriv("xprv9s21ZrQH143K...")
//!     .build()?;
//!
//! let destination = client.get_destination(None).await?;
//! let draft = client
//!     .draft_to_recipients(&[Recipient::new("alice@example.com", 1000)], None)
//!     .await?;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// BIP32 extended keys and hash helpers.
pub mod keys;

/// Wallet-ledger records: destinations, transactions, drafts.
pub mod domain;

/// Unified client error types.
pub mod error;

/// Default endpoints and timeouts.
pub mod network;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Request signing: canonical bodies, signatures, credentials.
pub mod auth;

// ── Layer 3: HTTP ────────────────────────────────────────────────────────────

/// Single-attempt HTTP client.
pub mod http;

// ── Layer 4: Transports ──────────────────────────────────────────────────────

/// GraphQL and REST transports.
pub mod transport;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `BuxClient`: the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Keys
    pub use crate::keys::{ExtendedKey, Network};

    // Domain types
    pub use crate::domain::{
        ChangeDestination, Conditions, Destination, DraftTransaction, Metadata, OpReturn,
        PaymailP4, Recipient, ScriptOutput, Transaction, TransactionConfig, TransactionInput,
        TransactionOutput,
    };

    // Errors
    pub use crate::error::{
        AuthError, BuxError, GraphQlError, GraphQlErrors, KeyError, TransportError,
    };

    // Network
    pub use crate::network::{DEFAULT_GRAPHQL_URL, DEFAULT_HTTP_URL, DEFAULT_TIMEOUT};

    // Auth
    pub use crate::auth::{
        create_access_key_signature, create_signature, verify_signature, AuthHeaders,
        AuthPayload, AuthScope, Authenticator, CanonicalBody, Credentials, Variables,
    };

    // Transports
    pub use crate::transport::{
        TransportConfig, TransportGraphQl, TransportHttp, TransportKind, TransportService,
    };

    // Client
    pub use crate::client::{BuxClient, BuxClientBuilder};
}
