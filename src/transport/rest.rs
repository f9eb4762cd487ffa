//! HTTP/REST transport: the same operations as plain JSON endpoints.
//!
//! | Operation | Endpoint |
//! |---|---|
//! | register_xpub | `POST /xpub` |
//! | get_destination | `POST /destination` |
//! | draft_transaction | `POST /transaction` |
//! | get_transaction | `GET /transaction?id=` |
//! | get_transactions | `POST /transaction/search` |
//! | record_transaction | `POST /transaction/record` |
//!
//! A GET carries no body and is signed over the empty string.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{AuthScope, AuthSnapshot, Authenticator, CanonicalBody};
use crate::domain::{
    process_metadata, Conditions, Destination, DraftTransaction, Metadata, Transaction,
    TransactionConfig,
};
use crate::error::BuxError;
use crate::http::{WireClient, WireResponse};

use super::{TransportConfig, TransportKind, TransportService};

#[derive(Serialize)]
struct RegisterXpubRequest<'a> {
    key: &'a str,
    metadata: Metadata,
}

#[derive(Serialize)]
struct MetadataRequest {
    metadata: Metadata,
}

#[derive(Serialize)]
struct DraftRequest<'a> {
    config: &'a TransactionConfig,
    metadata: Metadata,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions: Option<&'a Conditions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Metadata>,
}

#[derive(Serialize)]
struct RecordRequest<'a> {
    hex: &'a str,
    reference_id: &'a str,
    metadata: Metadata,
}

/// Talks to the bux REST API.
#[derive(Debug, Clone)]
pub struct TransportHttp {
    wire: WireClient,
    auth: Authenticator,
}

impl TransportHttp {
    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        auth: &AuthSnapshot,
        scope: AuthScope,
        path: &str,
        request: &B,
    ) -> Result<T, BuxError> {
        auth.check(scope)?;
        let body = CanonicalBody::from_value(request)?;
        let headers = auth.headers(scope, &body)?;

        tracing::debug!(path, signed = headers.is_signed(), "REST request");
        let resp = self.wire.post(&self.wire.url(path), &body, &headers).await?;
        decode(&resp)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        auth: &AuthSnapshot,
        path_and_query: &str,
    ) -> Result<T, BuxError> {
        auth.check(AuthScope::User)?;
        let headers = auth.headers(AuthScope::User, &CanonicalBody::empty())?;

        tracing::debug!(path = path_and_query, signed = headers.is_signed(), "REST request");
        let resp = self.wire.get(&self.wire.url(path_and_query), &headers).await?;
        decode(&resp)
    }
}

fn decode<T: DeserializeOwned>(resp: &WireResponse) -> Result<T, BuxError> {
    Ok(resp.json()?)
}

#[async_trait]
impl TransportService for TransportHttp {
    fn init(config: TransportConfig) -> Result<Self, BuxError> {
        let wire = WireClient::new(&config.server_url, config.http_client.clone(), config.timeout)?;
        Ok(Self {
            auth: config.authenticator(),
            wire,
        })
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
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
        let request = RegisterXpubRequest {
            key: raw_xpub,
            metadata: process_metadata(metadata),
        };
        let registered: serde_json::Value =
            self.post(&auth, AuthScope::Admin, "xpub", &request).await?;
        if auth.debug() {
            tracing::info!("Registered xpub: {}", registered);
        }
        Ok(())
    }

    async fn get_destination(&self, metadata: Option<&Metadata>) -> Result<Destination, BuxError> {
        let auth = self.auth.snapshot().await;
        let request = MetadataRequest {
            metadata: process_metadata(metadata),
        };
        let destination: Destination = self
            .post(&auth, AuthScope::User, "destination", &request)
            .await?;
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
        let request = DraftRequest {
            config,
            metadata: process_metadata(metadata),
        };
        let draft: DraftTransaction = self
            .post(&auth, AuthScope::User, "transaction", &request)
            .await?;
        if auth.debug() {
            tracing::info!("Draft transaction: {:?}", draft);
        }
        Ok(draft)
    }

    async fn get_transaction(&self, tx_id: &str) -> Result<Transaction, BuxError> {
        let auth = self.auth.snapshot().await;
        let path = format!("transaction?id={}", urlencoding::encode(tx_id));
        let transaction: Transaction = self.get(&auth, &path).await?;
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
        let request = SearchRequest {
            conditions,
            metadata,
        };
        let transactions: Vec<Transaction> = self
            .post(&auth, AuthScope::User, "transaction/search", &request)
            .await?;
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
        let request = RecordRequest {
            hex,
            reference_id,
            metadata: process_metadata(metadata),
        };
        let transaction: Transaction = self
            .post(&auth, AuthScope::User, "transaction/record", &request)
            .await?;
        if auth.debug() {
            tracing::info!("Transaction: {}", transaction.id);
        }
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_omits_absent_filters() {
        let body = CanonicalBody::from_value(&SearchRequest {
            conditions: None,
            metadata: None,
        })
        .unwrap();
        assert_eq!(body.as_str(), "{}");
    }

    #[test]
    fn test_record_request_layout() {
        let body = CanonicalBody::from_value(&RecordRequest {
            hex: "0100",
            reference_id: "draft-1",
            metadata: Metadata::new(),
        })
        .unwrap();
        assert_eq!(
            body.as_str(),
            r#"{"hex":"0100","metadata":{},"reference_id":"draft-1"}"#
        );
    }
}
