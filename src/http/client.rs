//! Low-level HTTP client: `WireClient`.
//!
//! Sends an already-encoded [`CanonicalBody`] with its auth headers and hands
//! back the raw status and body text. Exactly one attempt per call; decoding
//! into operation envelopes happens in the transports.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::auth::{AuthHeaders, CanonicalBody};
use crate::error::TransportError;

/// Single-attempt HTTP executor shared by the transports.
#[derive(Clone)]
pub struct WireClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

/// Status and body of one response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireClient {
    /// Use `client` when given, otherwise build a pooled one. `timeout`
    /// applies to every request either way.
    pub fn new(
        base_url: &str,
        client: Option<Client>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = match client {
            Some(c) => c,
            None => Client::builder()
                .timeout(timeout)
                .pool_max_idle_per_host(10)
                .build()?,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post(
        &self,
        url: &str,
        body: &CanonicalBody,
        headers: &AuthHeaders,
    ) -> Result<WireResponse, TransportError> {
        self.do_request(Method::POST, url, body, headers).await
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &AuthHeaders,
    ) -> Result<WireResponse, TransportError> {
        self.do_request(Method::GET, url, &CanonicalBody::empty(), headers)
            .await
    }

    async fn do_request(
        &self,
        method: Method,
        url: &str,
        body: &CanonicalBody,
        headers: &AuthHeaders,
    ) -> Result<WireResponse, TransportError> {
        let mut req = self.client.request(method.clone(), url).timeout(self.timeout);

        for (name, value) in headers.iter() {
            req = req.header(name, value);
        }

        // Exactly the signed bytes.
        if !body.is_empty() {
            req = req
                .header(CONTENT_TYPE, "application/json")
                .body(body.as_bytes().to_vec());
        }

        tracing::debug!(
            method = %method,
            signed = headers.is_signed(),
            bytes = body.as_bytes().len(),
            "Sending request to {}",
            url
        );

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        tracing::debug!(status, "Response from {}", url);
        Ok(WireResponse { status, body })
    }
}

impl std::fmt::Debug for WireClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a successful body; any other status keeps the body verbatim.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        if !self.is_success() {
            return Err(self.status_error());
        }
        serde_json::from_str(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    pub fn status_error(&self) -> TransportError {
        TransportError::Status {
            status: self.status,
            body: self.body.clone(),
        }
    }
}
