// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the upstream APIs that sealed requests point at.
//!
//! The enclave processor talks to upstream services only through the
//! [`ApiClient`] trait, so deployments can swap transports and tests can
//! inject canned responses. [`HttpApiClient`] is the production
//! implementation: GET with the credential in an `X-API-Key` header.
//!
//! ## Security
//!
//! - Error values never echo the request URL or the credential; reqwest
//!   errors are stripped with `without_url`.
//! - Retry policy stays out of this core; callers own it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Header carrying the consumer's credential to the upstream API.
const API_KEY_HEADER: &str = "X-API-Key";

/// Upstream API collaborator used by the secure processor.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Perform the call described by a recovered secret bundle and return
    /// the canonical JSON serialization of the response.
    async fn fetch(&self, endpoint: &str, api_key: &str, parameters: &str)
        -> Result<String, ApiError>;
}

/// Production `ApiClient` over reqwest/rustls.
pub struct HttpApiClient {
    client: reqwest::Client,
}

impl HttpApiClient {
    /// Build a client with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch(
        &self,
        endpoint: &str,
        api_key: &str,
        parameters: &str,
    ) -> Result<String, ApiError> {
        let mut url = Url::parse(endpoint).map_err(|e| ApiError::InvalidEndpoint(e.to_string()))?;

        // Flat JSON-object parameters become query pairs; anything else is
        // sent without a query.
        if !parameters.trim().is_empty() {
            match serde_json::from_str::<serde_json::Map<String, Value>>(parameters) {
                Ok(map) => {
                    let mut pairs = url.query_pairs_mut();
                    for (key, value) in &map {
                        match value {
                            Value::String(s) => pairs.append_pair(key, s),
                            other => pairs.append_pair(key, &other.to_string()),
                        };
                    }
                }
                Err(e) => {
                    tracing::debug!("request parameters are not a JSON object: {e}");
                }
            }
        }

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.without_url().to_string()))?;
        Ok(canonicalize_response(&body))
    }
}

/// Canonical JSON rendering of an upstream response body. Non-JSON bodies
/// are wrapped as a JSON string.
fn canonicalize_response(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => Value::String(body.to_string()).to_string(),
    }
}

/// Errors from the upstream API collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("API request failed: {0}")]
    Request(String),

    #[error("API responded with status {0}")]
    Status(u16),
}
