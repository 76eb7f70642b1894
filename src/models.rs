// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Shared Data Models
//!
//! Types that cross module boundaries: the plaintext [`SecretBundle`] that
//! travels inside a sealed envelope, and the [`ProcessingResult`] the enclave
//! hands back to its caller.
//!
//! ## Security
//!
//! - `SecretBundle` zeroizes its fields on drop and redacts the credential in
//!   its `Debug` output. It must never be persisted or logged in full.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Plaintext payload of a sealed envelope.
///
/// Serialized as camelCase JSON on the wire:
/// `{"apiKey", "apiEndpoint", "parameters", "timestamp"}`.
/// Exists only inside the sealing and opening operations; the enclave scopes
/// it to a single processing call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct SecretBundle {
    /// Consumer's credential for the upstream API.
    pub api_key: String,
    /// Upstream API endpoint URL.
    pub api_endpoint: String,
    /// Request parameters, opaque to the pipeline (typically a JSON object).
    pub parameters: String,
    /// Wall-clock milliseconds since the Unix epoch, captured at seal time.
    pub timestamp: i64,
}

impl SecretBundle {
    /// Assemble a bundle stamped with the current wall clock.
    pub fn new(
        api_key: impl Into<String>,
        api_endpoint: impl Into<String>,
        parameters: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_endpoint: api_endpoint.into(),
            parameters: parameters.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

// Redact the credential; lengths are enough for diagnostics.
impl std::fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBundle")
            .field("api_key", &format!("[redacted; {} bytes]", self.api_key.len()))
            .field("api_endpoint", &self.api_endpoint)
            .field("parameters", &self.parameters)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Outcome of one secure processing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Canonical JSON serialization of the upstream API response.
    pub result: String,
    /// Attestation token over the result. The default implementation is a
    /// development placeholder; see `enclave::attestation`.
    pub attestation: String,
}
