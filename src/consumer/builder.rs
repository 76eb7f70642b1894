// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consumer façade: seal a request and render it in the ledger's formats.
//!
//! The builder holds the enclave's published public key (validated once at
//! construction) and turns `{apiKey, endpoint, parameters}` into the
//! hex-encoded triple the ledger's `submitRequest` expects. It makes no
//! cryptographic decisions of its own; everything is delegated to the
//! envelope codec.

use alloy_primitives::hex;
use serde::Serialize;

use crate::enclave::keys::{KeyStore, KeyStoreError};
use crate::envelope::{seal, EnvelopeError};

/// Ledger-ready rendering of a sealed request: all fields `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRequest {
    /// Envelope bytes, the `submitRequest` byte-array argument.
    pub envelope: String,
    /// 32-byte metadata fingerprint over `endpoint || parameters`.
    pub metadata: String,
    /// keccak binding of envelope and metadata.
    pub request_hash: String,
}

/// Builds confidential requests against one published enclave key.
#[derive(Debug)]
pub struct RequestBuilder {
    public_key_pem: String,
}

impl RequestBuilder {
    /// Accept the enclave's published SPKI PEM, validating it first.
    pub fn new(public_key_pem: impl Into<String>) -> Result<Self, KeyStoreError> {
        let public_key_pem = public_key_pem.into();
        KeyStore::validate_public_pem(&public_key_pem)?;
        Ok(Self { public_key_pem })
    }

    /// Seal the request and render it for ledger submission.
    pub fn build(
        &self,
        api_key: &str,
        api_endpoint: &str,
        parameters: &str,
    ) -> Result<EncryptedRequest, EnvelopeError> {
        let sealed = seal(&self.public_key_pem, api_key, api_endpoint, parameters)?;
        Ok(EncryptedRequest {
            envelope: sealed.envelope.to_hex(),
            metadata: hex::encode_prefixed(sealed.metadata),
            request_hash: hex::encode_prefixed(sealed.request_hash),
        })
    }

    /// The public key this builder seals under.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }
}
