// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secure request processing.
//!
//! The processor opens a sealed envelope with the enclave's active keypair,
//! performs the upstream API call it describes, and packages the response
//! with an attestation token.
//!
//! ## Security
//!
//! - The recovered bundle lives only for the duration of one call and
//!   zeroizes on drop.
//! - Errors wrap their cause but never carry recovered credentials; upstream
//!   HTTP failures arrive here already stripped of URLs.

use std::sync::Arc;

use uuid::Uuid;

use super::attestation::{AttestationContext, Attestor, EncodedResultAttestor};
use super::keys::KeyStore;
use crate::envelope::{open, Envelope, EnvelopeError};
use crate::models::ProcessingResult;
use crate::providers::{ApiClient, ApiError};

/// Enclave-side façade over the envelope codec and the upstream API client.
pub struct SecureProcessor {
    api: Arc<dyn ApiClient>,
    attestor: Arc<dyn Attestor>,
    enclave_id: Uuid,
}

impl SecureProcessor {
    /// Processor with the default (placeholder) attestor.
    pub fn new(enclave_id: Uuid, api: Arc<dyn ApiClient>) -> Self {
        Self::with_attestor(enclave_id, api, Arc::new(EncodedResultAttestor))
    }

    /// Processor with an injected attestation capability.
    pub fn with_attestor(
        enclave_id: Uuid,
        api: Arc<dyn ApiClient>,
        attestor: Arc<dyn Attestor>,
    ) -> Self {
        Self {
            api,
            attestor,
            enclave_id,
        }
    }

    /// Open the envelope under the given keypair, call the upstream API it
    /// describes, and return the result with its attestation.
    pub async fn process(
        &self,
        keys: &KeyStore,
        envelope: &Envelope,
    ) -> Result<ProcessingResult, SecureProcessingError> {
        let bundle = open(keys.private_key(), envelope)?;
        tracing::debug!(enclave_id = %self.enclave_id, "envelope opened, calling upstream API");

        let result = self
            .api
            .fetch(&bundle.api_endpoint, &bundle.api_key, &bundle.parameters)
            .await?;
        drop(bundle);

        let context = AttestationContext::new(self.enclave_id);
        let attestation = self.attestor.attest(result.as_bytes(), &context);

        Ok(ProcessingResult {
            result,
            attestation,
        })
    }
}

/// Processing failure, wrapping its cause. Recovered plaintext never appears
/// in these payloads.
#[derive(Debug, thiserror::Error)]
pub enum SecureProcessingError {
    /// The envelope could not be decoded or opened.
    #[error("secure processing failed: {0}")]
    Decryption(#[from] EnvelopeError),

    /// The upstream API call failed.
    #[error("secure processing failed: {0}")]
    Api(#[from] ApiError),
}
