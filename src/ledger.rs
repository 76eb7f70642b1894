// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External ledger boundary.
//!
//! The registry/payment/verification contract is an opaque collaborator: the
//! core only needs (a) somewhere to publish the enclave's public key, (b) a
//! channel for opaque byte blobs, and (c) a result-hash correlation. This
//! module defines exactly that surface and nothing of the contract's
//! bookkeeping.

use alloy_primitives::{hex, keccak256, B256};
use async_trait::async_trait;
use serde::Serialize;

use crate::models::ProcessingResult;

/// Publication failure. Rotation treats it as fatal for the attempted swap:
/// the previous keypair stays fully in force.
#[derive(Debug, thiserror::Error)]
#[error("key publication failed: {0}")]
pub struct PublishError(pub String);

/// Publishes the enclave's current public key to the ledger.
///
/// The lifecycle calls this inside its rotation critical section, so from
/// the ledger's point of view the published key flips atomically from the
/// old value to the new one.
#[async_trait]
pub trait KeyPublisher: Send + Sync {
    async fn publish_key(&self, public_key_pem: &str) -> Result<(), PublishError>;
}

/// Publisher for standalone and test deployments: records a fingerprint of
/// the published key in the log. Key material itself is public, but logs
/// stay compact and grep-able with the fingerprint.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl KeyPublisher for LogPublisher {
    async fn publish_key(&self, public_key_pem: &str) -> Result<(), PublishError> {
        let fingerprint = keccak256(public_key_pem.as_bytes());
        tracing::info!(
            fingerprint = %hex::encode_prefixed(&fingerprint[..8]),
            "enclave public key published"
        );
        Ok(())
    }
}

/// Correlation hash the caller submits alongside an attestation:
/// keccak256 over the serialized result.
pub fn result_hash(result: &str) -> B256 {
    keccak256(result.as_bytes())
}

/// Payload of `submitVerification(requestId, resultHash, proof, attestation)`.
///
/// `proof` is an opaque blob consumed by the external verifier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSubmission {
    pub request_id: B256,
    pub result_hash: B256,
    pub proof: Vec<u8>,
    pub attestation: String,
}

impl VerificationSubmission {
    /// Assemble a submission for a finished processing call.
    pub fn for_result(request_id: B256, outcome: &ProcessingResult, proof: Vec<u8>) -> Self {
        Self {
            request_id,
            result_hash: result_hash(&outcome.result),
            proof,
            attestation: outcome.attestation.clone(),
        }
    }
}
