// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attestation capability.
//!
//! An [`Attestor`] turns a processing result into a token that downstream
//! verifiers can check. A production implementation must produce a signed
//! statement over `{enclave_id, request_id, result_hash, timestamp}` from a
//! trusted measurement root (hardware quote or threshold signature).
//!
//! [`EncodedResultAttestor`], the default, is a development placeholder: it
//! encodes the result itself and proves nothing about enclave origin. Do not
//! deploy it.

use alloy_primitives::B256;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What a real attestation must bind to, beyond the result bytes.
#[derive(Debug, Clone)]
pub struct AttestationContext {
    /// Identity of the enclave producing the result.
    pub enclave_id: Uuid,
    /// Ledger request this result answers, when known at attestation time.
    pub request_id: Option<B256>,
    /// When the attestation was produced.
    pub timestamp: DateTime<Utc>,
}

impl AttestationContext {
    /// Context for the given enclave, stamped with the current wall clock.
    pub fn new(enclave_id: Uuid) -> Self {
        Self {
            enclave_id,
            request_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the ledger request identifier.
    pub fn with_request_id(mut self, request_id: B256) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Produces and checks attestation tokens.
pub trait Attestor: Send + Sync {
    /// Attest to a processing result.
    fn attest(&self, result: &[u8], context: &AttestationContext) -> String;

    /// Check that a token is well-formed for this attestor.
    fn verify(&self, token: &str) -> bool;
}

/// Placeholder attestor: the token is a base64 encoding of the result.
///
/// This matches what the surrounding oracle node currently expects but does
/// NOT prove enclave origin; `verify` only checks the encoding. Replace with
/// a measurement-rooted implementation before production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncodedResultAttestor;

impl Attestor for EncodedResultAttestor {
    fn attest(&self, result: &[u8], _context: &AttestationContext) -> String {
        Base64::encode_string(result)
    }

    fn verify(&self, token: &str) -> bool {
        Base64::decode_vec(token).is_ok()
    }
}
