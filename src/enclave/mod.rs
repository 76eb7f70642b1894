// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave-side components.
//!
//! This module provides everything that runs inside the oracle operator's
//! trusted execution environment:
//! - **keys**: the active RSA keypair and its validation rules
//! - **lifecycle**: key rotation and request admission
//! - **processor**: envelope opening plus the upstream API call
//! - **attestation**: the attestation capability and its placeholder default

pub mod attestation;
pub mod keys;
pub mod lifecycle;
pub mod processor;

pub use attestation::{AttestationContext, Attestor, EncodedResultAttestor};
pub use keys::{KeyStore, KeyStoreError, PrivateKeyHandle};
pub use lifecycle::{EnclaveError, EnclaveLifecycle};
pub use processor::{SecureProcessingError, SecureProcessor};
