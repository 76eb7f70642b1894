// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave keypair management.
//!
//! A [`KeyStore`] owns exactly one RSA keypair: the SPKI PEM public half is
//! published through the ledger, the PKCS#8 private half never leaves the
//! enclave. Every constructed or imported pair is validated before it is
//! trusted.
//!
//! ## Security
//!
//! - Private key material is only reachable through [`PrivateKeyHandle`],
//!   an opaque capability consumed by the envelope codec's open operation.
//!   The handle exposes nothing, serializes nowhere, and debugs redacted.
//! - Superseded keypairs are dropped on rotation, never retained.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::config::MIN_MODULUS_BITS;

/// PEM label of an SPKI public key.
const PUBLIC_KEY_TAG: &str = "PUBLIC KEY";

/// PEM label of a PKCS#8 private key.
const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

/// The enclave's active RSA keypair.
pub struct KeyStore {
    public_key_pem: String,
    private_key: RsaPrivateKey,
    modulus_bits: usize,
    created_at: DateTime<Utc>,
}

impl KeyStore {
    /// Generate a fresh keypair with the given modulus size.
    ///
    /// The pair is normalized through PEM export and re-validated before it
    /// is returned. Sizes below [`MIN_MODULUS_BITS`] are rejected.
    pub fn generate(modulus_bits: usize) -> Result<Self, KeyStoreError> {
        if modulus_bits < MIN_MODULUS_BITS {
            return Err(KeyStoreError::KeyGeneration(format!(
                "modulus of {modulus_bits} bits is below the {MIN_MODULUS_BITS}-bit floor"
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, modulus_bits)
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyStoreError::KeyGeneration(format!("public key encoding: {e}")))?;
        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyStoreError::KeyGeneration(format!("private key encoding: {e}")))?;

        Self::validate(&public_key_pem, &private_key_pem)?;

        Ok(Self {
            public_key_pem,
            modulus_bits: private_key.size() * 8,
            private_key,
            created_at: Utc::now(),
        })
    }

    /// Import a keypair from its PEM encodings, validating it first.
    pub fn from_pem_pair(public_pem: &str, private_pem: &str) -> Result<Self, KeyStoreError> {
        Self::validate(public_pem, private_pem)?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("private key: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("public key: {e}")))?;

        // Normalize the published encoding regardless of the input armor.
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("public key encoding: {e}")))?;

        Ok(Self {
            public_key_pem,
            modulus_bits: private_key.size() * 8,
            private_key,
            created_at: Utc::now(),
        })
    }

    /// Validate a PEM keypair: well-formed armor with the expected labels,
    /// parseable RSA keys of at least [`MIN_MODULUS_BITS`], matching halves.
    pub fn validate(public_pem: &str, private_pem: &str) -> Result<(), KeyStoreError> {
        Self::validate_public_pem(public_pem)?;

        let private_block = pem::parse(private_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("private key: {e}")))?;
        if private_block.tag() != PRIVATE_KEY_TAG {
            return Err(KeyStoreError::InvalidKeyFormat(format!(
                "private key has PEM label {:?}, expected PKCS#8 {PRIVATE_KEY_TAG:?}",
                private_block.tag()
            )));
        }

        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("private key: {e}")))?;
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("public key: {e}")))?;

        let private_bits = private_key.size() * 8;
        if private_bits < MIN_MODULUS_BITS {
            return Err(KeyStoreError::InvalidKeyFormat(format!(
                "{private_bits}-bit modulus is below the {MIN_MODULUS_BITS}-bit floor"
            )));
        }
        if private_key.n() != public_key.n() || private_key.e() != public_key.e() {
            return Err(KeyStoreError::InvalidKeyFormat(
                "public key does not match the private key".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate a standalone SPKI public key PEM (the consumer-side check).
    pub fn validate_public_pem(public_pem: &str) -> Result<(), KeyStoreError> {
        let block = pem::parse(public_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("public key: {e}")))?;
        if block.tag() != PUBLIC_KEY_TAG {
            return Err(KeyStoreError::InvalidKeyFormat(format!(
                "public key has PEM label {:?}, expected SPKI {PUBLIC_KEY_TAG:?}",
                block.tag()
            )));
        }
        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| KeyStoreError::InvalidKeyFormat(format!("public key: {e}")))?;
        let bits = public_key.size() * 8;
        if bits < MIN_MODULUS_BITS {
            return Err(KeyStoreError::InvalidKeyFormat(format!(
                "{bits}-bit modulus is below the {MIN_MODULUS_BITS}-bit floor"
            )));
        }
        Ok(())
    }

    /// The SPKI PEM public key currently in force.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Capability for the envelope codec's open operation.
    pub fn private_key(&self) -> PrivateKeyHandle<'_> {
        PrivateKeyHandle {
            key: &self.private_key,
        }
    }

    /// Modulus size of the active pair, in bits.
    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    /// When this pair was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("modulus_bits", &self.modulus_bits)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Opaque capability over the enclave's private key.
///
/// Only the envelope codec's open operation can use it; no caller can
/// extract, serialize, or log key material through it.
pub struct PrivateKeyHandle<'a> {
    pub(crate) key: &'a RsaPrivateKey,
}

impl std::fmt::Debug for PrivateKeyHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKeyHandle([redacted])")
    }
}

/// Errors from keypair generation, import, and validation.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared test keypairs. RSA generation is expensive; tests that do not
    //! exercise generation itself reuse these.

    use super::KeyStore;
    use std::sync::OnceLock;

    static SHARED: OnceLock<KeyStore> = OnceLock::new();
    static ALTERNATE: OnceLock<KeyStore> = OnceLock::new();

    pub(crate) fn shared() -> &'static KeyStore {
        SHARED.get_or_init(|| KeyStore::generate(2048).expect("generate shared test keypair"))
    }

    pub(crate) fn alternate() -> &'static KeyStore {
        ALTERNATE.get_or_init(|| KeyStore::generate(2048).expect("generate alternate test keypair"))
    }
}
