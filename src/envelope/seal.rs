// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealing: wrap a secret bundle into a transportable envelope under the
//! enclave's published public key, and derive the ledger fingerprints that
//! accompany it.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use alloy_primitives::{hex, keccak256, B256};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{Envelope, EnvelopeError, SessionCipher, AES_KEY_LEN, IV_LEN, MAX_WRAPPED_KEY_LEN};
use crate::models::SecretBundle;

/// Output of a sealing operation: the envelope plus the two ledger hashes.
#[derive(Debug, Clone)]
pub struct SealedRequest {
    /// The transport-ready envelope.
    pub envelope: Envelope,
    /// keccak256 over `endpoint || parameters`. Independent of the credential
    /// and the seal timestamp, so the ledger gets a stable routing key.
    pub metadata: B256,
    /// keccak256 binding the envelope bytes to the metadata, so a transport
    /// layer cannot pair one request's envelope with another's metadata
    /// undetected.
    pub request_hash: B256,
}

/// Seal `{apiKey, apiEndpoint, parameters}` under the enclave's public key.
///
/// A fresh AES-256 session key and 16-byte IV are drawn from the OS CSPRNG
/// for every call; the serialized bundle (stamped with the current wall
/// clock) is GCM-encrypted, and `key || iv || tag` is wrapped under
/// RSA-OAEP/SHA-256.
pub fn seal(
    public_key_pem: &str,
    api_key: &str,
    api_endpoint: &str,
    parameters: &str,
) -> Result<SealedRequest, EnvelopeError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| EnvelopeError::Encryption(format!("invalid public key: {e}")))?;

    // The wrapped key is exactly one RSA block; check the bound before any
    // secret material is touched.
    let wrapped_len = public_key.size();
    if wrapped_len > MAX_WRAPPED_KEY_LEN {
        return Err(EnvelopeError::EnvelopeTooLarge(wrapped_len));
    }

    let bundle = SecretBundle::new(api_key, api_endpoint, parameters);
    let mut payload = Zeroizing::new(
        serde_json::to_vec(&bundle)
            .map_err(|e| EnvelopeError::Encryption(format!("bundle serialization: {e}")))?,
    );

    let mut aes_key = Zeroizing::new([0u8; AES_KEY_LEN]);
    OsRng.fill_bytes(&mut *aes_key);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = SessionCipher::new(GenericArray::from_slice(&*aes_key));
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", payload.as_mut_slice())
        .map_err(|_| EnvelopeError::Encryption("symmetric encryption failed".to_string()))?;
    // `payload` now holds ciphertext, not plaintext.
    let ciphertext = std::mem::take(&mut *payload);

    let mut key_block = Zeroizing::new(Vec::with_capacity(super::KEY_BLOCK_LEN));
    key_block.extend_from_slice(&*aes_key);
    key_block.extend_from_slice(&iv);
    key_block.extend_from_slice(&tag);

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key_block)
        .map_err(|e| EnvelopeError::Encryption(format!("session key wrap: {e}")))?;

    let envelope = Envelope::new(wrapped_key, ciphertext)?;

    let mut preimage = Vec::with_capacity(api_endpoint.len() + parameters.len());
    preimage.extend_from_slice(api_endpoint.as_bytes());
    preimage.extend_from_slice(parameters.as_bytes());
    let metadata = keccak256(&preimage);

    let request_hash = bind_request(&envelope, metadata);

    Ok(SealedRequest {
        envelope,
        metadata,
        request_hash,
    })
}

/// Bind an envelope to its metadata. The metadata enters the hash in its
/// `0x`-prefixed hex rendering, the exact string the ledger stores.
fn bind_request(envelope: &Envelope, metadata: B256) -> B256 {
    let envelope_bytes = envelope.to_bytes();
    let metadata_hex = hex::encode_prefixed(metadata);
    let mut binding = Vec::with_capacity(envelope_bytes.len() + metadata_hex.len());
    binding.extend_from_slice(&envelope_bytes);
    binding.extend_from_slice(metadata_hex.as_bytes());
    keccak256(&binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::keys::test_support;
    use crate::envelope::LEN_PREFIX_LEN;

    const API_KEY: &str = "k1";
    const ENDPOINT: &str = "https://api.example.com/btc";
    const PARAMS: &str = r#"{"currency":"USD"}"#;

    #[test]
    fn wrapped_key_fills_one_rsa_block() {
        let keys = test_support::shared();
        let sealed = seal(keys.public_key_pem(), API_KEY, ENDPOINT, PARAMS).unwrap();

        // 2048-bit modulus: the OAEP ciphertext is 256 bytes and the length
        // prefix declares it.
        let bytes = sealed.envelope.to_bytes();
        assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), 256);
        assert_eq!(sealed.envelope.wrapped_key().len(), 256);
        // GCM without padding: ciphertext length equals the bundle JSON length.
        assert_eq!(
            bytes.len(),
            LEN_PREFIX_LEN + 256 + sealed.envelope.ciphertext().len()
        );
    }

    #[test]
    fn identical_inputs_produce_distinct_envelopes() {
        let keys = test_support::shared();
        let one = seal(keys.public_key_pem(), API_KEY, ENDPOINT, PARAMS).unwrap();
        let two = seal(keys.public_key_pem(), API_KEY, ENDPOINT, PARAMS).unwrap();

        // Fresh session key and IV every call.
        assert_ne!(one.envelope, two.envelope);
        assert_ne!(one.envelope.wrapped_key(), two.envelope.wrapped_key());
    }

    #[test]
    fn metadata_ignores_credential_and_time() {
        let keys = test_support::shared();
        let one = seal(keys.public_key_pem(), "key-a", ENDPOINT, PARAMS).unwrap();
        let two = seal(keys.public_key_pem(), "key-b", ENDPOINT, PARAMS).unwrap();
        assert_eq!(one.metadata, two.metadata);

        let expected = {
            let mut preimage = Vec::new();
            preimage.extend_from_slice(ENDPOINT.as_bytes());
            preimage.extend_from_slice(PARAMS.as_bytes());
            keccak256(&preimage)
        };
        assert_eq!(one.metadata, expected);
    }

    #[test]
    fn metadata_tracks_endpoint_and_parameters() {
        let keys = test_support::shared();
        let base = seal(keys.public_key_pem(), API_KEY, ENDPOINT, PARAMS).unwrap();
        let other_params =
            seal(keys.public_key_pem(), API_KEY, ENDPOINT, r#"{"currency":"EUR"}"#).unwrap();
        let other_endpoint =
            seal(keys.public_key_pem(), API_KEY, "https://api.example.com/eth", PARAMS).unwrap();

        assert_ne!(base.metadata, other_params.metadata);
        assert_ne!(base.metadata, other_endpoint.metadata);
    }

    #[test]
    fn request_hash_binds_envelope_to_metadata() {
        let keys = test_support::shared();
        let sealed = seal(keys.public_key_pem(), API_KEY, ENDPOINT, PARAMS).unwrap();

        let mut binding = sealed.envelope.to_bytes();
        binding.extend_from_slice(hex::encode_prefixed(sealed.metadata).as_bytes());
        assert_eq!(sealed.request_hash, keccak256(&binding));

        // A different envelope under the same metadata binds differently.
        let other = seal(keys.public_key_pem(), API_KEY, ENDPOINT, PARAMS).unwrap();
        assert_eq!(other.metadata, sealed.metadata);
        assert_ne!(other.request_hash, sealed.request_hash);
    }

    #[test]
    fn rejects_garbage_public_key() {
        let err = seal("not a pem", API_KEY, ENDPOINT, PARAMS).unwrap_err();
        assert!(matches!(err, EnvelopeError::Encryption(_)));
    }
}
