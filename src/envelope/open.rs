// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Opening: recover a secret bundle from a sealed envelope with the
//! enclave's private key.
//!
//! ## Security
//!
//! - Every unwrap failure maps to the same [`EnvelopeError::KeyUnwrapFailed`]
//!   with no detail, so callers cannot distinguish padding errors from
//!   malformed key blocks.
//! - The GCM tag is verified before any plaintext leaves this module.
//! - Recovered key material and intermediate plaintext buffers are zeroized
//!   on every exit path.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{Envelope, EnvelopeError, SessionCipher, AES_KEY_LEN, IV_LEN, KEY_BLOCK_LEN};
use crate::enclave::keys::PrivateKeyHandle;
use crate::models::SecretBundle;

/// Open a sealed envelope and recover the original secret bundle.
///
/// The returned bundle is scoped to the immediate processing call: it
/// zeroizes on drop and must not be persisted, cached, or logged in full.
pub fn open(handle: PrivateKeyHandle<'_>, envelope: &Envelope) -> Result<SecretBundle, EnvelopeError> {
    let components = unwrap_key_block(handle.key, envelope.wrapped_key())?;
    let (aes_key, rest) = components.split_at(AES_KEY_LEN);
    let (iv, tag) = rest.split_at(IV_LEN);

    let mut buffer = Zeroizing::new(envelope.ciphertext().to_vec());
    let cipher = SessionCipher::new(GenericArray::from_slice(aes_key));
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            b"",
            buffer.as_mut_slice(),
            GenericArray::from_slice(tag),
        )
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    serde_json::from_slice(&buffer).map_err(|e| EnvelopeError::MalformedPlaintext(e.to_string()))
}

/// RSA-OAEP unwrap of the session key block. Uniform failure reporting: a
/// padding mismatch and a wrong-sized block are indistinguishable to the
/// caller.
fn unwrap_key_block(
    key: &RsaPrivateKey,
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    let components = key
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| EnvelopeError::KeyUnwrapFailed)?;
    if components.len() != KEY_BLOCK_LEN {
        return Err(EnvelopeError::KeyUnwrapFailed);
    }
    Ok(components)
}
