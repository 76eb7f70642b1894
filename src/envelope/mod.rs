// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Codec
//!
//! Hybrid encryption envelope carrying a consumer's secret bundle to the
//! enclave. The payload is encrypted with a fresh AES-256-GCM session; the
//! session's key material is wrapped under the enclave's RSA public key with
//! OAEP/SHA-256.
//!
//! ## Wire Format
//!
//! ```text
//! bytes[0..2]   big-endian u16: L, length of the wrapped key block
//! bytes[2..2+L] wrappedKey: RSA-OAEP ciphertext of aesKey(32)||iv(16)||tag(16)
//! bytes[2+L..]  ciphertext: AES-256-GCM output, tag detached (it travels
//!               inside the wrapped key block)
//! ```
//!
//! The length field is self-describing because the wrapped-key size varies
//! with the RSA modulus (256 bytes for 2048-bit keys, 512 for 4096-bit).
//! Envelopes are transported either as a `0x`-prefixed hex string or as
//! base64; [`Envelope::from_transport`] accepts both.
//!
//! ## Security
//!
//! - Opening verifies the GCM tag before any plaintext is released.
//! - Unwrap failures are reported uniformly ([`EnvelopeError::KeyUnwrapFailed`]
//!   carries no detail) so the error channel cannot act as a padding oracle.

mod open;
mod seal;

pub use open::open;
pub use seal::{seal, SealedRequest};

use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use alloy_primitives::hex;
use base64ct::{Base64, Encoding};

/// AES-256-GCM instantiated with the envelope's 16-byte IV.
pub(crate) type SessionCipher = AesGcm<Aes256, U16>;

/// AES-256 key length inside the wrapped key block.
pub const AES_KEY_LEN: usize = 32;

/// Initialization vector length. GCM is run with the full 16-byte IV rather
/// than the common 96-bit nonce; the wire format depends on it.
pub const IV_LEN: usize = 16;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Total length of the plaintext key block wrapped under RSA-OAEP.
pub const KEY_BLOCK_LEN: usize = AES_KEY_LEN + IV_LEN + TAG_LEN;

/// Width of the envelope's length prefix in bytes.
pub const LEN_PREFIX_LEN: usize = 2;

/// Maximum wrapped-key size representable by the length prefix.
pub const MAX_WRAPPED_KEY_LEN: usize = u16::MAX as usize;

/// A sealed, transport-ready envelope. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    wrapped_key: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Assemble an envelope from its two components, enforcing the length
    /// prefix bound.
    pub(crate) fn new(wrapped_key: Vec<u8>, ciphertext: Vec<u8>) -> Result<Self, EnvelopeError> {
        if wrapped_key.is_empty() {
            return Err(EnvelopeError::MalformedEnvelope(
                "wrapped key block is empty".to_string(),
            ));
        }
        if wrapped_key.len() > MAX_WRAPPED_KEY_LEN {
            return Err(EnvelopeError::EnvelopeTooLarge(wrapped_key.len()));
        }
        Ok(Self {
            wrapped_key,
            ciphertext,
        })
    }

    /// Parse an envelope from its binary wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < LEN_PREFIX_LEN {
            return Err(EnvelopeError::MalformedEnvelope(format!(
                "buffer of {} bytes is shorter than the length prefix",
                bytes.len()
            )));
        }
        let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if declared == 0 {
            return Err(EnvelopeError::MalformedEnvelope(
                "declared wrapped-key length is zero".to_string(),
            ));
        }
        let rest = &bytes[LEN_PREFIX_LEN..];
        if rest.len() < declared {
            return Err(EnvelopeError::MalformedEnvelope(format!(
                "declares {declared} wrapped-key bytes but only {} remain",
                rest.len()
            )));
        }
        Ok(Self {
            wrapped_key: rest[..declared].to_vec(),
            ciphertext: rest[declared..].to_vec(),
        })
    }

    /// Emit the binary wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(LEN_PREFIX_LEN + self.wrapped_key.len() + self.ciphertext.len());
        out.extend_from_slice(&(self.wrapped_key.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.wrapped_key);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Render as the `0x`-prefixed hex string the ledger stores.
    pub fn to_hex(&self) -> String {
        hex::encode_prefixed(self.to_bytes())
    }

    /// Parse from a hex string, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, EnvelopeError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| EnvelopeError::MalformedEnvelope(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Render as base64.
    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.to_bytes())
    }

    /// Parse from base64.
    pub fn from_base64(s: &str) -> Result<Self, EnvelopeError> {
        let bytes = Base64::decode_vec(s.trim())
            .map_err(|e| EnvelopeError::MalformedEnvelope(format!("invalid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Parse from either transport rendering: `0x`-prefixed hex or base64.
    pub fn from_transport(s: &str) -> Result<Self, EnvelopeError> {
        let s = s.trim();
        if s.starts_with("0x") || s.starts_with("0X") {
            Self::from_hex(s)
        } else {
            Self::from_base64(s)
        }
    }

    /// The RSA-OAEP ciphertext of the session key block.
    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    /// The AES-GCM ciphertext of the secret bundle.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Errors produced by the envelope codec.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// A cryptographic primitive failed during sealing.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The wrapped key block does not fit the length prefix.
    #[error("wrapped key of {0} bytes exceeds the envelope length field")]
    EnvelopeTooLarge(usize),

    /// The buffer does not parse as an envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The session key block could not be recovered. Reported uniformly for
    /// every unwrap failure; callers learn nothing about which step failed.
    #[error("failed to unwrap session key")]
    KeyUnwrapFailed,

    /// The ciphertext failed GCM authentication.
    #[error("envelope authentication failed")]
    AuthenticationFailed,

    /// The decrypted payload is not a well-formed secret bundle.
    #[error("malformed plaintext: {0}")]
    MalformedPlaintext(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope::new(vec![0xAA; 256], vec![0xBB; 40]).unwrap()
    }

    #[test]
    fn binary_round_trip() {
        let envelope = sample();
        let bytes = envelope.to_bytes();
        assert_eq!(&bytes[..2], &256u16.to_be_bytes());
        assert_eq!(bytes.len(), 2 + 256 + 40);

        let back = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn transport_round_trips() {
        let envelope = sample();

        let hex = envelope.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(Envelope::from_transport(&hex).unwrap(), envelope);

        let b64 = envelope.to_base64();
        assert!(!b64.starts_with("0x"));
        assert_eq!(Envelope::from_transport(&b64).unwrap(), envelope);
    }

    #[test]
    fn rejects_truncated_prefix() {
        let err = Envelope::from_bytes(&[0x01]).unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn rejects_zero_length_wrapped_key() {
        let err = Envelope::from_bytes(&[0x00, 0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn rejects_buffer_shorter_than_declared() {
        // Declares 256 wrapped-key bytes, provides 3.
        let mut bytes = 256u16.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::MalformedEnvelope(_)));
    }

    #[test]
    fn rejects_oversized_wrapped_key() {
        let err = Envelope::new(vec![0u8; MAX_WRAPPED_KEY_LEN + 1], Vec::new()).unwrap_err();
        assert!(matches!(err, EnvelopeError::EnvelopeTooLarge(n) if n == MAX_WRAPPED_KEY_LEN + 1));
    }

    #[test]
    fn garbage_transport_strings_fail() {
        assert!(matches!(
            Envelope::from_transport("0xzz"),
            Err(EnvelopeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            Envelope::from_transport("!!not-base64!!"),
            Err(EnvelopeError::MalformedEnvelope(_))
        ));
    }
}
