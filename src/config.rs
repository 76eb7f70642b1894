// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, policy constants, and the
//! [`EnclaveConfig`] struct consumed by the enclave lifecycle. Configuration
//! is loaded from the environment at startup; every value has a default.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KEY_ROTATION_INTERVAL_MS` | Keypair rotation cadence in milliseconds | `86400000` (24h) |
//! | `RSA_MODULUS_BITS` | RSA modulus size for generated keypairs | `2048` |
//! | `API_TIMEOUT_MS` | Upstream API request timeout in milliseconds | `5000` |

use std::env;
use std::time::Duration;

/// Environment variable name for the key rotation interval (milliseconds).
pub const KEY_ROTATION_INTERVAL_ENV: &str = "KEY_ROTATION_INTERVAL_MS";

/// Environment variable name for the RSA modulus size (bits).
pub const RSA_MODULUS_BITS_ENV: &str = "RSA_MODULUS_BITS";

/// Environment variable name for the upstream API timeout (milliseconds).
pub const API_TIMEOUT_ENV: &str = "API_TIMEOUT_MS";

/// Default rotation interval: 24 hours.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_millis(24 * 60 * 60 * 1000);

/// Default RSA modulus size for generated enclave keypairs.
pub const DEFAULT_MODULUS_BITS: usize = 2048;

/// Minimum acceptable RSA modulus size. Key generation and validation reject
/// anything below this floor.
pub const MIN_MODULUS_BITS: usize = 2048;

/// Modulus size recommended for production deployments.
pub const RECOMMENDED_MODULUS_BITS: usize = 4096;

/// Default upstream API request timeout: 5 seconds.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration for the enclave lifecycle.
#[derive(Debug, Clone)]
pub struct EnclaveConfig {
    /// How long a keypair may stay in force before processing triggers
    /// rotation. An interval of zero rotates before every request.
    pub rotation_interval: Duration,
    /// Modulus size for generated RSA keypairs. Must be at least
    /// [`MIN_MODULUS_BITS`]; production deployments should use
    /// [`RECOMMENDED_MODULUS_BITS`].
    pub modulus_bits: usize,
    /// Timeout applied to upstream API requests.
    pub api_timeout: Duration,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            modulus_bits: DEFAULT_MODULUS_BITS,
            api_timeout: DEFAULT_API_TIMEOUT,
        }
    }
}

impl EnclaveConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// unset or unparseable values.
    pub fn from_env() -> Self {
        let rotation_ms: u64 = env::var(KEY_ROTATION_INTERVAL_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ROTATION_INTERVAL.as_millis() as u64);

        let modulus_bits: usize = env::var(RSA_MODULUS_BITS_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MODULUS_BITS);

        let api_timeout_ms: u64 = env::var(API_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT.as_millis() as u64);

        Self {
            rotation_interval: Duration::from_millis(rotation_ms),
            modulus_bits,
            api_timeout: Duration::from_millis(api_timeout_ms),
        }
    }

    /// Override the rotation interval.
    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Override the modulus size.
    pub fn with_modulus_bits(mut self, bits: usize) -> Self {
        self.modulus_bits = bits;
        self
    }
}
