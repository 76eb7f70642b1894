// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave lifecycle: key ownership, rotation, and request admission.
//!
//! An [`EnclaveLifecycle`] is an explicitly constructed value: callers own
//! it and pass it around; there is no process-wide singleton. It holds the
//! single active [`KeyStore`] behind a `tokio` read-write lock:
//!
//! - any number of `process` calls run concurrently under read guards
//!   against one stable keypair,
//! - rotation takes the write guard, so it excludes new and in-flight
//!   processing until the swap (generate, validate, publish, then commit)
//!   completes.
//!
//! Holding the write lock is the `Rotating` state of the state machine; no
//! request can observe a half-rotated keypair.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::attestation::{Attestor, EncodedResultAttestor};
use super::keys::{KeyStore, KeyStoreError};
use super::processor::{SecureProcessingError, SecureProcessor};
use crate::config::EnclaveConfig;
use crate::envelope::Envelope;
use crate::ledger::{KeyPublisher, PublishError};
use crate::models::ProcessingResult;
use crate::providers::ApiClient;

struct EnclaveState {
    keys: KeyStore,
    last_rotation: DateTime<Utc>,
}

/// Owns the active keypair and serializes rotation against processing.
pub struct EnclaveLifecycle {
    state: Arc<RwLock<EnclaveState>>,
    processor: SecureProcessor,
    publisher: Arc<dyn KeyPublisher>,
    config: EnclaveConfig,
    enclave_id: Uuid,
}

impl EnclaveLifecycle {
    /// Construct with the default (placeholder) attestor: generates and
    /// publishes the initial keypair.
    pub async fn new(
        config: EnclaveConfig,
        api: Arc<dyn ApiClient>,
        publisher: Arc<dyn KeyPublisher>,
    ) -> Result<Self, EnclaveError> {
        Self::with_attestor(config, api, publisher, Arc::new(EncodedResultAttestor)).await
    }

    /// Construct with an injected attestation capability.
    pub async fn with_attestor(
        config: EnclaveConfig,
        api: Arc<dyn ApiClient>,
        publisher: Arc<dyn KeyPublisher>,
        attestor: Arc<dyn Attestor>,
    ) -> Result<Self, EnclaveError> {
        let keys = Self::generate_keys(config.modulus_bits).await?;
        publisher.publish_key(keys.public_key_pem()).await?;

        let enclave_id = Uuid::new_v4();
        tracing::info!(
            %enclave_id,
            modulus_bits = keys.modulus_bits(),
            "enclave lifecycle initialized"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(EnclaveState {
                keys,
                last_rotation: Utc::now(),
            })),
            processor: SecureProcessor::with_attestor(enclave_id, api, attestor),
            publisher,
            config,
            enclave_id,
        })
    }

    /// Process a transport-encoded envelope (`0x`-prefixed hex or base64).
    ///
    /// Rotates first when the active pair has outlived the configured
    /// interval; otherwise runs under a read guard so concurrent calls do
    /// not serialize each other.
    pub async fn process(&self, payload: &str) -> Result<ProcessingResult, EnclaveError> {
        let envelope =
            Envelope::from_transport(payload).map_err(|e| EnclaveError::Processing(e.into()))?;

        loop {
            {
                let state = self.state.read().await;
                if !self.rotation_due(state.last_rotation) {
                    return Ok(self.processor.process(&state.keys, &envelope).await?);
                }
            }

            let mut state = self.state.write().await;
            if self.rotation_due(state.last_rotation) {
                self.rotate_locked(&mut state).await?;
                // Serve this request against the pair just installed; a zero
                // interval must not re-trigger for the same call.
                let state = state.downgrade();
                return Ok(self.processor.process(&state.keys, &envelope).await?);
            }
            // Another writer rotated between our read and write; retry the
            // read path.
        }
    }

    /// Non-waiting variant of [`process`](Self::process): rejected with
    /// [`EnclaveError::RotationInProgress`] whenever rotation holds the lock
    /// or is due.
    pub async fn try_process(&self, payload: &str) -> Result<ProcessingResult, EnclaveError> {
        let envelope =
            Envelope::from_transport(payload).map_err(|e| EnclaveError::Processing(e.into()))?;

        let state = self
            .state
            .try_read()
            .map_err(|_| EnclaveError::RotationInProgress)?;
        if self.rotation_due(state.last_rotation) {
            return Err(EnclaveError::RotationInProgress);
        }
        Ok(self.processor.process(&state.keys, &envelope).await?)
    }

    /// Rotate on demand, regardless of the interval.
    pub async fn rotate(&self) -> Result<(), EnclaveError> {
        let mut state = self.state.write().await;
        self.rotate_locked(&mut state).await
    }

    /// The SPKI PEM public key currently in force.
    pub async fn current_public_key(&self) -> String {
        self.state.read().await.keys.public_key_pem().to_string()
    }

    /// When the active pair was installed.
    pub async fn last_rotated_at(&self) -> DateTime<Utc> {
        self.state.read().await.last_rotation
    }

    /// This enclave's identity.
    pub fn enclave_id(&self) -> Uuid {
        self.enclave_id
    }

    fn rotation_due(&self, last_rotation: DateTime<Utc>) -> bool {
        Utc::now()
            .signed_duration_since(last_rotation)
            .to_std()
            .map(|elapsed| elapsed >= self.config.rotation_interval)
            .unwrap_or(false)
    }

    /// Swap in a fresh keypair. Caller holds the write lock. Generation or
    /// publication failure leaves the previous pair fully in force.
    async fn rotate_locked(&self, state: &mut EnclaveState) -> Result<(), EnclaveError> {
        let fresh = Self::generate_keys(self.config.modulus_bits).await?;
        self.publisher.publish_key(fresh.public_key_pem()).await?;

        // Commit point: the superseded private key drops here.
        state.keys = fresh;
        state.last_rotation = Utc::now();
        tracing::info!(enclave_id = %self.enclave_id, "enclave keypair rotated");
        Ok(())
    }

    /// RSA generation is CPU-bound; keep it off the async workers.
    async fn generate_keys(modulus_bits: usize) -> Result<KeyStore, KeyStoreError> {
        tokio::task::spawn_blocking(move || KeyStore::generate(modulus_bits))
            .await
            .map_err(|e| KeyStoreError::KeyGeneration(format!("key generation task failed: {e}")))?
    }
}

/// Lifecycle-level failures.
#[derive(Debug, thiserror::Error)]
pub enum EnclaveError {
    /// A rotation holds (or needs) the keypair lock; the request was not
    /// served.
    #[error("key rotation in progress")]
    RotationInProgress,

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Processing(#[from] SecureProcessingError),

    #[error(transparent)]
    Publication(#[from] PublishError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnclaveConfig;
    use crate::envelope::{seal, EnvelopeError};
    use crate::ledger::LogPublisher;
    use crate::providers::testing::FixedResponseClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    const RESPONSE: &str = r#"{"price":42}"#;

    fn fixed_api() -> Arc<dyn ApiClient> {
        Arc::new(FixedResponseClient {
            response: RESPONSE.to_string(),
        })
    }

    async fn sealed_payload(lifecycle: &EnclaveLifecycle) -> String {
        let public_key = lifecycle.current_public_key().await;
        seal(&public_key, "k1", "https://api.example.com/btc", r#"{"currency":"USD"}"#)
            .expect("seal test envelope")
            .envelope
            .to_hex()
    }

    /// Records every published PEM.
    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl KeyPublisher for RecordingPublisher {
        async fn publish_key(&self, public_key_pem: &str) -> Result<(), PublishError> {
            self.published.lock().unwrap().push(public_key_pem.to_string());
            Ok(())
        }
    }

    /// Succeeds until `fail` is set.
    #[derive(Default)]
    struct FlakyPublisher {
        fail: AtomicBool,
    }

    #[async_trait]
    impl KeyPublisher for FlakyPublisher {
        async fn publish_key(&self, _public_key_pem: &str) -> Result<(), PublishError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(PublishError("ledger unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Passes the construction-time publish through, then parks inside
    /// `publish_key` until released, keeping the rotation write lock held.
    struct BlockingPublisher {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    impl BlockingPublisher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl KeyPublisher for BlockingPublisher {
        async fn publish_key(&self, _public_key_pem: &str) -> Result<(), PublishError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(());
            }
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn initial_key_is_published() {
        let publisher = Arc::new(RecordingPublisher::default());
        let lifecycle =
            EnclaveLifecycle::new(EnclaveConfig::default(), fixed_api(), publisher.clone())
                .await
                .unwrap();

        let published = publisher.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0], lifecycle.current_public_key().await);
    }

    #[tokio::test]
    async fn processes_under_a_stable_keypair() {
        let lifecycle = EnclaveLifecycle::new(
            EnclaveConfig::default(),
            fixed_api(),
            Arc::new(LogPublisher),
        )
        .await
        .unwrap();

        let key_before = lifecycle.current_public_key().await;
        let payload = sealed_payload(&lifecycle).await;

        let first = lifecycle.process(&payload).await.unwrap();
        let second = lifecycle.try_process(&payload).await.unwrap();

        assert_eq!(first.result, RESPONSE);
        assert_eq!(second.result, RESPONSE);
        assert_eq!(lifecycle.current_public_key().await, key_before);
    }

    #[tokio::test]
    async fn concurrent_processing_shares_one_keypair() {
        let lifecycle = Arc::new(
            EnclaveLifecycle::new(
                EnclaveConfig::default(),
                fixed_api(),
                Arc::new(LogPublisher),
            )
            .await
            .unwrap(),
        );
        let payload = sealed_payload(&lifecycle).await;

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let lifecycle = lifecycle.clone();
                let payload = payload.clone();
                tokio::spawn(async move { lifecycle.process(&payload).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().result, RESPONSE);
        }
    }

    #[tokio::test]
    async fn zero_interval_rotates_and_discards_old_keys() {
        let lifecycle = EnclaveLifecycle::new(
            EnclaveConfig::default().with_rotation_interval(Duration::ZERO),
            fixed_api(),
            Arc::new(LogPublisher),
        )
        .await
        .unwrap();

        let key_one = lifecycle.current_public_key().await;
        let payload = sealed_payload(&lifecycle).await;

        // Rotation precedes processing, so an envelope sealed under the
        // superseded key can no longer be opened.
        let err = lifecycle.process(&payload).await.unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Processing(SecureProcessingError::Decryption(
                EnvelopeError::KeyUnwrapFailed
            ))
        ));

        let key_two = lifecycle.current_public_key().await;
        assert_ne!(key_one, key_two);

        let _ = lifecycle.process(&payload).await.unwrap_err();
        let key_three = lifecycle.current_public_key().await;
        assert_ne!(key_two, key_three);
    }

    #[tokio::test]
    async fn rotation_rejects_try_process() {
        let publisher = Arc::new(BlockingPublisher::new());
        let lifecycle = Arc::new(
            EnclaveLifecycle::new(EnclaveConfig::default(), fixed_api(), publisher.clone())
                .await
                .unwrap(),
        );
        let payload = sealed_payload(&lifecycle).await;

        let rotator = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.rotate().await })
        };

        // Rotation is parked inside publish_key, write lock held.
        publisher.entered.notified().await;
        let err = lifecycle.try_process(&payload).await.unwrap_err();
        assert!(matches!(err, EnclaveError::RotationInProgress));

        publisher.release.notify_one();
        rotator.await.unwrap().unwrap();

        // The swap completed: the old envelope no longer opens.
        let err = lifecycle.process(&payload).await.unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Processing(SecureProcessingError::Decryption(
                EnvelopeError::KeyUnwrapFailed
            ))
        ));
    }

    #[tokio::test]
    async fn failed_publication_keeps_old_key_in_force() {
        let publisher = Arc::new(FlakyPublisher::default());
        let lifecycle =
            EnclaveLifecycle::new(EnclaveConfig::default(), fixed_api(), publisher.clone())
                .await
                .unwrap();

        let key_before = lifecycle.current_public_key().await;
        let rotated_at = lifecycle.last_rotated_at().await;
        let payload = sealed_payload(&lifecycle).await;

        publisher.fail.store(true, Ordering::SeqCst);
        let err = lifecycle.rotate().await.unwrap_err();
        assert!(matches!(err, EnclaveError::Publication(_)));

        // Old pair still fully in force.
        assert_eq!(lifecycle.current_public_key().await, key_before);
        assert_eq!(lifecycle.last_rotated_at().await, rotated_at);
        assert_eq!(lifecycle.process(&payload).await.unwrap().result, RESPONSE);
    }

    #[tokio::test]
    async fn malformed_payload_is_reported_before_any_key_use() {
        let lifecycle = EnclaveLifecycle::new(
            EnclaveConfig::default(),
            fixed_api(),
            Arc::new(LogPublisher),
        )
        .await
        .unwrap();

        let err = lifecycle.process("0x00").await.unwrap_err();
        assert!(matches!(
            err,
            EnclaveError::Processing(SecureProcessingError::Decryption(
                EnvelopeError::MalformedEnvelope(_)
            ))
        ));
    }
}
