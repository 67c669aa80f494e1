//! Session key manager: the locked/unlocked private key state machine.
//!
//! The unwrapped private key is the only long-lived secret on the client.
//! It is cached here for the lifetime of the session, handed out as a
//! shared handle to concurrent decrypt/sign operations, and written only
//! by a successful unlock or by [`SessionKeyManager::lock`].

use crate::error::{SessionError, SessionResult};
use crate::prompt::{PasswordPrompt, PromptOutcome};
use crate::source::WrappedKeySource;
use cipherpost_crypto::{KdfParams, PrivateKey, WrappedPrivateKey, unwrap_private_key_with_params};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Locked,
    Unlocked,
}

/// Session key manager configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// KDF parameters of the wrapped key format.
    pub kdf: KdfParams,
    /// How long to wait for the operator before treating the prompt as
    /// cancelled. `None` waits indefinitely.
    pub prompt_timeout: Option<Duration>,
}

/// Holds the unlocked private key and runs the unlock workflow on demand.
pub struct SessionKeyManager {
    config: SessionConfig,
    key: RwLock<Option<Arc<PrivateKey>>>,
    /// Serializes password prompts so the operator sees at most one.
    prompt_gate: Mutex<()>,
    /// Bumped by every lock. An unlock that started before a lock must not
    /// repopulate the cache after it.
    epoch: AtomicU64,
    prompt: Arc<dyn PasswordPrompt>,
    source: Arc<dyn WrappedKeySource>,
}

impl SessionKeyManager {
    pub fn new(
        config: SessionConfig,
        prompt: Arc<dyn PasswordPrompt>,
        source: Arc<dyn WrappedKeySource>,
    ) -> Self {
        Self {
            config,
            key: RwLock::new(None),
            prompt_gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
            prompt,
            source,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        if self.key.read().await.is_some() {
            SessionState::Unlocked
        } else {
            SessionState::Locked
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    async fn cached(&self) -> Option<Arc<PrivateKey>> {
        self.key.read().await.clone()
    }

    /// Returns the private key, prompting for the password if locked.
    ///
    /// Concurrent callers queue behind a single prompt; once one of them
    /// unlocks the session the rest return the cached key without
    /// prompting again. Fails with [`SessionError::Cancelled`] when the
    /// operator dismisses the prompt (or it times out) and with
    /// [`SessionError::InvalidPassword`] when the password is wrong.
    pub async fn private_key(&self) -> SessionResult<Arc<PrivateKey>> {
        if let Some(key) = self.cached().await {
            return Ok(key);
        }

        let _gate = self.prompt_gate.lock().await;

        if let Some(key) = self.cached().await {
            debug!("session unlocked while waiting for prompt gate");
            return Ok(key);
        }

        debug!("session locked, requesting password");
        let outcome = match self.config.prompt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.prompt.request_password())
                .await
                .unwrap_or_else(|_| {
                    warn!("password prompt timed out after {limit:?}");
                    PromptOutcome::Cancelled
                }),
            None => self.prompt.request_password().await,
        };

        match outcome {
            PromptOutcome::Password(password) => self.unlock(&password).await,
            PromptOutcome::Cancelled => {
                info!("unlock cancelled by operator");
                Err(SessionError::Cancelled)
            }
        }
    }

    /// Fetches the wrapped key from the configured source and unlocks with it.
    pub async fn unlock(&self, password: &str) -> SessionResult<Arc<PrivateKey>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let blob = self.source.fetch_wrapped_key(password).await?;
        self.install(blob, password, epoch).await
    }

    /// Unlocks with a blob the caller already holds (e.g. from the login
    /// response).
    pub async fn unlock_with(
        &self,
        blob: WrappedPrivateKey,
        password: &str,
    ) -> SessionResult<Arc<PrivateKey>> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.install(blob, password, epoch).await
    }

    async fn install(
        &self,
        blob: WrappedPrivateKey,
        password: &str,
        epoch: u64,
    ) -> SessionResult<Arc<PrivateKey>> {
        let password = Zeroizing::new(password.to_owned());
        let params = self.config.kdf;

        let unwrapped = tokio::task::spawn_blocking(move || {
            unwrap_private_key_with_params(&blob, &password, &params)
        })
        .await
        .map_err(|e| SessionError::KeySource(format!("unwrap task failed: {e}")))?;

        let key = match unwrapped {
            Ok(key) => Arc::new(key),
            Err(e) => {
                let err = SessionError::from(e);
                warn!("unlock failed: {err}");
                return Err(err);
            }
        };

        let mut slot = self.key.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!("session was locked during unlock, discarding key");
            return Err(SessionError::Cancelled);
        }
        *slot = Some(Arc::clone(&key));
        info!("session unlocked");
        Ok(key)
    }

    /// Discards the cached key. Used for explicit lock and logout.
    pub async fn lock(&self) {
        let mut slot = self.key.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if slot.take().is_some() {
            info!("session locked");
        }
    }
}
