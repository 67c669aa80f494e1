//! Where the wrapped private key comes from during an unlock.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use cipherpost_crypto::WrappedPrivateKey;
use tokio::sync::RwLock;

/// Supplies the password-wrapped private key blob.
///
/// The password is passed through because the server re-authenticates
/// before releasing the blob. Implementations must not retain it.
#[async_trait]
pub trait WrappedKeySource: Send + Sync {
    async fn fetch_wrapped_key(&self, password: &str) -> SessionResult<WrappedPrivateKey>;
}

/// In-memory source holding the blob received at login or registration.
#[derive(Default)]
pub struct StoredWrappedKey {
    blob: RwLock<Option<WrappedPrivateKey>>,
}

impl StoredWrappedKey {
    pub fn new(blob: WrappedPrivateKey) -> Self {
        Self {
            blob: RwLock::new(Some(blob)),
        }
    }

    pub async fn replace(&self, blob: WrappedPrivateKey) {
        *self.blob.write().await = Some(blob);
    }

    pub async fn clear(&self) {
        *self.blob.write().await = None;
    }
}

#[async_trait]
impl WrappedKeySource for StoredWrappedKey {
    async fn fetch_wrapped_key(&self, _password: &str) -> SessionResult<WrappedPrivateKey> {
        self.blob
            .read()
            .await
            .clone()
            .ok_or_else(|| SessionError::KeySource("no wrapped key stored".to_string()))
    }
}
