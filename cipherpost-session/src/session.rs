//! The signed-in identity together with its key manager.

use crate::error::{SessionError, SessionResult};
use crate::manager::SessionKeyManager;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// The authenticated account, as reported by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// Process-wide session state. Nothing in it outlives the process.
pub struct Session {
    identity: RwLock<Option<Identity>>,
    keys: SessionKeyManager,
}

impl Session {
    pub fn new(keys: SessionKeyManager) -> Self {
        Self {
            identity: RwLock::new(None),
            keys,
        }
    }

    pub fn keys(&self) -> &SessionKeyManager {
        &self.keys
    }

    pub async fn sign_in(&self, identity: Identity) {
        info!("signed in as user {}", identity.user_id);
        *self.identity.write().await = Some(identity);
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    pub async fn current_user_id(&self) -> SessionResult<i64> {
        self.identity
            .read()
            .await
            .as_ref()
            .map(|id| id.user_id)
            .ok_or(SessionError::NotSignedIn)
    }

    /// Ends the session: drops the private key and forgets the identity.
    pub async fn end(&self) {
        self.keys.lock().await;
        if self.identity.write().await.take().is_some() {
            info!("signed out");
        }
    }
}
