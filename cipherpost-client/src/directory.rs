//! Public key lookup.

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::types::UserProfile;
use async_trait::async_trait;
use cipherpost_crypto::PublicKeyPem;

/// Resolves users to their published public keys.
#[async_trait]
pub trait PublicKeyDirectory: Send + Sync {
    async fn user_by_id(&self, user_id: i64) -> ClientResult<UserProfile>;

    async fn user_by_name(&self, username: &str) -> ClientResult<UserProfile>;

    async fn public_key(&self, user_id: i64) -> ClientResult<PublicKeyPem> {
        self.user_by_id(user_id).await?.require_public_key()
    }
}

impl UserProfile {
    /// The user's key, or `NotFound` if the profile carries none.
    pub fn require_public_key(self) -> ClientResult<PublicKeyPem> {
        self.public_key
            .ok_or_else(|| ClientError::NotFound(format!("public key of {}", self.username)))
    }

    /// Hex SHA-256 of the user's SPKI key, for out-of-band comparison.
    pub fn fingerprint(&self) -> ClientResult<String> {
        let key = self
            .public_key
            .as_ref()
            .ok_or_else(|| ClientError::NotFound(format!("public key of {}", self.username)))?;
        Ok(key.fingerprint()?)
    }
}

#[async_trait]
impl PublicKeyDirectory for ApiClient {
    async fn user_by_id(&self, user_id: i64) -> ClientResult<UserProfile> {
        self.user(user_id).await
    }

    async fn user_by_name(&self, username: &str) -> ClientResult<UserProfile> {
        self.user_by_username(username).await
    }
}
