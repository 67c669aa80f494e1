//! Account lifecycle: registration, login, logout, password reset and
//! two-factor setup.
//!
//! Registration and reset generate the identity key pair locally and upload
//! only the public key and the password-wrapped private key.

use crate::api_client::ApiClient;
use crate::error::ClientResult;
use crate::types::TotpSetup;
use cipherpost_crypto::{
    CryptoError, KdfParams, KeyPair, WrappedPrivateKey, generate_key_pair,
    wrap_private_key_with_params,
};
use cipherpost_session::{Identity, Session};
use std::sync::Arc;
use tracing::{info, warn};
use zeroize::Zeroizing;

pub struct AccountService {
    api: Arc<ApiClient>,
    session: Arc<Session>,
}

impl AccountService {
    pub fn new(api: Arc<ApiClient>, session: Arc<Session>) -> Self {
        Self { api, session }
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> ClientResult<()> {
        let (key_pair, wrapped) = self.new_identity_key(password).await?;
        self.api
            .register(username, email, password, &key_pair.public_key, &wrapped)
            .await
    }

    /// Signs in, loads the identity and unlocks the private key with the
    /// blob returned by the server.
    ///
    /// A blob that fails to unwrap leaves the session signed in but locked;
    /// the next key use prompts for the password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        totp_code: Option<&str>,
    ) -> ClientResult<Identity> {
        let login = self.api.login(email, password, totp_code).await?;
        let identity = self.api.me().await?;
        self.session.sign_in(identity.clone()).await;

        match login.encrypted_private_key {
            Some(blob) => {
                if let Err(e) = self.session.keys().unlock_with(blob, password).await {
                    warn!("login succeeded but key unlock failed: {e}");
                }
            }
            None => info!("login response carried no key blob, session stays locked"),
        }
        Ok(identity)
    }

    /// Locks the session, forgets the identity and revokes the tokens.
    pub async fn logout(&self) {
        self.session.end().await;
        self.api.logout().await;
    }

    pub async fn request_password_reset(&self, email: &str) -> ClientResult<()> {
        self.api.request_password_reset(email).await
    }

    /// Completes a reset with a brand-new key pair. Messages encrypted to
    /// the old key can no longer be opened.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> ClientResult<()> {
        let (key_pair, wrapped) = self.new_identity_key(new_password).await?;
        self.api
            .reset_password(token, new_password, &key_pair.public_key, &wrapped)
            .await?;
        self.session.keys().lock().await;
        info!("password reset with a new key pair");
        Ok(())
    }

    pub async fn initialize_totp(&self) -> ClientResult<TotpSetup> {
        self.api.initialize_totp().await
    }

    pub async fn enable_totp(&self, code: &str) -> ClientResult<()> {
        self.api.enable_totp(code).await
    }

    pub async fn disable_totp(&self, code: &str) -> ClientResult<()> {
        self.api.disable_totp(code).await
    }

    pub async fn current_user(&self) -> Option<Identity> {
        self.session.identity().await
    }

    /// Generates a key pair and wraps its private half. Both steps are slow,
    /// so they run off the async workers.
    async fn new_identity_key(&self, password: &str) -> ClientResult<(KeyPair, WrappedPrivateKey)> {
        let password = Zeroizing::new(password.to_owned());
        let kdf: KdfParams = self.session.keys().config().kdf;

        tokio::task::spawn_blocking(move || -> ClientResult<_> {
            let key_pair = generate_key_pair()?;
            let wrapped = wrap_private_key_with_params(&key_pair.private_key, &password, &kdf)?;
            Ok((key_pair, wrapped))
        })
        .await
        .map_err(|e| CryptoError::KeyGeneration(format!("key generation task failed: {e}")))?
    }
}
