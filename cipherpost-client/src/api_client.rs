//! HTTP client for the messaging API.
//!
//! Holds the bearer token pair, refreshes it on 401 through the
//! [`TokenRefreshGate`], and exposes one method per endpoint. Request and
//! response bodies carry only ciphertext, key envelopes, signatures and
//! wrapped keys.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::refresh_gate::{CallKind, TokenRefreshGate, TokenRefresher};
use crate::types::*;
use async_trait::async_trait;
use cipherpost_crypto::{PublicKeyPem, WrappedPrivateKey};
use cipherpost_session::{Identity, Session, SessionError, SessionResult, WrappedKeySource};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// State shared across API client clones.
#[derive(Default)]
struct AuthState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    /// Bumped on every successful refresh. Lets a caller that queued behind
    /// a concurrent refresh reuse its result.
    refresh_generation: u64,
}

/// HTTP client for the messaging API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    auth: Arc<RwLock<AuthState>>,
    /// Serializes refreshes. The server rotates refresh tokens, so two
    /// concurrent refreshes with the same token would fail the second.
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
    /// Ended when the refresh token is rejected. Weak because the session's
    /// key manager holds this client as its key source.
    session: Arc<OnceLock<Weak<Session>>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            auth: Arc::new(RwLock::new(AuthState::default())),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
            session: Arc::new(OnceLock::new()),
        })
    }

    /// Ties `session` to this client's tokens: once the server refuses to
    /// refresh them, the session is ended with them. Only the first
    /// attached session is kept.
    pub fn attach_session(&self, session: &Arc<Session>) {
        if self.session.set(Arc::downgrade(session)).is_err() {
            warn!("API client already has a session attached");
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sets auth tokens directly (e.g. after login).
    pub async fn set_tokens(&self, access_token: String, refresh_token: String) {
        let mut auth = self.auth.write().await;
        auth.access_token = Some(access_token);
        auth.refresh_token = Some(refresh_token);
    }

    pub async fn tokens(&self) -> Option<AuthTokens> {
        let auth = self.auth.read().await;
        Some(AuthTokens {
            access_token: auth.access_token.clone()?,
            refresh_token: auth.refresh_token.clone()?,
        })
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.access_token.is_some()
    }

    pub async fn clear_tokens(&self) {
        let mut auth = self.auth.write().await;
        auth.access_token = None;
        auth.refresh_token = None;
    }

    // ── Auth ──

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        public_key: &PublicKeyPem,
        encrypted_private_key: &WrappedPrivateKey,
    ) -> ClientResult<()> {
        let body = RegisterRequest {
            username,
            email,
            password,
            public_key,
            encrypted_private_key,
        };
        let resp = self.open_post("/auth/register", &body).await?;
        check(resp).await?;
        info!("registered account {username}");
        Ok(())
    }

    /// Exchanges credentials for a token pair and stores it.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        totp_code: Option<&str>,
    ) -> ClientResult<LoginResponse> {
        let body = LoginRequest {
            email,
            password,
            totp_code,
        };
        let resp = TokenRefreshGate::new(self)
            .call(CallKind::Login, || self.open_post("/auth/login", &body))
            .await;
        let resp = match resp {
            Err(ClientError::AuthExpired) => {
                return Err(ClientError::AuthFailed("invalid credentials".to_string()));
            }
            other => other?,
        };
        let login: LoginResponse = check(resp).await?.json().await?;

        self.set_tokens(login.access_token.clone(), login.refresh_token.clone())
            .await;
        Ok(login)
    }

    /// Rotates the token pair. Concurrent callers share one refresh.
    pub async fn refresh_access_token(&self) -> ClientResult<String> {
        let pre_gen = self.auth.read().await.refresh_generation;

        let _guard = self.refresh_lock.lock().await;

        {
            let auth = self.auth.read().await;
            if auth.refresh_generation > pre_gen {
                debug!("token already refreshed by a concurrent caller");
                return auth.access_token.clone().ok_or(ClientError::AuthRequired);
            }
        }

        let refresh_token = self
            .auth
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(ClientError::AuthRequired)?;

        let body = serde_json::json!({ "refresh_token": refresh_token });
        let resp = TokenRefreshGate::new(self)
            .call(CallKind::Refresh, || self.open_post("/auth/refresh", &body))
            .await;

        let resp = match resp {
            Ok(resp) if resp.status() == StatusCode::FORBIDDEN => None,
            Ok(resp) => Some(resp),
            Err(ClientError::AuthExpired) => None,
            Err(e) => return Err(e),
        };
        let Some(resp) = resp else {
            // Refresh token expired or revoked. Drop the stale pair and
            // lock the key with it.
            self.clear_tokens().await;
            if let Some(session) = self.session.get().and_then(Weak::upgrade) {
                warn!("refresh token rejected, ending session");
                session.end().await;
            }
            return Err(ClientError::AuthFailed(
                "token refresh failed: session expired, re-authentication required".to_string(),
            ));
        };

        let resp: RefreshResponse = resp
            .error_for_status()
            .map_err(|e| ClientError::AuthFailed(format!("token refresh failed: {e}")))?
            .json()
            .await?;

        let mut auth = self.auth.write().await;
        auth.access_token = Some(resp.access_token.clone());
        if let Some(rotated) = resp.refresh_token {
            auth.refresh_token = Some(rotated);
        }
        auth.refresh_generation += 1;
        info!("access token refreshed");

        Ok(resp.access_token)
    }

    /// Revokes the refresh token server-side, then forgets both tokens.
    /// The server call is best effort.
    pub async fn logout(&self) {
        let refresh_token = self.auth.read().await.refresh_token.clone();
        if let Some(refresh_token) = refresh_token {
            let sent = self
                .client
                .post(self.config.endpoint("/auth/logout"))
                .query(&[("refresh_token", refresh_token.as_str())])
                .send()
                .await;
            if let Err(e) = sent {
                warn!("server logout failed: {e}");
            }
        }
        self.clear_tokens().await;
    }

    pub async fn me(&self) -> ClientResult<Identity> {
        self.get_json("/auth/me").await
    }

    /// Fetches the wrapped private key. The server re-checks the password.
    pub async fn fetch_private_key(&self, password: &str) -> ClientResult<WrappedPrivateKey> {
        let resp = self
            .auth_post(
                "/auth/get-private-key",
                &serde_json::json!({ "password": password }),
            )
            .await?;
        if matches!(resp.status(), StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN) {
            return Err(SessionError::InvalidPassword.into());
        }
        let body: PrivateKeyResponse = check(resp).await?.json().await?;
        Ok(body.encrypted_private_key)
    }

    pub async fn request_password_reset(&self, email: &str) -> ClientResult<()> {
        let resp = self
            .open_post(
                "/auth/request-password-reset",
                &serde_json::json!({ "email": email }),
            )
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        public_key: &PublicKeyPem,
        encrypted_private_key: &WrappedPrivateKey,
    ) -> ClientResult<()> {
        let body = ResetPasswordRequest {
            token,
            new_password,
            public_key,
            encrypted_private_key,
        };
        let resp = self
            .open_post("/auth/reset-password", &body)
            .await?;
        check(resp).await?;
        Ok(())
    }

    // ── Two-factor ──

    /// Starts TOTP setup for the signed-in account.
    pub async fn initialize_totp(&self) -> ClientResult<TotpSetup> {
        let resp = self
            .auth_post("/totp/initialize", &serde_json::json!({}))
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Turns TOTP on once `code` proves the authenticator is set up.
    pub async fn enable_totp(&self, code: &str) -> ClientResult<()> {
        self.post_totp_code("/totp/enable", code).await
    }

    pub async fn disable_totp(&self, code: &str) -> ClientResult<()> {
        self.post_totp_code("/totp/disable", code).await
    }

    /// The server answers a wrong code with 401. If the token pair survived
    /// the refresh-and-retry, the 401 was about the code.
    async fn post_totp_code(&self, path: &str, code: &str) -> ClientResult<()> {
        let body = TotpCodeRequest { totp_code: code };
        match self.auth_post(path, &body).await {
            Ok(resp) => {
                check(resp).await?;
                info!("{path} accepted");
                Ok(())
            }
            Err(ClientError::AuthExpired) if self.is_authenticated().await => {
                Err(ClientError::AuthFailed("invalid TOTP code".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    // ── Users ──

    pub async fn users(&self) -> ClientResult<Vec<UserProfile>> {
        self.get_json("/users").await
    }

    pub async fn user(&self, id: i64) -> ClientResult<UserProfile> {
        self.get_json(&format!("/users/{id}")).await
    }

    pub async fn user_by_username(&self, username: &str) -> ClientResult<UserProfile> {
        let url = self
            .config
            .endpoint_with_segment("/users/by-username", username)?;
        self.get_json_at(url.as_str()).await
    }

    // ── Messages ──

    pub async fn send_message(&self, req: &SendMessageRequest) -> ClientResult<SendMessageResponse> {
        let resp = self.auth_post("/messages/send", req).await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn inbox(&self) -> ClientResult<Vec<Message>> {
        self.get_json("/messages/inbox").await
    }

    pub async fn sent(&self) -> ClientResult<Vec<Message>> {
        self.get_json("/messages/sent").await
    }

    pub async fn attachment(&self, id: i64) -> ClientResult<EncryptedAttachment> {
        self.get_json(&format!("/messages/attachments/{id}")).await
    }

    pub async fn mark_as_read(&self, message_id: i64) -> ClientResult<()> {
        let resp = self
            .auth_post(&format!("/messages/{message_id}/read"), &serde_json::json!({}))
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn delete_message(&self, message_id: i64) -> ClientResult<()> {
        let resp = self.auth_delete(&format!("/messages/{message_id}")).await?;
        check(resp).await?;
        Ok(())
    }

    // ── Transport ──

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.get_json_at(&self.config.endpoint(path)).await
    }

    async fn get_json_at<T: DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        let resp = self.auth_get(url).await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn access_token(&self) -> ClientResult<String> {
        self.auth
            .read()
            .await
            .access_token
            .clone()
            .ok_or(ClientError::AuthRequired)
    }

    /// Makes an authenticated GET request, retrying once on 401.
    async fn auth_get(&self, url: &str) -> ClientResult<Response> {
        TokenRefreshGate::new(self)
            .call(CallKind::Protected, || async move {
                let token = self.access_token().await?;
                let resp = self.client.get(url).bearer_auth(&token).send().await?;
                reject_unauthorized(resp, "GET", url)
            })
            .await
    }

    /// Makes an authenticated POST request, retrying once on 401.
    async fn auth_post<B>(&self, path: &str, body: &B) -> ClientResult<Response>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.config.endpoint(path);
        let url = url.as_str();
        TokenRefreshGate::new(self)
            .call(CallKind::Protected, || async move {
                let token = self.access_token().await?;
                let resp = self
                    .client
                    .post(url)
                    .bearer_auth(&token)
                    .json(body)
                    .send()
                    .await?;
                reject_unauthorized(resp, "POST", path)
            })
            .await
    }

    /// Makes an authenticated DELETE request, retrying once on 401.
    async fn auth_delete(&self, path: &str) -> ClientResult<Response> {
        let url = self.config.endpoint(path);
        let url = url.as_str();
        TokenRefreshGate::new(self)
            .call(CallKind::Protected, || async move {
                let token = self.access_token().await?;
                let resp = self.client.delete(url).bearer_auth(&token).send().await?;
                reject_unauthorized(resp, "DELETE", path)
            })
            .await
    }

    /// POST without a bearer token. A 401 here is a credential rejection.
    async fn open_post<B>(&self, path: &str, body: &B) -> ClientResult<Response>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.config.endpoint(path);
        let resp = self.client.post(&url).json(body).send().await?;
        reject_unauthorized(resp, "POST", path)
    }
}

fn reject_unauthorized(resp: Response, method: &str, path: &str) -> ClientResult<Response> {
    if resp.status() == StatusCode::UNAUTHORIZED {
        debug!("401 on {method} {path}");
        return Err(ClientError::AuthExpired);
    }
    Ok(resp)
}

/// Maps non-success statuses to errors, keeping the server's detail text.
async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().path().to_string();
    let detail = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(url));
    }
    Err(ClientError::Api(format!("{status} on {url}: {detail}")))
}

#[async_trait]
impl TokenRefresher for ApiClient {
    async fn refresh(&self) -> ClientResult<()> {
        self.refresh_access_token().await.map(|_| ())
    }
}

#[async_trait]
impl WrappedKeySource for ApiClient {
    async fn fetch_wrapped_key(&self, password: &str) -> SessionResult<WrappedPrivateKey> {
        self.fetch_private_key(password).await.map_err(|e| match e {
            ClientError::Session(inner) => inner,
            other => SessionError::KeySource(other.to_string()),
        })
    }
}
