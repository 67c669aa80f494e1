//! Wires the API client, session and services together.

use crate::account::AccountService;
use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::messages::Mailbox;
use cipherpost_session::{PasswordPrompt, Session, SessionConfig, SessionKeyManager};
use std::sync::Arc;

/// One signed-in client: a shared API client and session behind the
/// account and mailbox services.
pub struct CipherpostClient {
    api: Arc<ApiClient>,
    session: Arc<Session>,
    account: AccountService,
    mailbox: Mailbox,
}

impl CipherpostClient {
    /// The session fetches wrapped keys from the API and asks `prompt` for
    /// the password when an operation finds it locked.
    pub fn new(
        config: ClientConfig,
        session_config: SessionConfig,
        prompt: Arc<dyn PasswordPrompt>,
    ) -> ClientResult<Self> {
        let api = Arc::new(ApiClient::new(config)?);
        let keys = SessionKeyManager::new(session_config, prompt, api.clone());
        let session = Arc::new(Session::new(keys));
        api.attach_session(&session);

        Ok(Self {
            account: AccountService::new(Arc::clone(&api), Arc::clone(&session)),
            mailbox: Mailbox::new(Arc::clone(&api), Arc::clone(&session)),
            api,
            session,
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn account(&self) -> &AccountService {
        &self.account
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}
