//! Client error types.

use cipherpost_crypto::CryptoError;
use cipherpost_session::SessionError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the API client, the refresh gate and the message
/// pipeline.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The access token was rejected. The refresh gate handles this once.
    #[error("access token expired")]
    AuthExpired,

    /// The reader's key envelope is not present on the message.
    #[error("message {0} has no key envelope for this reader")]
    EnvelopeMissing(i64),

    #[error("user {user_id} is not a participant of message {message_id}")]
    NotParticipant { message_id: i64, user_id: i64 },

    #[error("invalid attachment {filename}: {reason}")]
    InvalidAttachment { filename: String, reason: String },

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// The operator dismissed the unlock prompt. The UI abandons the action.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Session(SessionError::Cancelled))
    }

    /// The password was wrong. The UI may prompt again.
    pub fn is_invalid_password(&self) -> bool {
        matches!(
            self,
            Self::Session(SessionError::InvalidPassword) | Self::Crypto(CryptoError::InvalidPassword)
        )
    }

    /// The server rejected the access token of a protected call. Transport
    /// maps every 401 to `AuthExpired`.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}
