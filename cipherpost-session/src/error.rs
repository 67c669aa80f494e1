use cipherpost_crypto::CryptoError;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The password did not unwrap the private key. The session stays locked
    /// and the caller may prompt again.
    #[error("invalid password")]
    InvalidPassword,

    /// The operator dismissed the password prompt. Abandon the operation.
    #[error("unlock cancelled")]
    Cancelled,

    /// The wrapped key could not be obtained from its source.
    #[error("wrapped key unavailable: {0}")]
    KeySource(String),

    #[error("no authenticated user")]
    NotSignedIn,

    #[error("crypto error: {0}")]
    Crypto(CryptoError),
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidPassword => SessionError::InvalidPassword,
            other => SessionError::Crypto(other),
        }
    }
}
