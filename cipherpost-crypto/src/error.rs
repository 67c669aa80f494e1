//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
///
/// Messages never carry key material, passwords or the position of a
/// failed authentication check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// No secure random source or primitive is available. Fatal.
    #[error("secure crypto primitives unavailable: {0}")]
    CryptoUnavailable(String),

    /// Authenticated decryption of a wrapped private key failed.
    #[error("invalid password")]
    InvalidPassword,

    /// Authenticated decryption of a payload failed.
    #[error("decryption failed (wrong key or tampered data)")]
    DecryptionFailed,

    /// An RSA key envelope could not be opened with the given private key.
    #[error("key unwrap failed (wrong key or corrupted envelope)")]
    KeyUnwrapFailed,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid encoding: {0}")]
    Encoding(String),
}
