//! Password wrapping of the identity private key.
//!
//! Wire format (base64 of the concatenation):
//!
//! ```text
//! salt (16) || iv (12) || AES-256-GCM(PKCS#8 DER) || tag (16)
//! ```
//!
//! The wrapping key is PBKDF2-HMAC-SHA256 over the password and the salt.
//! The server stores the blob verbatim and never sees the password-derived
//! key.

use crate::cipher::{self, CipherPayload, NONCE_SIZE, TAG_SIZE};
use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KdfParams, SALT_SIZE, Salt, derive_key};
use crate::keypair::PrivateKey;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A private key encrypted under a password-derived key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WrappedPrivateKey {
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; NONCE_SIZE],
    /// Encrypted PKCS#8 DER with the GCM tag appended.
    pub ciphertext: Vec<u8>,
}

impl WrappedPrivateKey {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Splits a blob at the fixed offsets.
    ///
    /// A truncated blob cannot pass authentication, so it is reported the
    /// same way as a wrong password.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidPassword);
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        let mut iv = [0u8; NONCE_SIZE];
        iv.copy_from_slice(&bytes[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);
        Ok(Self {
            salt,
            iv,
            ciphertext: bytes[SALT_SIZE + NONCE_SIZE..].to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(self.to_bytes())
    }

    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        Self::from_bytes(&encoding::decode(text, "wrapped private key")?)
    }
}

impl From<WrappedPrivateKey> for String {
    fn from(wrapped: WrappedPrivateKey) -> Self {
        wrapped.to_base64()
    }
}

impl TryFrom<String> for WrappedPrivateKey {
    type Error = CryptoError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_base64(&text)
    }
}

/// Wraps a private key under `password` with the default KDF parameters.
pub fn wrap_private_key(key: &PrivateKey, password: &str) -> CryptoResult<WrappedPrivateKey> {
    wrap_private_key_with_params(key, password, &KdfParams::default())
}

/// Wraps a private key under `password`. A fresh salt and IV are drawn per call.
pub fn wrap_private_key_with_params(
    key: &PrivateKey,
    password: &str,
    params: &KdfParams,
) -> CryptoResult<WrappedPrivateKey> {
    let salt = Salt::random()?;
    let kek = derive_key(password, &salt, params)?;
    let der = key.to_pkcs8_der()?;
    let sealed = cipher::encrypt(&kek, &der)?;

    Ok(WrappedPrivateKey {
        salt: *salt.as_bytes(),
        iv: sealed.iv,
        ciphertext: sealed.ciphertext,
    })
}

/// Unwraps a private key with the default KDF parameters.
pub fn unwrap_private_key(wrapped: &WrappedPrivateKey, password: &str) -> CryptoResult<PrivateKey> {
    unwrap_private_key_with_params(wrapped, password, &KdfParams::default())
}

/// Unwraps a private key. Any authentication failure is
/// [`CryptoError::InvalidPassword`].
pub fn unwrap_private_key_with_params(
    wrapped: &WrappedPrivateKey,
    password: &str,
    params: &KdfParams,
) -> CryptoResult<PrivateKey> {
    let kek = derive_key(password, &Salt::from_bytes(wrapped.salt), params)?;
    let payload = CipherPayload {
        iv: wrapped.iv,
        ciphertext: wrapped.ciphertext.clone(),
    };
    let der = Zeroizing::new(
        cipher::decrypt(&kek, &payload).map_err(|_| CryptoError::InvalidPassword)?,
    );
    PrivateKey::from_pkcs8_der(&der)
}
