//! AES-256-GCM payload encryption.
//!
//! Wire format of a [`CipherPayload`]: `iv (12 bytes) || ciphertext || tag (16 bytes)`,
//! base64-encoded. The same format carries message bodies and attachment bytes.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{SymmetricKey, fill_random};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// An AEAD-encrypted payload with its nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CipherPayload {
    pub iv: [u8; NONCE_SIZE],
    /// Ciphertext with the GCM tag appended.
    pub ciphertext: Vec<u8>,
}

impl CipherPayload {
    /// Concatenates `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Splits `iv || ciphertext`. Anything too short to hold a nonce and a
    /// tag cannot authenticate and is rejected as a failed decryption.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let (iv, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(iv);
        Ok(Self {
            iv: nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(self.to_bytes())
    }

    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        Self::from_bytes(&encoding::decode(text, "cipher payload")?)
    }

    /// Length of the plaintext this payload decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

impl From<CipherPayload> for String {
    fn from(payload: CipherPayload) -> Self {
        payload.to_base64()
    }
}

impl TryFrom<String> for CipherPayload {
    type Error = CryptoError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_base64(&text)
    }
}

fn cipher_for(key: &SymmetricKey) -> CryptoResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("AES-256-GCM key: {e}")))
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<CipherPayload> {
    let cipher = cipher_for(key)?;

    let mut iv = [0u8; NONCE_SIZE];
    fill_random(&mut iv)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

    Ok(CipherPayload { iv, ciphertext })
}

/// Decrypts a payload. Any authentication failure is [`CryptoError::DecryptionFailed`].
pub fn decrypt(key: &SymmetricKey, payload: &CipherPayload) -> CryptoResult<Vec<u8>> {
    if payload.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }
    let cipher = cipher_for(key)?;
    cipher
        .decrypt(Nonce::from_slice(&payload.iv), payload.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Encrypts UTF-8 text.
pub fn encrypt_string(key: &SymmetricKey, plaintext: &str) -> CryptoResult<CipherPayload> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypts a payload that must hold UTF-8 text.
pub fn decrypt_string(key: &SymmetricKey, payload: &CipherPayload) -> CryptoResult<String> {
    let bytes = decrypt(key, payload)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::DecryptionFailed)
}
