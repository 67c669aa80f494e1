//! Symmetric keys, salts and password-based key derivation.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// PBKDF2 salt size in bytes.
pub const SALT_SIZE: usize = 16;

/// Fills `buf` from the operating system's CSPRNG.
///
/// Fails with [`CryptoError::CryptoUnavailable`] instead of panicking when
/// no entropy source exists.
pub fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::CryptoUnavailable(format!("OS random source: {e}")))
}

/// A 256-bit AES-GCM key. Used for one-time message keys and for keys
/// derived from a password. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Generates a fresh random AES-256 key.
pub fn generate_symmetric_key() -> CryptoResult<SymmetricKey> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Random salt for password-based key derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> CryptoResult<Self> {
        let mut bytes = [0u8; SALT_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Parameters for PBKDF2-HMAC-SHA256.
///
/// The iteration count is not recorded in wrapped blobs, so both sides of
/// a wrap/unwrap must agree on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    /// Iteration count of the deployed wrap format.
    pub const DEFAULT_ITERATIONS: u32 = 100_000;

    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }
}

/// Derives an AES-256 key from a password with PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<SymmetricKey> {
    if params.iterations == 0 {
        return Err(CryptoError::InvalidKey(
            "PBKDF2 iteration count must be non-zero".to_string(),
        ));
    }

    let mut out = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), params.iterations, &mut out);
    let key = SymmetricKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}
