//! RSA-OAEP transport of one-time message keys.
//!
//! A message key is encrypted once per reader. OAEP uses SHA-256 for both
//! the label hash and MGF1, matching WebCrypto's `RSA-OAEP` with
//! `hash: SHA-256`.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use crate::keypair::{PrivateKey, PublicKeyPem};
use rand::rngs::OsRng;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

/// A message key encrypted to one reader's public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymmetricKeyEnvelope(Vec<u8>);

impl SymmetricKeyEnvelope {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        encoding::decode(text, "key envelope").map(Self)
    }
}

impl From<SymmetricKeyEnvelope> for String {
    fn from(envelope: SymmetricKeyEnvelope) -> Self {
        envelope.to_base64()
    }
}

impl TryFrom<String> for SymmetricKeyEnvelope {
    type Error = CryptoError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_base64(&text)
    }
}

/// Encrypts the raw key bytes to `recipient` with RSA-OAEP.
pub fn wrap_key(key: &SymmetricKey, recipient: &PublicKeyPem) -> CryptoResult<SymmetricKeyEnvelope> {
    let public = recipient.parse()?;

    public
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map(SymmetricKeyEnvelope)
        .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP wrap failed: {e}")))
}

/// Opens an envelope with the reader's private key.
pub fn unwrap_key(envelope: &SymmetricKeyEnvelope, private: &PrivateKey) -> CryptoResult<SymmetricKey> {
    let raw = Zeroizing::new(
        private
            .as_rsa()
            .decrypt(Oaep::new::<Sha256>(), &envelope.0)
            .map_err(|_| CryptoError::KeyUnwrapFailed)?,
    );
    SymmetricKey::from_slice(&raw).map_err(|_| CryptoError::KeyUnwrapFailed)
}
