//! RSA identity key pairs.
//!
//! The public half travels as SPKI PEM text. The private half stays in
//! memory as a [`PrivateKey`] handle and only leaves the process wrapped
//! (see [`crate::keywrap`]).

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// RSA modulus size for identity keys.
pub const MODULUS_BITS: usize = 2048;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// An armored SPKI public key, as published in the user directory.
///
/// Holding one does not mean it parses: keys come from the server, so
/// every consumer goes through [`PublicKeyPem::parse`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKeyPem(String);

impl PublicKeyPem {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decodes the DER body, tolerating missing line breaks and surrounding
    /// whitespace.
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        let body = self
            .0
            .trim()
            .strip_prefix(PEM_HEADER)
            .and_then(|rest| rest.strip_suffix(PEM_FOOTER))
            .ok_or_else(|| {
                CryptoError::InvalidKey("public key is not an SPKI PEM block".to_string())
            })?;
        let body: String = body.split_whitespace().collect();
        encoding::decode(&body, "public key")
    }

    /// Parses the armored key into an RSA public key.
    pub fn parse(&self) -> CryptoResult<RsaPublicKey> {
        let der = self.to_der()?;
        RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::InvalidKey(format!("SPKI decode: {e}")))
    }

    /// Hex SHA-256 of the SPKI DER, for out-of-band key comparison.
    pub fn fingerprint(&self) -> CryptoResult<String> {
        Ok(hex::encode(Sha256::digest(self.to_der()?)))
    }
}

impl From<String> for PublicKeyPem {
    fn from(pem: String) -> Self {
        Self(pem)
    }
}

impl From<&str> for PublicKeyPem {
    fn from(pem: &str) -> Self {
        Self(pem.to_string())
    }
}

impl fmt::Debug for PublicKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fingerprint() {
            Ok(fp) => write!(f, "PublicKeyPem({})", &fp[..16]),
            Err(_) => f.write_str("PublicKeyPem(<malformed>)"),
        }
    }
}

impl fmt::Display for PublicKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to an unwrapped RSA private key. Key material is zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Exports PKCS#8 DER, the plaintext of a wrapped key.
    pub fn to_pkcs8_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(format!("PKCS#8 encode: {e}")))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Imports PKCS#8 DER.
    pub fn from_pkcs8_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(format!("PKCS#8 decode: {e}")))
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.0)
    }

    /// Armored public half of this key.
    pub fn public_key_pem(&self) -> CryptoResult<PublicKeyPem> {
        export_public_pem(&self.public_key())
    }

    pub(crate) fn as_rsa(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A freshly generated identity key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKeyPem,
    pub private_key: PrivateKey,
}

fn export_public_pem(key: &RsaPublicKey) -> CryptoResult<PublicKeyPem> {
    key.to_public_key_pem(LineEnding::LF)
        .map(PublicKeyPem)
        .map_err(|e| CryptoError::InvalidKey(format!("SPKI encode: {e}")))
}

/// Generates an RSA-2048 key pair (e = 65537).
///
/// CPU-heavy: async callers should run it on a blocking thread.
pub fn generate_key_pair() -> CryptoResult<KeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, MODULUS_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_key = export_public_pem(&RsaPublicKey::from(&private))?;

    Ok(KeyPair {
        public_key,
        private_key: PrivateKey(private),
    })
}
