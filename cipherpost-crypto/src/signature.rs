//! RSA-PSS signatures over plaintext message bodies.
//!
//! SHA-256 with a 32-byte salt, the same parameters as WebCrypto's
//! `RSA-PSS` with `saltLength: 32`. The caller hands over the message
//! bytes; hashing happens inside the scheme.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::keypair::{PrivateKey, PublicKeyPem};
use rand::rngs::OsRng;
use rsa::pss::{Signature as PssSignature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// PSS salt length in bytes (equal to the SHA-256 output size).
pub const SALT_LEN: usize = 32;

/// A detached signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(Vec<u8>);

impl Signature {
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
        encoding::decode(text, "signature").map(Self)
    }
}

impl From<Signature> for String {
    fn from(signature: Signature) -> Self {
        signature.to_base64()
    }
}

impl TryFrom<String> for Signature {
    type Error = CryptoError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_base64(&text)
    }
}

/// Signs `message` with RSA-PSS.
pub fn sign(message: &[u8], private: &PrivateKey) -> CryptoResult<Signature> {
    // `SigningKey::new` uses a salt as long as the digest output.
    let signing_key = SigningKey::<Sha256>::new(private.as_rsa().clone());
    let signature = signing_key
        .try_sign_with_rng(&mut OsRng, message)
        .map_err(|e| CryptoError::Encryption(format!("RSA-PSS sign failed: {e}")))?;
    Ok(Signature(signature.to_vec()))
}

/// Verifies a signature. Returns `false` for a bad signature and for any
/// malformed signature or public key; it never errors.
pub fn verify(message: &[u8], signature: &Signature, public: &PublicKeyPem) -> bool {
    let Ok(public) = public.parse() else {
        return false;
    };
    let Ok(signature) = PssSignature::try_from(signature.as_bytes()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public)
        .verify(message, &signature)
        .is_ok()
}
