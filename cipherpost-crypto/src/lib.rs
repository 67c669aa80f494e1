//! End-to-end encryption layer for cipherpost.
//!
//! Everything here runs on the client. The server only ever sees the
//! outputs of these functions: armored public keys, password-wrapped
//! private keys, key envelopes, ciphertext and signatures.
//!
//! # Architecture
//!
//! Messages use hybrid envelope encryption:
//!
//! 1. **Identity key pair**: RSA-2048, generated once at registration.
//!    The public half is published as SPKI PEM. The private half is stored
//!    on the server only in wrapped form (PBKDF2-SHA256 -> AES-256-GCM).
//!
//! 2. **Message key**: a random AES-256-GCM key generated per message.
//!    It encrypts the body and every attachment of that message, and is
//!    itself encrypted with RSA-OAEP once for the recipient and once for
//!    the sender.
//!
//! 3. **Signature**: RSA-PSS (SHA-256, 32-byte salt) over the plaintext
//!    body, checked by the reader after decryption.
//!
//! All binary values cross the wire as standard base64.

mod cipher;
mod encoding;
mod error;
pub mod exchange;
mod key;
pub mod keypair;
pub mod keywrap;
pub mod signature;

pub use cipher::{
    CipherPayload, NONCE_SIZE, TAG_SIZE, decrypt, decrypt_string, encrypt, encrypt_string,
};
pub use error::{CryptoError, CryptoResult};
pub use exchange::{SymmetricKeyEnvelope, unwrap_key, wrap_key};
pub use key::{
    KEY_SIZE, KdfParams, SALT_SIZE, Salt, SymmetricKey, derive_key, fill_random,
    generate_symmetric_key,
};
pub use keypair::{KeyPair, MODULUS_BITS, PrivateKey, PublicKeyPem, generate_key_pair};
pub use keywrap::{
    WrappedPrivateKey, unwrap_private_key, unwrap_private_key_with_params, wrap_private_key,
    wrap_private_key_with_params,
};
pub use signature::{SALT_LEN as PSS_SALT_LEN, Signature, sign, verify};
