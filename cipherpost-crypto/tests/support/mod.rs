//! Shared fixtures. RSA key generation dominates test time, so each test
//! binary generates its key pairs once.

#![allow(dead_code)]

use cipherpost_crypto::{KdfParams, KeyPair, generate_key_pair};
use std::sync::OnceLock;

pub fn alice() -> &'static KeyPair {
    static KEY: OnceLock<KeyPair> = OnceLock::new();
    KEY.get_or_init(|| generate_key_pair().expect("key generation must succeed"))
}

pub fn bob() -> &'static KeyPair {
    static KEY: OnceLock<KeyPair> = OnceLock::new();
    KEY.get_or_init(|| generate_key_pair().expect("key generation must succeed"))
}

/// Cheap KDF parameters for tests that wrap keys repeatedly.
pub fn fast_kdf() -> KdfParams {
    KdfParams::new(1_000)
}
