//! Cryptography module for the messenger core
//!
//! This module provides:
//! - Key transport (RSA-OAEP key pairs, one per party)
//! - Session encryption (AES-256-GCM with associated data)
//! - Display fingerprints for keys

mod cipher;
mod fingerprint;
mod keypair;

pub use cipher::{SymmetricSessionCipher, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use fingerprint::fingerprint;
pub use keypair::{
    public_key_fingerprint, AsymmetricKeyPair, DEFAULT_MODULUS_BITS, MIN_MODULUS_BITS,
};
