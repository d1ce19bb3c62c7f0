use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AesRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::fingerprint::fingerprint;
use crate::error::{MessengerError, MessengerResult};

/// Size of the session key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM cipher bound to one session key.
///
/// Each party owns its own instance; there is no `Clone`.
/// Key bytes are wiped when the cipher is dropped.
pub struct SymmetricSessionCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
    cipher: Aes256Gcm,
}

impl SymmetricSessionCipher {
    /// Generate a cipher around a fresh random key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut key[..]);
        Self::from_key(key)
    }

    /// Build a cipher from key material received from a peer
    pub fn from_key_bytes(bytes: &[u8]) -> MessengerResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(MessengerError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self::from_key(key))
    }

    fn from_key(key: Zeroizing<[u8; KEY_SIZE]>) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
        Self { key, cipher }
    }

    /// Raw key bytes, needed to wrap the key for the counterpart
    pub fn key_bytes(&self) -> &[u8] {
        &self.key[..]
    }

    /// Display fingerprint of the key
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.key[..])
    }

    /// Encrypt and return the payload as base64 for transport
    pub fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> MessengerResult<String> {
        let sealed = self.seal(plaintext, associated_data)?;
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    /// Decrypt a base64 payload produced by [`SymmetricSessionCipher::encrypt`]
    pub fn decrypt(&self, payload: &str, associated_data: &[u8]) -> MessengerResult<Vec<u8>> {
        let sealed = general_purpose::STANDARD.decode(payload)?;
        self.open(&sealed, associated_data)
    }

    /// Encrypt with a fresh random nonce.
    ///
    /// Returns: nonce || ciphertext || tag
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> MessengerResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut AesRng);
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };

        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload)
            .map_err(|e| MessengerError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Verify the tag and decrypt.
    ///
    /// Input: nonce || ciphertext || tag
    pub fn open(&self, sealed: &[u8], associated_data: &[u8]) -> MessengerResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(MessengerError::MalformedPayload(format!(
                "payload of {} bytes is shorter than nonce and tag",
                sealed.len()
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| MessengerError::IntegrityViolation)
    }
}

impl std::fmt::Debug for SymmetricSessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricSessionCipher({})", self.fingerprint())
    }
}
