use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rsa::{
    pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey, LineEnding},
    traits::PublicKeyParts,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;

use super::fingerprint::fingerprint;
use crate::error::{MessengerError, MessengerResult};

/// Smallest modulus accepted for a party key pair
pub const MIN_MODULUS_BITS: usize = 2048;

/// Default modulus size for freshly generated key pairs
pub const DEFAULT_MODULUS_BITS: usize = 2048;

/// OAEP overhead with SHA-256: two digest lengths plus two bytes
const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;

/// RSA key pair owned by a single party.
///
/// Only the public half ever leaves this struct; the private key is used in
/// place by [`AsymmetricKeyPair::decrypt`].
pub struct AsymmetricKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl AsymmetricKeyPair {
    /// Generate a key pair with the default modulus size
    pub fn generate() -> MessengerResult<Self> {
        Self::generate_with_bits(DEFAULT_MODULUS_BITS)
    }

    /// Generate a key pair with an explicit modulus size (at least 2048 bits)
    pub fn generate_with_bits(bits: usize) -> MessengerResult<Self> {
        if bits < MIN_MODULUS_BITS {
            return Err(MessengerError::KeyGeneration(format!(
                "modulus of {} bits is below the {} bit minimum",
                bits, MIN_MODULUS_BITS
            )));
        }

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Public key as base64-encoded PKCS#1 PEM, the form peers exchange
    pub fn public_key_base64(&self) -> MessengerResult<String> {
        let pem = self.public_key.to_pkcs1_pem(LineEnding::LF)?;
        Ok(general_purpose::STANDARD.encode(pem.as_bytes()))
    }

    /// Decode a peer's public key from its base64 PEM form
    pub fn public_key_from_base64(encoded: &str) -> MessengerResult<RsaPublicKey> {
        let pem_bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| MessengerError::InvalidPublicKey(e.to_string()))?;
        let pem_str = String::from_utf8(pem_bytes)
            .map_err(|e| MessengerError::InvalidPublicKey(e.to_string()))?;
        Ok(RsaPublicKey::from_pkcs1_pem(&pem_str)?)
    }

    /// Fingerprint of the public key, for display
    pub fn fingerprint(&self) -> String {
        public_key_fingerprint(&self.public_key)
    }

    /// Largest plaintext `recipient` can receive through OAEP
    pub fn max_plaintext_len(recipient: &RsaPublicKey) -> usize {
        recipient.size().saturating_sub(OAEP_SHA256_OVERHEAD)
    }

    /// Encrypt `plaintext` to the holder of `recipient` using RSA-OAEP (SHA-256)
    pub fn encrypt(&self, plaintext: &[u8], recipient: &RsaPublicKey) -> MessengerResult<Vec<u8>> {
        let max = Self::max_plaintext_len(recipient);
        if plaintext.len() > max {
            return Err(MessengerError::PayloadTooLarge {
                max,
                actual: plaintext.len(),
            });
        }

        let mut rng = OsRng;
        recipient
            .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| MessengerError::EncryptionFailed(e.to_string()))
    }

    /// Decrypt a ciphertext addressed to this key pair.
    ///
    /// Every failure is reported as the same `DecryptionFailed`.
    pub fn decrypt(&self, ciphertext: &[u8]) -> MessengerResult<Vec<u8>> {
        self.private_key
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|_| MessengerError::DecryptionFailed)
    }
}

impl std::fmt::Debug for AsymmetricKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsymmetricKeyPair")
            .field("modulus_bits", &(self.public_key.size() * 8))
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Fingerprint over the big-endian modulus followed by the public exponent
pub fn public_key_fingerprint(key: &RsaPublicKey) -> String {
    let mut material = key.n().to_bytes_be();
    material.extend_from_slice(&key.e().to_bytes_be());
    fingerprint(&material)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_decryption() -> Result<(), Box<dyn std::error::Error>> {
        // Two key pairs, simulating two parties
        let alice = AsymmetricKeyPair::generate()?;
        let bob = AsymmetricKeyPair::generate()?;

        let session_key = [7u8; 32];
        let wrapped = alice.encrypt(&session_key, bob.public_key())?;
        let unwrapped = bob.decrypt(&wrapped)?;

        assert_eq!(session_key.as_slice(), unwrapped.as_slice());
        Ok(())
    }

    #[test]
    fn test_binary_bytes_survive_exactly() -> Result<(), Box<dyn std::error::Error>> {
        let alice = AsymmetricKeyPair::generate()?;
        let bob = AsymmetricKeyPair::generate()?;

        // Bytes that are not valid UTF-8 must come back untouched
        let raw: Vec<u8> = (0..=255u8).rev().take(32).collect();
        let wrapped = alice.encrypt(&raw, bob.public_key())?;
        assert_eq!(bob.decrypt(&wrapped)?, raw);
        Ok(())
    }

    #[test]
    fn test_wrong_private_key_fails() -> Result<(), Box<dyn std::error::Error>> {
        let alice = AsymmetricKeyPair::generate()?;
        let bob = AsymmetricKeyPair::generate()?;

        let wrapped = alice.encrypt(b"for bob only", bob.public_key())?;
        assert!(matches!(
            alice.decrypt(&wrapped),
            Err(MessengerError::DecryptionFailed)
        ));
        Ok(())
    }

    #[test]
    fn test_corrupted_ciphertext_fails() -> Result<(), Box<dyn std::error::Error>> {
        let alice = AsymmetricKeyPair::generate()?;
        let bob = AsymmetricKeyPair::generate()?;

        let mut wrapped = alice.encrypt(b"session key", bob.public_key())?;
        wrapped[10] ^= 0x01;
        assert!(matches!(
            bob.decrypt(&wrapped),
            Err(MessengerError::DecryptionFailed)
        ));

        // Truncated input fails the same way
        assert!(matches!(
            bob.decrypt(&wrapped[..16]),
            Err(MessengerError::DecryptionFailed)
        ));
        Ok(())
    }

    #[test]
    fn test_payload_too_large() -> Result<(), Box<dyn std::error::Error>> {
        let alice = AsymmetricKeyPair::generate()?;
        let bob = AsymmetricKeyPair::generate()?;

        let max = AsymmetricKeyPair::max_plaintext_len(bob.public_key());
        assert_eq!(max, 256 - 66);

        assert!(alice.encrypt(&vec![1u8; max], bob.public_key()).is_ok());
        match alice.encrypt(&vec![1u8; max + 1], bob.public_key()) {
            Err(MessengerError::PayloadTooLarge { max: m, actual }) => {
                assert_eq!(m, max);
                assert_eq!(actual, max + 1);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_modulus_below_minimum_rejected() {
        assert!(matches!(
            AsymmetricKeyPair::generate_with_bits(1024),
            Err(MessengerError::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_public_key_base64_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let alice = AsymmetricKeyPair::generate()?;

        let encoded = alice.public_key_base64()?;
        let decoded = AsymmetricKeyPair::public_key_from_base64(&encoded)?;

        assert_eq!(&decoded, alice.public_key());
        assert_eq!(public_key_fingerprint(&decoded), alice.fingerprint());
        assert!(AsymmetricKeyPair::public_key_from_base64("garbage").is_err());
        Ok(())
    }

    #[test]
    fn test_debug_hides_private_key() -> Result<(), Box<dyn std::error::Error>> {
        let alice = AsymmetricKeyPair::generate()?;
        let rendered = format!("{:?}", alice);

        assert!(rendered.contains("modulus_bits: 2048"));
        assert!(!rendered.contains("private"));
        Ok(())
    }
}
