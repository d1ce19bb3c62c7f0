use thiserror::Error;

/// Main error type for the messenger core
#[derive(Error, Debug)]
pub enum MessengerError {
    // Party errors
    #[error("Unknown party: {0}")]
    UnknownParty(String),

    #[error("Invalid party identifier: {0}")]
    InvalidPartyId(String),

    // Asymmetric errors
    #[error("Payload too large for key transport: {actual} bytes (max {max})")]
    PayloadTooLarge { max: usize, actual: usize },

    #[error("Asymmetric decryption failed")]
    DecryptionFailed,

    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    // Key exchange errors
    #[error("Counterpart could not unwrap the session key")]
    KeyUnwrapFailed,

    #[error("Unwrapped session key does not match the original")]
    KeyMismatch,

    // Session errors
    #[error("No active session for {0}")]
    NoActiveSession(String),

    // Symmetric errors
    #[error("Integrity check failed: message tampered or wrong key")]
    IntegrityViolation,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for messenger operations
pub type MessengerResult<T> = Result<T, MessengerError>;

impl MessengerError {
    /// Stable label for operator-facing logs
    pub fn kind(&self) -> &'static str {
        match self {
            MessengerError::UnknownParty(_) => "unknown_party",
            MessengerError::InvalidPartyId(_) => "invalid_party_id",
            MessengerError::PayloadTooLarge { .. } => "payload_too_large",
            MessengerError::DecryptionFailed => "decryption_failed",
            MessengerError::KeyGeneration(_) => "key_generation",
            MessengerError::InvalidPublicKey(_) => "invalid_public_key",
            MessengerError::KeyUnwrapFailed => "key_unwrap_failed",
            MessengerError::KeyMismatch => "key_mismatch",
            MessengerError::NoActiveSession(_) => "no_active_session",
            MessengerError::IntegrityViolation => "integrity_violation",
            MessengerError::MalformedPayload(_) => "malformed_payload",
            MessengerError::InvalidKeyLength { .. } => "invalid_key_length",
            MessengerError::EncryptionFailed(_) => "encryption_failed",
            MessengerError::Config(_) => "config",
            MessengerError::Io(_) => "io",
            MessengerError::Json(_) => "json",
        }
    }

    /// Generic text suitable for showing to an end user.
    ///
    /// Rejections of a message all read the same so the user learns nothing
    /// about which check failed; the specific kind goes to the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            MessengerError::UnknownParty(_) | MessengerError::InvalidPartyId(_) => "User error",
            MessengerError::NoActiveSession(_) => "No session key; run a key exchange first",
            MessengerError::KeyUnwrapFailed
            | MessengerError::KeyMismatch
            | MessengerError::KeyGeneration(_)
            | MessengerError::InvalidPublicKey(_)
            | MessengerError::DecryptionFailed
            | MessengerError::InvalidKeyLength { .. }
            | MessengerError::PayloadTooLarge { .. } => "Key exchange failed",
            MessengerError::IntegrityViolation
            | MessengerError::MalformedPayload(_)
            | MessengerError::EncryptionFailed(_) => "Message rejected",
            MessengerError::Config(_) | MessengerError::Io(_) | MessengerError::Json(_) => {
                "Internal error"
            }
        }
    }
}

// Conversion implementations for common error types
impl From<rsa::Error> for MessengerError {
    fn from(err: rsa::Error) -> Self {
        MessengerError::KeyGeneration(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for MessengerError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        MessengerError::InvalidPublicKey(err.to_string())
    }
}

impl From<base64::DecodeError> for MessengerError {
    fn from(err: base64::DecodeError) -> Self {
        MessengerError::MalformedPayload(format!("Base64 decode error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_and_malformed_are_distinct() {
        let tampered = MessengerError::IntegrityViolation;
        let malformed = MessengerError::MalformedPayload("too short".to_string());

        assert_ne!(tampered.kind(), malformed.kind());
        // Both read the same to the end user
        assert_eq!(tampered.user_message(), malformed.user_message());
    }

    #[test]
    fn test_base64_error_is_malformed() {
        use base64::{engine::general_purpose, Engine as _};

        let err: MessengerError = general_purpose::STANDARD
            .decode("not base64!!")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "malformed_payload");
    }
}
