use crate::error::{MessengerError, MessengerResult};
use crate::party::{PartyId, PartyRegistry};
use crate::store::{SessionEntry, SessionKeyStore};

use super::messages::{associated_data, EncryptedMessage};

/// What the recipient side concluded about one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Tag matched; the recovered plaintext
    Verified { plaintext: Vec<u8> },
    /// Tag mismatch: altered payload, wrong key or wrong direction
    TamperDetected,
    /// Payload could not be parsed at all
    Malformed { reason: String },
}

impl VerificationOutcome {
    /// Map a decrypt attempt onto an outcome; other errors pass through
    fn from_decrypt(result: MessengerResult<Vec<u8>>) -> MessengerResult<Self> {
        match result {
            Ok(plaintext) => Ok(VerificationOutcome::Verified { plaintext }),
            Err(MessengerError::IntegrityViolation) => Ok(VerificationOutcome::TamperDetected),
            Err(MessengerError::MalformedPayload(reason)) => {
                Ok(VerificationOutcome::Malformed { reason })
            }
            Err(other) => Err(other),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }

    pub fn plaintext(&self) -> Option<&[u8]> {
        match self {
            VerificationOutcome::Verified { plaintext } => Some(plaintext),
            _ => None,
        }
    }

    /// Recovered plaintext as text, if verified and valid UTF-8
    pub fn plaintext_text(&self) -> Option<&str> {
        self.plaintext()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            VerificationOutcome::Verified { .. } => "verified",
            VerificationOutcome::TamperDetected => "tamper_detected",
            VerificationOutcome::Malformed { .. } => "malformed",
        }
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationOutcome::Verified { plaintext } => write!(
                f,
                "Integrity verified: '{}'",
                String::from_utf8_lossy(plaintext)
            ),
            VerificationOutcome::TamperDetected => {
                write!(f, "Integrity check failed: message tampered or forged")
            }
            VerificationOutcome::Malformed { reason } => write!(f, "Malformed payload: {}", reason),
        }
    }
}

/// The sealed message for the transport plus the local verification result
#[derive(Debug, Clone)]
pub struct Transmission {
    pub message: EncryptedMessage,
    pub outcome: VerificationOutcome,
}

/// Seals messages for a sender and checks them as the recipient would
pub struct MessageExchangeProtocol<'a> {
    registry: &'a PartyRegistry,
    store: &'a SessionKeyStore,
}

impl<'a> MessageExchangeProtocol<'a> {
    pub fn new(registry: &'a PartyRegistry, store: &'a SessionKeyStore) -> Self {
        Self { registry, store }
    }

    /// Encrypt `plaintext` from `sender` to `recipient` and verify it on the
    /// recipient's own cipher instance
    pub fn send(
        &self,
        sender: &PartyId,
        recipient: &PartyId,
        plaintext: &[u8],
    ) -> MessengerResult<Transmission> {
        self.registry.get(sender)?;
        self.registry.get(recipient)?;

        // Both halves from one snapshot, never one old and one new
        let (sender_session, recipient_session) = self.store.pair(sender, recipient)?;

        let aad = associated_data(sender, recipient);
        let payload = sender_session.cipher.encrypt(plaintext, aad.as_bytes())?;
        let message = EncryptedMessage::new(sender.clone(), recipient.clone(), payload);

        tracing::info!(
            sender = %sender,
            recipient = %recipient,
            message_id = %message.id,
            payload_len = message.payload.len(),
            "message sealed"
        );

        let outcome = Self::check(&recipient_session, &message)?;
        Ok(Transmission { message, outcome })
    }

    /// Verify a message on behalf of its recipient
    pub fn verify(&self, message: &EncryptedMessage) -> MessengerResult<VerificationOutcome> {
        self.registry.get(&message.sender)?;
        self.registry.get(&message.recipient)?;

        let session = self.store.session_between(&message.recipient, &message.sender)?;
        Self::check(&session, message)
    }

    /// Run the recipient check against an operator-supplied payload
    pub fn submit_tampered(
        &self,
        sender: &PartyId,
        recipient: &PartyId,
        tampered_payload: &str,
    ) -> MessengerResult<VerificationOutcome> {
        let message =
            EncryptedMessage::new(sender.clone(), recipient.clone(), tampered_payload.to_string());
        self.verify(&message)
    }

    fn check(
        session: &SessionEntry,
        message: &EncryptedMessage,
    ) -> MessengerResult<VerificationOutcome> {
        let outcome = if message.has_canonical_associated_data() {
            // Recomputed from the envelope rather than trusting the carried string
            let aad = associated_data(&message.sender, &message.recipient);
            VerificationOutcome::from_decrypt(
                session.cipher.decrypt(&message.payload, aad.as_bytes()),
            )?
        } else {
            VerificationOutcome::Malformed {
                reason: "associated data is not in canonical form".to_string(),
            }
        };

        if outcome.is_verified() {
            tracing::info!(
                sender = %message.sender,
                recipient = %message.recipient,
                message_id = %message.id,
                "message integrity verified"
            );
        } else {
            tracing::warn!(
                sender = %message.sender,
                recipient = %message.recipient,
                message_id = %message.id,
                outcome = outcome.status_label(),
                "message rejected"
            );
        }

        Ok(outcome)
    }
}
