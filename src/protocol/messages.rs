use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::party::{PartyId, DIRECTION_WORD};

/// Canonical associated data binding a payload to one direction.
///
/// Both the sending and the verifying side must build it with this function.
pub fn associated_data(sender: &PartyId, recipient: &PartyId) -> String {
    format!("{} {} {}", sender, DIRECTION_WORD, recipient)
}

/// An authenticated ciphertext ready for the collaborator's transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub id: Uuid,
    pub sender: PartyId,
    pub recipient: PartyId,
    /// base64 of nonce || ciphertext || tag
    pub payload: String,
    pub associated_data: String,
    pub timestamp: DateTime<Utc>,
}

impl EncryptedMessage {
    /// Wrap a payload sealed for `sender` -> `recipient`
    pub fn new(sender: PartyId, recipient: PartyId, payload: String) -> Self {
        let associated_data = associated_data(&sender, &recipient);
        Self {
            id: Uuid::new_v4(),
            sender,
            recipient,
            payload,
            associated_data,
            timestamp: Utc::now(),
        }
    }

    /// Whether the carried associated data is the canonical form for its parties
    pub fn has_canonical_associated_data(&self) -> bool {
        self.associated_data == associated_data(&self.sender, &self.recipient)
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a message from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> PartyId {
        PartyId::new(name).unwrap()
    }

    #[test]
    fn test_associated_data_is_directional() {
        assert_eq!(associated_data(&id("Alice"), &id("Bob")), "Alice to Bob");
        assert_ne!(
            associated_data(&id("Alice"), &id("Bob")),
            associated_data(&id("Bob"), &id("Alice"))
        );
    }

    #[test]
    fn test_json_transport() -> Result<(), Box<dyn std::error::Error>> {
        let message = EncryptedMessage::new(id("Alice"), id("Bob"), "AAAA".to_string());
        let json = message.to_json()?;

        assert!(json.contains("\"associated_data\":\"Alice to Bob\""));
        assert_eq!(EncryptedMessage::from_json(&json)?, message);
        Ok(())
    }

    #[test]
    fn test_invalid_party_rejected_on_decode() {
        let json = r#"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","sender":"",
            "recipient":"Bob","payload":"","associated_data":" to Bob",
            "timestamp":"2024-01-01T00:00:00Z"}"#;
        assert!(EncryptedMessage::from_json(json).is_err());
    }
}
