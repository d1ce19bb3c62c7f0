use serde::Deserialize;

use crate::error::{MessengerError, MessengerResult};
use crate::party::PartyId;

/// Fields as they arrive from the collaborator, before validation
#[derive(Debug, Default, Deserialize)]
struct RawSendRequest {
    sender: Option<String>,
    recipient: Option<String>,
    message: Option<String>,
}

/// A send request with every required field present and checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub sender: PartyId,
    pub recipient: PartyId,
    pub message: String,
}

impl SendMessageRequest {
    /// Validate individual fields.
    ///
    /// Missing or invalid parties are `UnknownParty`; a missing or blank
    /// message is `MalformedPayload`.
    pub fn from_fields(
        sender: Option<&str>,
        recipient: Option<&str>,
        message: Option<&str>,
    ) -> MessengerResult<Self> {
        let sender = Self::party_field("sender", sender)?;
        let recipient = Self::party_field("recipient", recipient)?;

        let message = match message {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            Some(_) => {
                return Err(MessengerError::MalformedPayload("message is empty".to_string()))
            }
            None => {
                return Err(MessengerError::MalformedPayload(
                    "missing field: message".to_string(),
                ))
            }
        };

        Ok(Self {
            sender,
            recipient,
            message,
        })
    }

    /// Decode and validate a JSON request body
    pub fn from_json(json: &str) -> MessengerResult<Self> {
        let raw: RawSendRequest = serde_json::from_str(json)
            .map_err(|e| MessengerError::MalformedPayload(format!("invalid request: {}", e)))?;

        Self::from_fields(
            raw.sender.as_deref(),
            raw.recipient.as_deref(),
            raw.message.as_deref(),
        )
    }

    fn party_field(field: &str, value: Option<&str>) -> MessengerResult<PartyId> {
        let value =
            value.ok_or_else(|| MessengerError::UnknownParty(format!("missing field: {}", field)))?;
        PartyId::new(value).map_err(|_| MessengerError::UnknownParty(value.to_string()))
    }
}
