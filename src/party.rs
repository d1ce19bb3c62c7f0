use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::AsymmetricKeyPair;
use crate::error::{MessengerError, MessengerResult};

/// Longest accepted party name, in characters
pub const MAX_PARTY_ID_LEN: usize = 64;

/// Word joining sender and recipient in associated data
pub const DIRECTION_WORD: &str = "to";

/// Validated party name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId(String);

impl PartyId {
    /// Parse a party name: trimmed, non-empty, no control characters.
    ///
    /// The word `to` may not stand on its own inside a name, otherwise
    /// `"<sender> to <recipient>"` could be read with two different splits.
    pub fn new(name: &str) -> MessengerResult<Self> {
        let name = name.trim();

        if name.is_empty() {
            return Err(MessengerError::InvalidPartyId("name is empty".to_string()));
        }
        if name.chars().count() > MAX_PARTY_ID_LEN {
            return Err(MessengerError::InvalidPartyId(format!(
                "name longer than {} characters",
                MAX_PARTY_ID_LEN
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(MessengerError::InvalidPartyId(
                "name contains control characters".to_string(),
            ));
        }
        if name.split(' ').any(|word| word == DIRECTION_WORD) {
            return Err(MessengerError::InvalidPartyId(format!(
                "name contains the word '{}'",
                DIRECTION_WORD
            )));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PartyId {
    type Error = MessengerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PartyId> for String {
    fn from(id: PartyId) -> Self {
        id.0
    }
}

impl std::str::FromStr for PartyId {
    type Err = MessengerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A named participant and its RSA key pair
#[derive(Debug)]
pub struct Party {
    id: PartyId,
    keypair: AsymmetricKeyPair,
    published_key: String,
    created_at: DateTime<Utc>,
}

impl Party {
    pub fn id(&self) -> &PartyId {
        &self.id
    }

    pub fn keypair(&self) -> &AsymmetricKeyPair {
        &self.keypair
    }

    /// Public key in the base64 PEM form handed to other parties
    pub fn published_key(&self) -> &str {
        &self.published_key
    }
}

/// What the collaborator gets back from party initialization.
///
/// Carries only public information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyHandle {
    pub id: PartyId,
    pub public_key: String,
    pub public_key_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Party> for PartyHandle {
    fn from(party: &Party) -> Self {
        Self {
            id: party.id.clone(),
            public_key: party.published_key.clone(),
            public_key_fingerprint: party.keypair.fingerprint(),
            created_at: party.created_at,
        }
    }
}

/// Every initialized party, keyed by id. Parties are never removed.
#[derive(Debug)]
pub struct PartyRegistry {
    modulus_bits: usize,
    parties: RwLock<HashMap<PartyId, Arc<Party>>>,
}

impl PartyRegistry {
    pub fn new(modulus_bits: usize) -> Self {
        Self {
            modulus_bits,
            parties: RwLock::new(HashMap::new()),
        }
    }

    /// Create a party with a fresh key pair.
    ///
    /// An id that is already registered keeps its existing keys.
    pub fn initialize(&self, id: &PartyId) -> MessengerResult<PartyHandle> {
        if let Some(existing) = self.find(id) {
            return Ok(PartyHandle::from(existing.as_ref()));
        }

        // Generate outside the lock; key generation is the slow part
        let keypair = AsymmetricKeyPair::generate_with_bits(self.modulus_bits)?;
        let published_key = keypair.public_key_base64()?;
        let candidate = Arc::new(Party {
            id: id.clone(),
            keypair,
            published_key,
            created_at: Utc::now(),
        });

        let mut parties = self.parties.write().unwrap_or_else(PoisonError::into_inner);
        let party = parties.entry(id.clone()).or_insert(candidate);

        tracing::info!(
            party = %id,
            fingerprint = %party.keypair.fingerprint(),
            "party initialized"
        );
        Ok(PartyHandle::from(party.as_ref()))
    }

    /// Look up a party by id
    pub fn get(&self, id: &PartyId) -> MessengerResult<Arc<Party>> {
        self.find(id)
            .ok_or_else(|| MessengerError::UnknownParty(id.to_string()))
    }

    /// Look up a party by raw name; unparseable names are unknown parties
    pub fn get_by_name(&self, name: &str) -> MessengerResult<Arc<Party>> {
        let id = PartyId::new(name).map_err(|_| MessengerError::UnknownParty(name.to_string()))?;
        self.get(&id)
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> Vec<PartyId> {
        let parties = self.parties.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<PartyId> = parties.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.parties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, id: &PartyId) -> Option<Arc<Party>> {
        self.parties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}
