use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::crypto::SymmetricSessionCipher;
use crate::error::{MessengerError, MessengerResult};
use crate::party::PartyId;

/// A party's current session: the cipher and who it is shared with
#[derive(Debug)]
pub struct SessionEntry {
    pub peer: PartyId,
    pub cipher: SymmetricSessionCipher,
    pub established_at: DateTime<Utc>,
}

/// Process-wide map from party to its active session.
///
/// Entries are replaced whole and never edited in place. Readers get an `Arc`
/// to the entry that was current when they looked, so cryptography runs
/// without holding the lock.
#[derive(Debug, Default)]
pub struct SessionKeyStore {
    entries: RwLock<HashMap<PartyId, Arc<SessionEntry>>>,
}

impl SessionKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session for `party`, replacing any previous one
    pub fn put(&self, party: PartyId, peer: PartyId, cipher: SymmetricSessionCipher) {
        let entry = Arc::new(SessionEntry {
            peer,
            cipher,
            established_at: Utc::now(),
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(party, entry);
    }

    /// Install both sides of an exchange under a single write lock
    pub fn commit_pair(
        &self,
        first: &PartyId,
        first_cipher: SymmetricSessionCipher,
        second: &PartyId,
        second_cipher: SymmetricSessionCipher,
    ) {
        let established_at = Utc::now();
        let first_entry = Arc::new(SessionEntry {
            peer: second.clone(),
            cipher: first_cipher,
            established_at,
        });
        let second_entry = Arc::new(SessionEntry {
            peer: first.clone(),
            cipher: second_cipher,
            established_at,
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(first.clone(), first_entry);
        entries.insert(second.clone(), second_entry);
    }

    /// Current session for `party`
    pub fn get(&self, party: &PartyId) -> MessengerResult<Arc<SessionEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(party)
            .cloned()
            .ok_or_else(|| MessengerError::NoActiveSession(party.to_string()))
    }

    /// Current session for `party`, only if it is shared with `peer`
    pub fn session_between(&self, party: &PartyId, peer: &PartyId) -> MessengerResult<Arc<SessionEntry>> {
        let entry = self.get(party)?;
        if &entry.peer != peer {
            return Err(MessengerError::NoActiveSession(format!("{} with {}", party, peer)));
        }
        Ok(entry)
    }

    /// Both directions of a session, read under one lock
    pub fn pair(
        &self,
        first: &PartyId,
        second: &PartyId,
    ) -> MessengerResult<(Arc<SessionEntry>, Arc<SessionEntry>)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let lookup = |party: &PartyId, peer: &PartyId| {
            entries
                .get(party)
                .filter(|entry| &entry.peer == peer)
                .cloned()
                .ok_or_else(|| MessengerError::NoActiveSession(format!("{} with {}", party, peer)))
        };

        Ok((lookup(first, second)?, lookup(second, first)?))
    }

    /// Drop the session for `party`, returning it if there was one
    pub fn remove(&self, party: &PartyId) -> Option<Arc<SessionEntry>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(party)
    }

    pub fn contains(&self, party: &PartyId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(party)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
