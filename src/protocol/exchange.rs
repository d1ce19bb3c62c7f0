use chrono::{DateTime, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::crypto::{AsymmetricKeyPair, SymmetricSessionCipher, KEY_SIZE};
use crate::error::{MessengerError, MessengerResult};
use crate::party::{PartyId, PartyRegistry};
use crate::store::SessionKeyStore;

/// Progress of one key exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    Start,
    KeyGenerated,
    KeyWrapped,
    KeyUnwrapped,
    Verified,
    Failed,
}

/// Carries the wrapped session key from initiator to counterpart.
///
/// In-process exchanges use [`InProcessChannel`]; a real deployment would put
/// its transport here.
pub trait WrappedKeyChannel {
    fn carry(&self, wrapped_key: Vec<u8>) -> Vec<u8>;
}

/// Hands the wrapped key over unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessChannel;

impl WrappedKeyChannel for InProcessChannel {
    fn carry(&self, wrapped_key: Vec<u8>) -> Vec<u8> {
        wrapped_key
    }
}

/// Outcome of a successful exchange. Holds no key material.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeResult {
    pub initiator: PartyId,
    pub counterpart: PartyId,
    pub state: ExchangeState,
    pub transitions: Vec<ExchangeState>,
    /// Fingerprint of the session key, for operator display
    pub key_snippet: String,
    pub established_at: DateTime<Utc>,
}

/// Records the state walk of one exchange and logs each step
struct Transitions<'a> {
    initiator: &'a PartyId,
    counterpart: &'a PartyId,
    visited: Vec<ExchangeState>,
}

impl<'a> Transitions<'a> {
    fn start(initiator: &'a PartyId, counterpart: &'a PartyId) -> Self {
        let mut transitions = Self {
            initiator,
            counterpart,
            visited: Vec::with_capacity(5),
        };
        transitions.advance(ExchangeState::Start);
        transitions
    }

    fn advance(&mut self, state: ExchangeState) {
        tracing::debug!(
            initiator = %self.initiator,
            counterpart = %self.counterpart,
            state = ?state,
            "key exchange transition"
        );
        self.visited.push(state);
    }

    /// Log the failure and return the last state that was reached
    fn fail(&self, err: &MessengerError) -> ExchangeState {
        let reached = self.visited.last().copied().unwrap_or(ExchangeState::Start);
        tracing::debug!(
            initiator = %self.initiator,
            counterpart = %self.counterpart,
            state = ?ExchangeState::Failed,
            reached = ?reached,
            "key exchange transition"
        );
        tracing::warn!(
            initiator = %self.initiator,
            counterpart = %self.counterpart,
            reached = ?reached,
            kind = err.kind(),
            "key exchange failed"
        );
        reached
    }
}

/// RSA key transport of a fresh AES session key between two parties
pub struct KeyExchangeProtocol<'a> {
    registry: &'a PartyRegistry,
    store: &'a SessionKeyStore,
}

impl<'a> KeyExchangeProtocol<'a> {
    pub fn new(registry: &'a PartyRegistry, store: &'a SessionKeyStore) -> Self {
        Self { registry, store }
    }

    /// Run the exchange entirely in process
    pub fn run(&self, initiator: &PartyId, counterpart: &PartyId) -> MessengerResult<ExchangeResult> {
        self.run_over(initiator, counterpart, &InProcessChannel)
    }

    /// Run the exchange with the wrapped key passing through `channel`.
    ///
    /// The store is only touched once both copies of the key are confirmed
    /// equal; a failed exchange leaves any previous sessions in place.
    pub fn run_over<C: WrappedKeyChannel + ?Sized>(
        &self,
        initiator: &PartyId,
        counterpart: &PartyId,
        channel: &C,
    ) -> MessengerResult<ExchangeResult> {
        let mut transitions = Transitions::start(initiator, counterpart);

        match self.execute(&mut transitions, channel) {
            Ok(result) => {
                tracing::info!(
                    initiator = %initiator,
                    counterpart = %counterpart,
                    key = %result.key_snippet,
                    "key exchange verified"
                );
                Ok(result)
            }
            Err(err) => {
                transitions.fail(&err);
                Err(err)
            }
        }
    }

    fn execute<C: WrappedKeyChannel + ?Sized>(
        &self,
        transitions: &mut Transitions<'_>,
        channel: &C,
    ) -> MessengerResult<ExchangeResult> {
        let initiator_id = transitions.initiator;
        let counterpart_id = transitions.counterpart;

        let initiator = self.registry.get(initiator_id)?;
        let counterpart = self.registry.get(counterpart_id)?;
        if initiator.id() == counterpart.id() {
            return Err(MessengerError::UnknownParty(format!(
                "{} cannot exchange keys with itself",
                initiator_id
            )));
        }

        let initiator_cipher = SymmetricSessionCipher::generate();
        transitions.advance(ExchangeState::KeyGenerated);

        // The initiator only knows the counterpart's published key
        let recipient_key = AsymmetricKeyPair::public_key_from_base64(counterpart.published_key())?;
        let wrapped = initiator
            .keypair()
            .encrypt(initiator_cipher.key_bytes(), &recipient_key)?;
        transitions.advance(ExchangeState::KeyWrapped);

        let delivered = channel.carry(wrapped);
        let unwrapped = counterpart
            .keypair()
            .decrypt(&delivered)
            .map_err(|_| MessengerError::KeyUnwrapFailed)?;
        transitions.advance(ExchangeState::KeyUnwrapped);

        if unwrapped.len() != KEY_SIZE
            || !bool::from(unwrapped.as_slice().ct_eq(initiator_cipher.key_bytes()))
        {
            return Err(MessengerError::KeyMismatch);
        }
        let counterpart_cipher = SymmetricSessionCipher::from_key_bytes(&unwrapped)?;

        let key_snippet = initiator_cipher.fingerprint();
        self.store
            .commit_pair(initiator_id, initiator_cipher, counterpart_id, counterpart_cipher);
        transitions.advance(ExchangeState::Verified);

        Ok(ExchangeResult {
            initiator: initiator_id.clone(),
            counterpart: counterpart_id.clone(),
            state: ExchangeState::Verified,
            transitions: transitions.visited.clone(),
            key_snippet,
            established_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DEFAULT_MODULUS_BITS;
    use rsa::RsaPublicKey;

    fn id(name: &str) -> PartyId {
        PartyId::new(name).unwrap()
    }

    fn setup() -> Result<(PartyRegistry, SessionKeyStore), Box<dyn std::error::Error>> {
        let registry = PartyRegistry::new(DEFAULT_MODULUS_BITS);
        registry.initialize(&id("Alice"))?;
        registry.initialize(&id("Bob"))?;
        Ok((registry, SessionKeyStore::new()))
    }

    /// Flips one bit of the wrapped key in transit
    struct CorruptingChannel;

    impl WrappedKeyChannel for CorruptingChannel {
        fn carry(&self, mut wrapped_key: Vec<u8>) -> Vec<u8> {
            wrapped_key[0] ^= 0x80;
            wrapped_key
        }
    }

    /// Swaps the wrapped key for a different, validly wrapped one
    struct SubstitutingChannel {
        counterpart_key: RsaPublicKey,
        forger: AsymmetricKeyPair,
    }

    impl WrappedKeyChannel for SubstitutingChannel {
        fn carry(&self, _wrapped_key: Vec<u8>) -> Vec<u8> {
            self.forger
                .encrypt(&[0x42; KEY_SIZE], &self.counterpart_key)
                .unwrap()
        }
    }

    /// Delivers a wrapped 16-byte key in place of the 32-byte one
    struct ShortKeyChannel {
        counterpart_key: RsaPublicKey,
    }

    impl WrappedKeyChannel for ShortKeyChannel {
        fn carry(&self, _wrapped_key: Vec<u8>) -> Vec<u8> {
            AsymmetricKeyPair::generate()
                .and_then(|forger| forger.encrypt(&[0x42; KEY_SIZE / 2], &self.counterpart_key))
                .unwrap()
        }
    }

    #[test]
    fn test_exchange_verifies() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);

        let result = protocol.run(&id("Alice"), &id("Bob"))?;

        assert_eq!(result.state, ExchangeState::Verified);
        assert_eq!(
            result.transitions,
            vec![
                ExchangeState::Start,
                ExchangeState::KeyGenerated,
                ExchangeState::KeyWrapped,
                ExchangeState::KeyUnwrapped,
                ExchangeState::Verified,
            ]
        );

        let (alice, bob) = store.pair(&id("Alice"), &id("Bob"))?;
        assert_eq!(alice.cipher.key_bytes(), bob.cipher.key_bytes());
        assert_eq!(result.key_snippet, alice.cipher.fingerprint());
        Ok(())
    }

    #[test]
    fn test_snippet_reveals_no_key_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let result = KeyExchangeProtocol::new(&registry, &store).run(&id("Alice"), &id("Bob"))?;

        let entry = store.get(&id("Alice"))?;
        let key_hex = hex::encode_upper(entry.cipher.key_bytes());
        let snippet_hex = result.key_snippet.replace('-', "");
        assert!(!key_hex.contains(&snippet_hex));
        Ok(())
    }

    #[test]
    fn test_unknown_party() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);

        assert!(matches!(
            protocol.run(&id("Mallory"), &id("Alice")),
            Err(MessengerError::UnknownParty(name)) if name == "Mallory"
        ));
        assert!(matches!(
            protocol.run(&id("Alice"), &id("Alice")),
            Err(MessengerError::UnknownParty(_))
        ));
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_corrupted_wrap_fails_unwrap() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);

        assert!(matches!(
            protocol.run_over(&id("Alice"), &id("Bob"), &CorruptingChannel),
            Err(MessengerError::KeyUnwrapFailed)
        ));
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_substituted_key_is_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);
        let channel = SubstitutingChannel {
            counterpart_key: AsymmetricKeyPair::public_key_from_base64(
                registry.get(&id("Bob"))?.published_key(),
            )?,
            forger: AsymmetricKeyPair::generate()?,
        };

        assert!(matches!(
            protocol.run_over(&id("Alice"), &id("Bob"), &channel),
            Err(MessengerError::KeyMismatch)
        ));
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_exchange_keeps_previous_session() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);

        let first = protocol.run(&id("Alice"), &id("Bob"))?;
        assert!(protocol
            .run_over(&id("Alice"), &id("Bob"), &CorruptingChannel)
            .is_err());

        assert_eq!(store.get(&id("Bob"))?.cipher.fingerprint(), first.key_snippet);
        Ok(())
    }

    #[test]
    fn test_rerun_replaces_both_sessions() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);

        let first = protocol.run(&id("Alice"), &id("Bob"))?;
        let second = protocol.run(&id("Bob"), &id("Alice"))?;
        assert_ne!(first.key_snippet, second.key_snippet);

        let (alice, bob) = store.pair(&id("Alice"), &id("Bob"))?;
        assert_eq!(alice.cipher.fingerprint(), second.key_snippet);
        assert_eq!(bob.cipher.fingerprint(), second.key_snippet);
        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[test]
    fn test_failure_reports_last_reached_state() -> Result<(), Box<dyn std::error::Error>> {
        let (alice, bob) = (id("Alice"), id("Bob"));
        let mut transitions = Transitions::start(&alice, &bob);
        transitions.advance(ExchangeState::KeyGenerated);
        transitions.advance(ExchangeState::KeyWrapped);

        let reached = transitions.fail(&MessengerError::KeyUnwrapFailed);

        assert_eq!(reached, ExchangeState::KeyWrapped);
        assert!(!transitions.visited.contains(&ExchangeState::Failed));
        Ok(())
    }

    #[test]
    fn test_short_unwrapped_key_is_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let (registry, store) = setup()?;
        let protocol = KeyExchangeProtocol::new(&registry, &store);
        let channel = ShortKeyChannel {
            counterpart_key: AsymmetricKeyPair::public_key_from_base64(
                registry.get(&id("Bob"))?.published_key(),
            )?,
        };

        assert!(matches!(
            protocol.run_over(&id("Alice"), &id("Bob"), &channel),
            Err(MessengerError::KeyMismatch)
        ));
        assert!(store.is_empty());
        Ok(())
    }
}
