pub mod config;
pub mod request;

pub use config::{AppConfig, KeyStrength};
pub use request::SendMessageRequest;

use crate::error::{MessengerError, MessengerResult};
use crate::party::{PartyHandle, PartyId, PartyRegistry};
use crate::protocol::{
    EncryptedMessage, ExchangeResult, KeyExchangeProtocol, MessageExchangeProtocol, Transmission,
    VerificationOutcome, WrappedKeyChannel,
};
use crate::store::SessionKeyStore;

/// Entry point for the collaborator: parties, sessions and the two protocols.
///
/// All methods take `&self`; share it behind an `Arc` across threads.
pub struct Messenger {
    config: AppConfig,
    registry: PartyRegistry,
    store: SessionKeyStore,
}

impl Messenger {
    /// Create a messenger and initialize every party in the configured roster
    pub fn new(config: AppConfig) -> MessengerResult<Self> {
        config.validate()?;

        let messenger = Self {
            registry: PartyRegistry::new(config.key_strength.modulus_bits()),
            store: SessionKeyStore::new(),
            config,
        };

        for id in messenger.config.party_ids()? {
            messenger.registry.initialize(&id)?;
        }
        tracing::info!(
            parties = messenger.registry.len(),
            strength = %messenger.config.key_strength,
            "messenger initialized"
        );

        Ok(messenger)
    }

    /// Register a party, generating its key pair on first use
    pub fn initialize_party(&self, name: &str) -> MessengerResult<PartyHandle> {
        let id = PartyId::new(name)?;
        self.registry.initialize(&id)
    }

    /// Establish a fresh session key between two parties
    pub fn key_exchange(&self, initiator: &str, counterpart: &str) -> MessengerResult<ExchangeResult> {
        let initiator = Self::resolve(initiator)?;
        let counterpart = Self::resolve(counterpart)?;
        KeyExchangeProtocol::new(&self.registry, &self.store).run(&initiator, &counterpart)
    }

    /// Key exchange with the wrapped key carried by `channel`
    pub fn key_exchange_over<C: WrappedKeyChannel + ?Sized>(
        &self,
        initiator: &str,
        counterpart: &str,
        channel: &C,
    ) -> MessengerResult<ExchangeResult> {
        let initiator = Self::resolve(initiator)?;
        let counterpart = Self::resolve(counterpart)?;
        KeyExchangeProtocol::new(&self.registry, &self.store).run_over(
            &initiator,
            &counterpart,
            channel,
        )
    }

    /// Seal a message and run the recipient-side verification
    pub fn send_message(
        &self,
        sender: &str,
        recipient: &str,
        plaintext: &[u8],
    ) -> MessengerResult<Transmission> {
        let sender = Self::resolve(sender)?;
        let recipient = Self::resolve(recipient)?;
        self.messages().send(&sender, &recipient, plaintext)
    }

    /// Handle a validated send request from the collaborator
    pub fn handle_send_request(&self, request: &SendMessageRequest) -> MessengerResult<Transmission> {
        self.messages()
            .send(&request.sender, &request.recipient, request.message.as_bytes())
    }

    /// Verify a message that arrived over the collaborator's transport
    pub fn verify_message(&self, message: &EncryptedMessage) -> MessengerResult<VerificationOutcome> {
        self.messages().verify(message)
    }

    /// Check an operator-supplied (possibly altered) payload as the recipient
    pub fn submit_tampered(
        &self,
        sender: &str,
        recipient: &str,
        tampered_payload: &str,
    ) -> MessengerResult<VerificationOutcome> {
        let sender = Self::resolve(sender)?;
        let recipient = Self::resolve(recipient)?;
        self.messages()
            .submit_tampered(&sender, &recipient, tampered_payload)
    }

    /// The only other party, when exactly two are registered
    pub fn counterpart_of(&self, name: &str) -> MessengerResult<PartyId> {
        let id = self.registry.get_by_name(name)?.id().clone();

        let mut others = self.registry.ids().into_iter().filter(|other| *other != id);
        match (others.next(), others.next()) {
            (Some(other), None) => Ok(other),
            _ => Err(MessengerError::UnknownParty(format!(
                "{} has no unique counterpart",
                id
            ))),
        }
    }

    /// Handles for every registered party, sorted by id
    pub fn parties(&self) -> Vec<PartyHandle> {
        self.registry
            .ids()
            .iter()
            .filter_map(|id| self.registry.get(id).ok())
            .map(|party| PartyHandle::from(party.as_ref()))
            .collect()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &PartyRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SessionKeyStore {
        &self.store
    }

    fn messages(&self) -> MessageExchangeProtocol<'_> {
        MessageExchangeProtocol::new(&self.registry, &self.store)
    }

    /// Names that cannot be party ids cannot name a known party either
    fn resolve(name: &str) -> MessengerResult<PartyId> {
        PartyId::new(name).map_err(|_| MessengerError::UnknownParty(name.to_string()))
    }
}
