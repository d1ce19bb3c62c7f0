//! Two-party secure messaging core
//!
//! Each party holds an RSA key pair. A key exchange wraps a fresh AES-256
//! session key with the counterpart's public key (RSA-OAEP), checks that both
//! sides recovered identical bytes, and stores a separate cipher per party.
//! Messages are then sealed with AES-256-GCM, bound to the direction
//! `"<sender> to <recipient>"` as associated data, and verified on the
//! recipient's own cipher.
//!
//! ```rust,no_run
//! use handshake_messenger::{AppConfig, Messenger};
//!
//! let messenger = Messenger::new(AppConfig::default())?;
//! let exchange = messenger.key_exchange("Alice", "Bob")?;
//! println!("session key {}", exchange.key_snippet);
//!
//! let sent = messenger.send_message("Alice", "Bob", b"hello")?;
//! assert!(sent.outcome.is_verified());
//! # Ok::<(), handshake_messenger::MessengerError>(())
//! ```

pub mod app;
pub mod crypto;
pub mod error;
pub mod party;
pub mod protocol;
pub mod store;

pub use app::{AppConfig, KeyStrength, Messenger, SendMessageRequest};
pub use error::{MessengerError, MessengerResult};
pub use party::{PartyHandle, PartyId};
pub use protocol::{EncryptedMessage, ExchangeResult, ExchangeState, Transmission, VerificationOutcome};
