//! Handshake and messaging protocol
//!
//! - `exchange`: RSA key transport of a fresh session key, committed to the
//!   store once both sides hold the same bytes
//! - `transmit`: sealing messages for a sender and verifying them for the
//!   recipient
//! - `messages`: the transport envelope and canonical associated data
//! - `tamper`: helpers for integrity demonstrations

pub mod exchange;
pub mod messages;
pub mod tamper;
pub mod transmit;

pub use exchange::{
    ExchangeResult, ExchangeState, InProcessChannel, KeyExchangeProtocol, WrappedKeyChannel,
};
pub use messages::{associated_data, EncryptedMessage};
pub use tamper::flip_bit;
pub use transmit::{MessageExchangeProtocol, Transmission, VerificationOutcome};
