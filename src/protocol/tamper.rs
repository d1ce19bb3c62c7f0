use base64::{engine::general_purpose, Engine as _};

use crate::error::{MessengerError, MessengerResult};

/// Invert one bit of a base64 payload, for tamper demonstrations.
///
/// Bit 0 is the least significant bit of the first byte (the nonce starts
/// there); ciphertext begins at bit 96.
pub fn flip_bit(payload: &str, bit: usize) -> MessengerResult<String> {
    let mut bytes = general_purpose::STANDARD.decode(payload)?;

    let total_bits = bytes.len() * 8;
    if bit >= total_bits {
        return Err(MessengerError::MalformedPayload(format!(
            "bit {} out of range for a {} bit payload",
            bit, total_bits
        )));
    }

    bytes[bit / 8] ^= 1 << (bit % 8);
    Ok(general_purpose::STANDARD.encode(bytes))
}
