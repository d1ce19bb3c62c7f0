use sha2::{Digest, Sha256};

/// Number of digest bytes rendered into a fingerprint
const FINGERPRINT_BYTES: usize = 8;

/// Compute a display fingerprint (first 8 bytes of SHA256, formatted).
///
/// The output is `XXXX-XXXX-XXXX-XXXX` and is safe to show to operators: it
/// identifies key material without revealing any of it.
pub fn fingerprint(material: &[u8]) -> String {
    let hash = Sha256::digest(material);
    let hex = hex::encode_upper(&hash[..FINGERPRINT_BYTES]);
    format!(
        "{}-{}-{}-{}",
        &hex[0..4],
        &hex[4..8],
        &hex[8..12],
        &hex[12..16]
    )
}
