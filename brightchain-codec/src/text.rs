//! Hex / base64 rendering helpers.
//!
//! Ids render as lowercase hex everywhere (magnet URLs, storage keys,
//! logs); base64 is used for opaque payloads embedded in JSON documents.

use base64::Engine as _;

/// lowercase hex, the canonical id rendering
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// decode lowercase or uppercase hex
pub fn from_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s)
}

/// standard-alphabet base64 with padding
pub fn to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// decode standard-alphabet base64
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        assert_eq!(to_hex(&[0xde, 0xad]), "dead");
        assert_eq!(from_hex("dead").unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn base64_round_trip() {
        let bytes = b"any carnal pleasure";
        assert_eq!(from_base64(&to_base64(bytes)).unwrap(), bytes);
    }
}
