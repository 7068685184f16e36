//! Symmetric authenticated encryption
//!
//! The block store itself never encrypts payloads (brightening is the
//! obscurity mechanism); this pair backs the optional encrypted-CBL path
//! where the whitened manifest is further sealed for a recipient.

use crate::CryptoError;
use cryptoxide::chacha20poly1305::ChaCha20Poly1305;

/// symmetric key width in bytes
pub const KEY_SIZE: usize = 32;
/// nonce width in bytes (IETF variant)
pub const NONCE_SIZE: usize = 12;
/// poly1305 authentication tag width in bytes
pub const TAG_SIZE: usize = 16;

/// seal `plaintext` under `key`/`nonce`, binding `aad`.
///
/// Returns `ciphertext || tag`. The nonce must never repeat under the same
/// key; callers derive it from fresh randomness per message.
pub fn seal(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], aad: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let mut cipher = ChaCha20Poly1305::new(key, nonce, aad);

    let mut out = vec![0u8; plaintext.len() + TAG_SIZE];
    let (ciphertext, tag) = out.split_at_mut(plaintext.len());
    cipher.encrypt(plaintext, ciphertext, tag);

    out
}

/// open a buffer produced by [`seal`], authenticating `aad` along the way.
///
/// Fails with [`CryptoError::Cipher`] when the tag does not authenticate
/// (wrong key, wrong nonce, wrong aad or tampered ciphertext).
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    sealed: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < TAG_SIZE {
        return Err(CryptoError::Cipher);
    }

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    let mut cipher = ChaCha20Poly1305::new(key, nonce, aad);
    let mut plaintext = vec![0u8; ciphertext.len()];

    if cipher.decrypt(ciphertext, &mut plaintext, tag) {
        Ok(plaintext)
    } else {
        Err(CryptoError::Cipher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [7; KEY_SIZE];
    const NONCE: [u8; NONCE_SIZE] = [9; NONCE_SIZE];

    #[test]
    fn round_trip() {
        let sealed = seal(&KEY, &NONCE, b"manifest", b"whitened cbl bytes");
        let opened = open(&KEY, &NONCE, b"manifest", &sealed).unwrap();
        assert_eq!(opened, b"whitened cbl bytes");
    }

    #[test]
    fn tamper_detected() {
        let mut sealed = seal(&KEY, &NONCE, b"", b"payload");
        sealed[0] ^= 0x01;
        assert!(open(&KEY, &NONCE, b"", &sealed).is_err());
    }

    #[test]
    fn wrong_aad_rejected() {
        let sealed = seal(&KEY, &NONCE, b"aad one", b"payload");
        assert!(open(&KEY, &NONCE, b"aad two", &sealed).is_err());
    }

    #[test]
    fn truncated_rejected() {
        assert!(open(&KEY, &NONCE, b"", &[0u8; 4]).is_err());
    }
}
