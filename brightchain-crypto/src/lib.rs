//! Cryptographic building blocks for the BrightChain block store.
//!
//! Everything a node needs to address, sign and seal content:
//!
//! * [`hash`]: SHA3 digests and the strongly typed [`hash::Hash`] used as
//!   block identity across the whole system
//! * [`key`]: Ed25519 keys and signatures for constituent block lists
//! * [`aead`]: the symmetric ChaCha20-Poly1305 seal/open pair
//! * [`memsec`]: scrubbing utilities backing the secret key types

use rand_core::{CryptoRng, RngCore};
use thiserror::Error;

pub mod aead;
pub mod hash;
pub mod key;
pub mod memsec;

/// Errors surfaced by the crypto adapters.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    BadSignature,

    #[error("cipher failure")]
    Cipher,
}

/// Fill a fresh buffer of `n` bytes from the given cryptographic rng.
///
/// The store uses this to mint randomizer blocks when the corpus cannot
/// provide an existing one.
pub fn random_bytes<R>(rng: &mut R, n: usize) -> Vec<u8>
where
    R: RngCore + CryptoRng,
{
    let mut out = vec![0u8; n];
    rng.fill_bytes(&mut out);
    out
}
