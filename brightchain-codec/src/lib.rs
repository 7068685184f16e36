//! Byte-level utilities shared across the BrightChain crates
//!
//! The binary formats in this system (CBL headers, framing, whitened
//! payloads) are all hand-laid-out big-endian structures; this crate holds
//! the small vocabulary they are written and read with:
//!
//! * [`be`]: offset-addressed big-endian packing and a cursor reader
//! * [`xor`]: equal-length XOR combination (the whitening primitive)
//! * [`frame`]: tag-prefixed length framing used to pad variable payloads
//!   into fixed-size blocks
//! * [`text`]: hex / base64 rendering helpers

use thiserror::Error;

pub mod be;
pub mod frame;
pub mod text;
pub mod xor;

/// Errors shared by the codec utilities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer truncated at offset {offset}: wanted {wanted} bytes, {available} available")]
    Truncated {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("unknown framing tag {0}")]
    UnknownTag(u8),

    #[error("frame length {length} overflows the remaining {available} bytes")]
    FrameOverflow { length: u64, available: usize },
}
