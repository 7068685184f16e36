//! Content addressing for BrightChain blocks
//!
//! we expose two helper objects:
//!
//! * [`Hasher`] to help streaming bytes into a hasher and computing the
//!   digest without intermediate allocations
//! * [`struct@Hash`] a conveniently strongly typed byte array
//!
//! The algorithm exposed here is `SHA3`. Block identity is always the
//! 256-bit digest (32 bytes); the 224 and 512 bit variants exist for
//! interop with member documents and external checksums.
//!
//! # Example
//!
//! ```
//! use brightchain_crypto::hash::Hasher;
//!
//! let mut hasher = Hasher::<256>::new();
//! hasher.input(b"abc");
//!
//! let digest = hasher.finalize();
//! # assert_eq!(
//! #   "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532",
//! #   hex::encode(digest)
//! # );
//! ```

#[allow(clippy::module_inception)]
mod hash;
mod hasher;
mod serde;

pub use self::{hash::Hash, hasher::Hasher};
