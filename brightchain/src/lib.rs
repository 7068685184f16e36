//! Rust-native building blocks for the BrightChain owner-free block store
//!
//! BrightChain stores files as fixed-size, content-addressed blocks that
//! are XOR-whitened so no stored block is intelligible on its own, with
//! signed constituent block lists recording the recipe for
//! reconstruction. This crate doesn't provide any particular
//! application; it re-exports the member crates as a base layer for
//! nodes, gateways and tooling.

#[doc(inline)]
pub use brightchain_crypto as crypto;

#[doc(inline)]
pub use brightchain_codec as codec;

#[doc(inline)]
pub use brightchain_fec as fec;

#[doc(inline)]
pub use brightchain_magnet as magnet;

#[doc(inline)]
pub use brightchain_store as store;

#[doc(inline)]
pub use brightchain_cbl as cbl;
