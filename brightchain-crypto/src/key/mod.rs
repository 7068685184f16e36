//! Asymmetric keys for signing constituent block lists
//!
//! Only plain Ed25519 keys are needed: a creator signs the CBL header and
//! address list, and any holder of the public key can verify the manifest
//! was not tampered with.

pub mod ed25519;
