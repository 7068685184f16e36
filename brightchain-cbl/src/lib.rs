//! Constituent block lists
//!
//! A CBL is the signed recipe for reconstructing a file from an
//! owner-free block store: creator identity, file metadata, and the
//! ordered list of block addresses. This crate holds:
//!
//! * [`header`]: the byte-exact binary header codec (base + optional
//!   extended fields) and its signature scheme
//! * [`capacity`]: how many 32-byte addresses fit in a block of a given
//!   size, shape and encryption mode
//! * [`model`]: the logical CBL variants: legacy JSON, regular binary,
//!   sub and super manifests
//! * [`whiten`]: storing a CBL as an XOR pair so the manifest itself is
//!   owner-free
//! * [`hierarchy`]: recursive Super-CBL splitting and reconstruction
//! * [`ingest`]: the end-to-end file pipeline, from chunking to the
//!   final magnet URL

use brightchain_codec::CodecError;
use brightchain_store::StoreError;
use thiserror::Error;

pub mod capacity;
pub mod creator;
pub mod fields;
pub mod header;
pub mod hierarchy;
pub mod ingest;
pub mod model;
pub mod whiten;

pub use capacity::EncryptionMode;
pub use creator::{Creator, CreatorId};
pub use header::{CblHeader, ExtendedHeader, ParsedCbl};
pub use hierarchy::HierarchyConfig;
pub use ingest::{FilePipeline, IngestOptions, IngestResult};
pub use model::{CblData, LegacyCbl, RegularCbl, SubCbl, SuperCbl};
pub use whiten::{WhitenedCbl, WhitenedCblStore};

/// Errors surfaced by the CBL codec and services.
#[derive(Debug, Error)]
pub enum CblError {
    #[error("the buffer is encrypted; only `is_encrypted` can be answered")]
    Encrypted,

    #[error("creator signature does not verify")]
    InvalidSignature,

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("maximum manifest depth exceeded: reached {current}, cap {max}")]
    MaxDepthExceeded { current: u32, max: u32 },

    #[error("sub-CBL at `{url}` could not be retrieved: {cause}")]
    MissingSubCbl { url: String, cause: String },

    #[error("unknown CBL type `{0}`")]
    InvalidCblType(String),

    #[error("invalid CBL format: {0}")]
    InvalidCblFormat(String),

    #[error("block count mismatch: expected {expected}, actual {actual}")]
    BlockCountMismatch { expected: u64, actual: u64 },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CblError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
