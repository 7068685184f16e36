//! The BrightChain owner-free block store
//!
//! A store holds fixed-size blocks addressed by the SHA3-256 digest of
//! their bytes. Around that core this crate layers:
//!
//! * [`metadata`]: per-block records: expiry, durability, access
//!   tracking, replication status
//! * [`persistence`]: the abstract block / metadata backends plus the
//!   in-memory and on-disk implementations
//! * [`store`]: the [`store::BlockStore`] itself: idempotent puts,
//!   random sampling, brightening, parity protection and recovery
//! * [`tuple`]: whitened storage of arbitrary payloads as 3-block XOR
//!   tuples
//! * [`pool`]: optional namespacing of the storage key space
//!
//! Public operations are `async` so that disk-backed deployments can
//! suspend; the in-memory backend computes synchronously inside them.

use brightchain_codec::CodecError;
use brightchain_fec::FecError;
use thiserror::Error;

pub mod block;
pub mod metadata;
pub mod parity;
pub mod persistence;
pub mod pool;
pub mod store;
pub mod tuple;

pub use block::{BlockDataType, BlockHandle, BlockSize, BlockType, RawDataBlock};
pub use brightchain_magnet::BlockId;
pub use metadata::{BlockMetadata, DurabilityLevel, MetadataStore, ReplicationStatus};
pub use parity::ParityShard;
pub use persistence::{
    BlockPersistence, FsBlockPersistence, FsMetadataPersistence, MemoryBlockPersistence,
    MemoryMetadataPersistence, MetadataPersistence,
};
pub use store::{
    BlockStore, BrightenResult, MemoryBlockStore, PutOptions, RandomizerPolicy, RecoverResult,
};
pub use tuple::{StoredTuple, TupleStorage};

/// Errors surfaced by the block store and its services.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block `{key}` not found")]
    NotFound { key: BlockId },

    #[error("metadata for `{key}` already exists")]
    AlreadyExists { key: BlockId },

    #[error("validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("checksum mismatch: expected {expected}, actual {actual}")]
    ChecksumMismatch { expected: BlockId, actual: BlockId },

    #[error("insufficient random blocks: requested {requested}, available {available}")]
    InsufficientRandomBlocks { requested: usize, available: usize },

    #[error("persistence failure: {0}")]
    Io(String),

    #[error(transparent)]
    Fec(#[from] FecError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }
}

/// milliseconds since the unix epoch, the timestamp unit of every record
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
