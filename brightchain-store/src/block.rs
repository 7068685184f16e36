//! Block primitives: sizes, kinds and the raw block value.

use std::fmt;
use std::sync::Arc;

use brightchain_crypto::hash::Hasher;
use serde::{Deserialize, Serialize};

use crate::{now_millis, BlockId, StoreError};

/// The finite set of wire sizes a store can be opened at.
///
/// Every block of a store occupies exactly this many bytes; payloads are
/// padded up and trimmed back by the framing / manifest layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlockSize {
    /// 512 B, participant messages and tiny manifests
    Message,
    /// 1 KiB
    Tiny,
    /// 4 KiB
    Small,
    /// 16 KiB
    Medium,
    /// 64 KiB
    Large,
    /// 1 MiB
    Huge,
}

impl BlockSize {
    pub const ALL: [BlockSize; 6] = [
        BlockSize::Message,
        BlockSize::Tiny,
        BlockSize::Small,
        BlockSize::Medium,
        BlockSize::Large,
        BlockSize::Huge,
    ];

    /// the wire size in bytes
    pub const fn size(self) -> usize {
        match self {
            BlockSize::Message => 512,
            BlockSize::Tiny => 1024,
            BlockSize::Small => 4096,
            BlockSize::Medium => 16384,
            BlockSize::Large => 65536,
            BlockSize::Huge => 1048576,
        }
    }

    /// map an exact byte count back to its enumerated size
    pub fn from_size(size: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.size() == size)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.size())
    }
}

impl TryFrom<u32> for BlockSize {
    type Error = StoreError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_size(value as usize)
            .ok_or_else(|| StoreError::validation(format!("`{value}` is not a block size")))
    }
}

/// What role a block plays in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    /// an ingested data chunk
    #[default]
    RawData,
    /// CSPRNG filler minted as whitening material
    Random,
    /// the XOR combination of a source block with randomizers
    Brightened,
    /// a stored (whitened) constituent block list
    ConstituentBlockList,
}

/// What the payload bytes mean to whoever stored them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockDataType {
    #[default]
    RawData,
    WhitenedData,
    ManifestData,
}

/// A block as the store owns it: exactly `block_size` bytes addressed by
/// their SHA3-256 digest.
///
/// Invariant: `id == SHA3-256(data)` and `data.len() == block_size.size()`,
/// established at construction and checkable later with [`Self::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataBlock {
    block_size: BlockSize,
    data: Vec<u8>,
    created_at: u64,
    id: BlockId,
    block_type: BlockType,
    data_type: BlockDataType,
}

/// A shared, lightweight reference to a stored block; never owns the
/// bytes' lifecycle.
pub type BlockHandle = Arc<RawDataBlock>;

impl RawDataBlock {
    /// take ownership of `data`, deriving the content address.
    ///
    /// Fails with `ValidationFailed` when the payload is not exactly the
    /// wire size.
    pub fn new(
        block_size: BlockSize,
        data: Vec<u8>,
        block_type: BlockType,
        data_type: BlockDataType,
    ) -> Result<Self, StoreError> {
        if data.len() != block_size.size() {
            return Err(StoreError::validation(format!(
                "payload of {} bytes does not fill a {} byte block",
                data.len(),
                block_size
            )));
        }

        let id = Hasher::<256>::hash(&data);
        Ok(Self {
            block_size,
            data,
            created_at: now_millis(),
            id,
            block_type,
            data_type,
        })
    }

    /// rebuild a block from persisted parts, trusting the stored
    /// timestamp and kinds but re-deriving the id
    pub(crate) fn from_parts(
        block_size: BlockSize,
        data: Vec<u8>,
        created_at: u64,
        block_type: BlockType,
        data_type: BlockDataType,
    ) -> Self {
        let id = Hasher::<256>::hash(&data);
        Self {
            block_size,
            data,
            created_at,
            id,
            block_type,
            data_type,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn data_type(&self) -> BlockDataType {
        self.data_type
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// re-derive the content address and compare against the id
    pub fn verify(&self) -> Result<(), StoreError> {
        let actual = Hasher::<256>::hash(&self.data);
        if actual != self.id {
            return Err(StoreError::ChecksumMismatch {
                expected: self.id,
                actual,
            });
        }
        Ok(())
    }
}
