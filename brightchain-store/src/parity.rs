//! Parity shards for single blocks.
//!
//! A block is treated as one data shard; its durability level decides how
//! many parity shards ride alongside it. Shards live in the store's
//! parity map keyed by the block they protect and are deleted with it.

use brightchain_crypto::hash::Hasher;
use brightchain_fec::ReedSolomon;

use crate::{BlockId, BlockSize, RawDataBlock, StoreError};

/// One parity shard protecting a specific block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityShard {
    pub data: Vec<u8>,
    pub index: u32,
    pub for_block: BlockId,
}

impl ParityShard {
    /// content address of the shard bytes, recorded in the owning
    /// block's metadata
    pub fn id(&self) -> BlockId {
        Hasher::<256>::hash(&self.data)
    }
}

/// derive `parity_count` shards for the block, each `block_size` bytes
pub fn create_parity_blocks(
    block: &RawDataBlock,
    parity_count: usize,
) -> Result<Vec<ParityShard>, StoreError> {
    if parity_count == 0 {
        return Ok(Vec::new());
    }

    let shard_size = block.block_size().size();
    let coder = ReedSolomon::new(1, parity_count)?;
    let encoded = coder.encode(block.data(), shard_size, true)?;

    let shards = encoded[shard_size..]
        .chunks(shard_size)
        .enumerate()
        .map(|(index, chunk)| ParityShard {
            data: chunk.to_vec(),
            index: index as u32,
            for_block: block.id(),
        })
        .collect();

    Ok(shards)
}

/// reconstruct the block bytes from whatever survives.
///
/// `data` carries the block bytes when they still exist (they then win
/// outright); with `None` the shards alone must reach the decode
/// threshold.
pub fn recover_data_block(
    block_size: BlockSize,
    data: Option<&[u8]>,
    parity: &[ParityShard],
) -> Result<Vec<u8>, StoreError> {
    let shard_size = block_size.size();
    let parity_count = parity
        .iter()
        .map(|s| s.index as usize + 1)
        .max()
        .unwrap_or(0);

    let total = 1 + parity_count;
    let mut shards = vec![0u8; total * shard_size];
    let mut available = vec![false; total];

    if let Some(bytes) = data {
        shards[..shard_size].copy_from_slice(bytes);
        available[0] = true;
    }
    for shard in parity {
        let slot = 1 + shard.index as usize;
        shards[slot * shard_size..(slot + 1) * shard_size].copy_from_slice(&shard.data);
        available[slot] = true;
    }

    let coder = ReedSolomon::new(1, parity_count)?;
    let recovered = coder.decode(&shards, shard_size, &available)?;

    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockDataType, BlockType};

    fn block() -> RawDataBlock {
        let mut data = vec![0u8; BlockSize::Tiny.size()];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        RawDataBlock::new(
            BlockSize::Tiny,
            data,
            BlockType::RawData,
            BlockDataType::RawData,
        )
        .unwrap()
    }

    #[test]
    fn shard_count_matches_request() {
        let block = block();
        let shards = create_parity_blocks(&block, 3).unwrap();
        assert_eq!(shards.len(), 3);
        for (i, shard) in shards.iter().enumerate() {
            assert_eq!(shard.index, i as u32);
            assert_eq!(shard.for_block, block.id());
            assert_eq!(shard.data.len(), BlockSize::Tiny.size());
        }
    }

    #[test]
    fn zero_parity_is_empty() {
        assert!(create_parity_blocks(&block(), 0).unwrap().is_empty());
    }

    #[test]
    fn recovery_without_the_data_block() {
        let block = block();
        let shards = create_parity_blocks(&block, 3).unwrap();

        let recovered = recover_data_block(BlockSize::Tiny, None, &shards).unwrap();
        assert_eq!(recovered, block.data());
    }

    #[test]
    fn recovery_with_partial_shards() {
        let block = block();
        let mut shards = create_parity_blocks(&block, 3).unwrap();
        shards.remove(0);
        shards.remove(0);

        let recovered = recover_data_block(BlockSize::Tiny, None, &shards).unwrap();
        assert_eq!(recovered, block.data());
    }

    #[test]
    fn nothing_to_recover_from() {
        let result = recover_data_block(BlockSize::Tiny, None, &[]);
        assert!(matches!(
            result,
            Err(StoreError::Fec(
                brightchain_fec::FecError::NotEnoughShards { .. }
            ))
        ));
    }
}
