//! Whitened CBL storage.
//!
//! The manifest itself must be as owner-free as the blocks it names, so
//! a CBL buffer is length-framed, padded to the block size, XOR-combined
//! with a randomizer block and stored as the pair `(R, C)` where
//! `C = padded ^ R`. Either block alone is noise; the magnet URL names
//! both.

use std::sync::Arc;

use brightchain_codec::{frame, xor};
use brightchain_magnet::{BlockId, CblMagnet};
use brightchain_store::persistence::{BlockPersistence, MetadataPersistence};
use brightchain_store::{
    BlockDataType, BlockStore, BlockType, DurabilityLevel, PutOptions, RandomizerPolicy,
    RawDataBlock, StoreError,
};
use tracing::{debug, warn};

use crate::CblError;

/// Outcome of storing a whitened CBL.
#[derive(Debug, Clone)]
pub struct WhitenedCbl {
    /// the randomizer block
    pub block_id1: BlockId,
    /// the XOR-combined block
    pub block_id2: BlockId,
    pub block1_parity_ids: Vec<BlockId>,
    pub block2_parity_ids: Vec<BlockId>,
    pub is_encrypted: bool,
    pub magnet: CblMagnet,
}

/// The whitening layer over a shared block store.
pub struct WhitenedCblStore<P, M> {
    store: Arc<BlockStore<P, M>>,
}

impl<P, M> WhitenedCblStore<P, M>
where
    P: BlockPersistence,
    M: MetadataPersistence,
{
    pub fn new(store: Arc<BlockStore<P, M>>) -> Self {
        Self { store }
    }

    pub fn block_store(&self) -> &BlockStore<P, M> {
        &self.store
    }

    /// store a CBL buffer as an XOR pair, returning the magnet URL that
    /// names it.
    ///
    /// `encrypted` is carried into the magnet as `enc=1`; the cipher
    /// itself is external and the buffer is treated as opaque either
    /// way.
    pub async fn store_cbl(
        &self,
        cbl: &[u8],
        durability: DurabilityLevel,
        encrypted: bool,
    ) -> Result<WhitenedCbl, CblError> {
        let block_size = self.store.block_size().size();

        let mut padded = frame::encode(cbl);
        if padded.len() > block_size {
            return Err(StoreError::ValidationFailed {
                reason: format!(
                    "framed CBL of {} bytes exceeds the {block_size} byte block size",
                    padded.len()
                ),
            }
            .into());
        }
        padded.resize(block_size, 0);

        // prefer an existing block as the randomizer; mint only when the
        // corpus has nothing to offer and policy allows
        let (randomizer, fresh) = self.select_randomizer(block_size, durability).await?;

        xor::xor_in_place(&mut padded, randomizer.data())?;
        let combined = RawDataBlock::new(
            self.store.block_size(),
            padded,
            BlockType::ConstituentBlockList,
            BlockDataType::WhitenedData,
        )
        .map_err(CblError::Store)?;

        let options = PutOptions {
            durability,
            ..PutOptions::default()
        };
        let block_id2 = match self.store.set_data(combined, options).await {
            Ok(id) => id,
            Err(err) => {
                // the pair is useless half-stored; drop a freshly minted
                // randomizer, never a reused block
                if fresh {
                    if let Err(cleanup) = self.store.delete_data(&randomizer.id()).await {
                        warn!(id = %randomizer.id(), ?cleanup, "whitening rollback failed");
                    }
                }
                return Err(err.into());
            }
        };

        let parity_count = durability.parity_count();
        let (block1_parity_ids, block2_parity_ids) = if parity_count > 0 {
            let p1 = self.store.get_parity_blocks(&randomizer.id()).await?;
            let p1 = if p1.is_empty() {
                self.store
                    .generate_parity_blocks(&randomizer.id(), parity_count)
                    .await?
            } else {
                p1
            };
            let p2 = self.store.get_parity_blocks(&block_id2).await?;
            (p1, p2)
        } else {
            (Vec::new(), Vec::new())
        };

        let magnet = CblMagnet {
            block_size: block_size as u32,
            block1: randomizer.id(),
            block2: block_id2,
            parity1: block1_parity_ids.clone(),
            parity2: block2_parity_ids.clone(),
            encrypted,
        };

        debug!(b1 = %randomizer.id(), b2 = %block_id2, "whitened CBL stored");
        Ok(WhitenedCbl {
            block_id1: randomizer.id(),
            block_id2,
            block1_parity_ids,
            block2_parity_ids,
            is_encrypted: encrypted,
            magnet,
        })
    }

    /// fetch the pair, XOR the CBL back out and strip the framing.
    ///
    /// XOR is commutative, so the two ids work in either order; parity
    /// recovery is attempted on each fetch that misses.
    pub async fn retrieve_cbl(&self, magnet: &CblMagnet) -> Result<Vec<u8>, CblError> {
        if magnet.block_size as usize != self.store.block_size().size() {
            return Err(StoreError::ValidationFailed {
                reason: format!(
                    "magnet block size {} does not match the {} store",
                    magnet.block_size,
                    self.store.block_size()
                ),
            }
            .into());
        }

        let first = self.store.get_data_or_recover(&magnet.block1).await?;
        let second = self.store.get_data_or_recover(&magnet.block2).await?;

        let combined = xor::xor(first.data(), second.data())?;
        let decoded = frame::decode(&combined)?;
        Ok(decoded.payload.to_vec())
    }

    async fn select_randomizer(
        &self,
        block_size: usize,
        durability: DurabilityLevel,
    ) -> Result<(brightchain_store::BlockHandle, bool), CblError> {
        let existing = self.store.get_random_blocks(1).await?;
        if let Some(id) = existing.first() {
            return Ok((self.store.get_data(id).await?, false));
        }

        match self.store.randomizer_policy() {
            RandomizerPolicy::RequireExisting => Err(StoreError::InsufficientRandomBlocks {
                requested: 1,
                available: 0,
            }
            .into()),
            RandomizerPolicy::ReuseOrGenerate => {
                let bytes = {
                    let mut rng = rand::rng();
                    brightchain_crypto::random_bytes(&mut rng, block_size)
                };
                let block = RawDataBlock::new(
                    self.store.block_size(),
                    bytes,
                    BlockType::Random,
                    BlockDataType::RawData,
                )
                .map_err(CblError::Store)?;
                let handle = Arc::new(block.clone());

                let options = PutOptions {
                    durability,
                    block_type: BlockType::Random,
                    ..PutOptions::default()
                };
                self.store.set_data(block, options).await?;
                Ok((handle, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brightchain_store::{BlockSize, MemoryBlockStore};

    fn layer() -> WhitenedCblStore<
        brightchain_store::MemoryBlockPersistence,
        brightchain_store::MemoryMetadataPersistence,
    > {
        WhitenedCblStore::new(Arc::new(MemoryBlockStore::in_memory(BlockSize::Tiny)))
    }

    #[tokio::test]
    async fn round_trip_on_empty_store() {
        let layer = layer();
        let cbl = b"pretend this is a binary manifest".to_vec();

        let stored = layer
            .store_cbl(&cbl, DurabilityLevel::Ephemeral, false)
            .await
            .unwrap();
        assert_ne!(stored.block_id1, stored.block_id2);

        let retrieved = layer.retrieve_cbl(&stored.magnet).await.unwrap();
        assert_eq!(retrieved, cbl);
    }

    #[tokio::test]
    async fn pair_order_does_not_matter() {
        let layer = layer();
        let cbl = vec![7u8; 300];

        let stored = layer
            .store_cbl(&cbl, DurabilityLevel::Ephemeral, false)
            .await
            .unwrap();

        let mut swapped = stored.magnet.clone();
        std::mem::swap(&mut swapped.block1, &mut swapped.block2);

        assert_eq!(layer.retrieve_cbl(&swapped).await.unwrap(), cbl);
    }

    #[tokio::test]
    async fn reuses_an_existing_block_as_randomizer() {
        let layer = layer();

        // seed the corpus with one block
        let seed = vec![0x11u8; BlockSize::Tiny.size()];
        let seed_id = layer
            .block_store()
            .put(seed, PutOptions::default())
            .await
            .unwrap();

        let stored = layer
            .store_cbl(b"manifest", DurabilityLevel::Ephemeral, false)
            .await
            .unwrap();

        // OFF-system reuse: the only candidate randomizer was the seed
        assert_eq!(stored.block_id1, seed_id);
        assert_eq!(
            layer.retrieve_cbl(&stored.magnet).await.unwrap(),
            b"manifest"
        );
    }

    #[tokio::test]
    async fn require_existing_policy_fails_on_empty_corpus() {
        let layer = WhitenedCblStore::new(Arc::new(MemoryBlockStore::in_memory_with_policy(
            BlockSize::Tiny,
            brightchain_store::RandomizerPolicy::RequireExisting,
        )));

        let result = layer
            .store_cbl(b"manifest", DurabilityLevel::Ephemeral, false)
            .await;
        assert!(matches!(
            result,
            Err(CblError::Store(StoreError::InsufficientRandomBlocks {
                requested: 1,
                available: 0
            }))
        ));
    }

    #[tokio::test]
    async fn oversized_manifest_rejected() {
        let layer = layer();
        let too_big = vec![0u8; BlockSize::Tiny.size()];
        // framing overhead pushes a full-block payload over the limit
        assert!(matches!(
            layer
                .store_cbl(&too_big, DurabilityLevel::Ephemeral, false)
                .await,
            Err(CblError::Store(StoreError::ValidationFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn durability_attaches_parity_to_the_pair() {
        let layer = layer();

        let stored = layer
            .store_cbl(b"precious manifest", DurabilityLevel::High, false)
            .await
            .unwrap();
        assert_eq!(stored.block1_parity_ids.len(), 3);
        assert_eq!(stored.block2_parity_ids.len(), 3);
        assert_eq!(stored.magnet.parity1.len(), 3);

        // the ids recorded in metadata are the ones the magnet names
        let recorded = layer
            .block_store()
            .get_parity_blocks(&stored.block_id2)
            .await
            .unwrap();
        assert_eq!(recorded, stored.block2_parity_ids);
    }

    #[tokio::test]
    async fn encryption_flag_is_carried() {
        let layer = layer();
        let stored = layer
            .store_cbl(b"ciphertext", DurabilityLevel::Ephemeral, true)
            .await
            .unwrap();
        assert!(stored.is_encrypted);
        assert!(stored.magnet.encrypted);
        assert!(stored.magnet.to_string().ends_with("&enc=1"));
    }
}
