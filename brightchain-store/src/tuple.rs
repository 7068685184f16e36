//! Whitened storage of arbitrary payloads as 3-block XOR tuples.
//!
//! Any payload up to the block size is zero-padded, combined with two
//! fresh randomizer blocks, and stored as `(S, R1, R2)` where
//! `S = padded ^ R1 ^ R2`. Only the caller's manifest knows which three
//! blocks belong together; no stored block is intelligible on its own.

use std::sync::Arc;

use brightchain_codec::xor;
use brightchain_magnet::TupleMagnet;
use tracing::{debug, warn};

use crate::persistence::{BlockPersistence, MetadataPersistence};
use crate::store::{BlockStore, PutOptions};
use crate::{BlockDataType, BlockId, BlockType, DurabilityLevel, RawDataBlock, StoreError};

/// Outcome of a tuple store: the three block ids, their optional parity
/// ids, and the magnet URL naming them all.
#[derive(Debug, Clone)]
pub struct StoredTuple {
    pub data_block_id: BlockId,
    pub randomizer_block_ids: [BlockId; 2],
    pub parity_block_ids: Option<[Vec<BlockId>; 3]>,
    pub magnet: TupleMagnet,
}

/// The tuple service over a shared block store.
pub struct TupleStorage<P, M> {
    store: Arc<BlockStore<P, M>>,
}

impl<P, M> TupleStorage<P, M>
where
    P: BlockPersistence,
    M: MetadataPersistence,
{
    pub fn new(store: Arc<BlockStore<P, M>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &BlockStore<P, M> {
        &self.store
    }

    /// whiten and store a payload of at most one block.
    ///
    /// The payload length is not recorded here; the caller's manifest
    /// carries it and trims after retrieval.
    pub async fn store_payload(
        &self,
        payload: &[u8],
        durability: DurabilityLevel,
    ) -> Result<StoredTuple, StoreError> {
        let block_size = self.store.block_size().size();
        if payload.len() > block_size {
            return Err(StoreError::validation(format!(
                "payload of {} bytes exceeds the {} byte block size",
                payload.len(),
                block_size
            )));
        }

        let mut padded = payload.to_vec();
        padded.resize(block_size, 0);

        // two fresh randomizers; the whitened block is the only one whose
        // content depends on the payload
        let mut rng = rand::rng();
        let r1 = brightchain_crypto::random_bytes(&mut rng, block_size);
        let r2 = brightchain_crypto::random_bytes(&mut rng, block_size);
        drop(rng);

        let mut whitened = padded;
        xor::xor_in_place(&mut whitened, &r1)?;
        xor::xor_in_place(&mut whitened, &r2)?;

        let data_block = RawDataBlock::new(
            self.store.block_size(),
            whitened,
            BlockType::Brightened,
            BlockDataType::WhitenedData,
        )?;
        let r1_block = RawDataBlock::new(
            self.store.block_size(),
            r1,
            BlockType::Random,
            BlockDataType::RawData,
        )?;
        let r2_block = RawDataBlock::new(
            self.store.block_size(),
            r2,
            BlockType::Random,
            BlockDataType::RawData,
        )?;

        let options = PutOptions {
            durability,
            ..PutOptions::default()
        };

        let data_block_id = self.store.set_data(data_block, options.clone()).await?;

        let r1_id = match self.store.set_data(r1_block, options.clone()).await {
            Ok(id) => id,
            Err(err) => {
                self.cleanup(&[data_block_id]).await;
                return Err(err);
            }
        };
        let r2_id = match self.store.set_data(r2_block, options.clone()).await {
            Ok(id) => id,
            Err(err) => {
                self.cleanup(&[data_block_id, r1_id]).await;
                return Err(err);
            }
        };

        let parity_block_ids = if durability.parity_count() > 0 {
            Some([
                self.store.get_parity_blocks(&data_block_id).await?,
                self.store.get_parity_blocks(&r1_id).await?,
                self.store.get_parity_blocks(&r2_id).await?,
            ])
        } else {
            None
        };

        let magnet = TupleMagnet {
            block_size: block_size as u32,
            data: data_block_id,
            randomizer1: r1_id,
            randomizer2: r2_id,
            parity_data: parity_block_ids
                .as_ref()
                .map(|p| p[0].clone())
                .unwrap_or_default(),
            parity_randomizer1: parity_block_ids
                .as_ref()
                .map(|p| p[1].clone())
                .unwrap_or_default(),
            parity_randomizer2: parity_block_ids
                .as_ref()
                .map(|p| p[2].clone())
                .unwrap_or_default(),
        };

        debug!(data = %data_block_id, r1 = %r1_id, r2 = %r2_id, "tuple stored");
        Ok(StoredTuple {
            data_block_id,
            randomizer_block_ids: [r1_id, r2_id],
            parity_block_ids,
            magnet,
        })
    }

    /// fetch the three tuple blocks (recovering from parity when needed)
    /// and XOR them back into the padded payload.
    ///
    /// The caller trims the zero padding with its own length metadata.
    pub async fn retrieve(&self, magnet: &TupleMagnet) -> Result<Vec<u8>, StoreError> {
        if magnet.block_size as usize != self.store.block_size().size() {
            return Err(StoreError::validation(format!(
                "magnet block size {} does not match the {} store",
                magnet.block_size,
                self.store.block_size()
            )));
        }

        let data = self.store.get_data_or_recover(&magnet.data).await?;
        let r1 = self.store.get_data_or_recover(&magnet.randomizer1).await?;
        let r2 = self.store.get_data_or_recover(&magnet.randomizer2).await?;

        let mut payload = data.data().to_vec();
        xor::xor_in_place(&mut payload, r1.data())?;
        xor::xor_in_place(&mut payload, r2.data())?;

        Ok(payload)
    }

    /// best-effort removal of blocks from a partially applied tuple
    async fn cleanup(&self, ids: &[BlockId]) {
        for id in ids {
            if let Err(err) = self.store.delete_data(id).await {
                warn!(%id, ?err, "tuple rollback delete failed");
            }
        }
    }
}
