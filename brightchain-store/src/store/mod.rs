//! The block store proper.
//!
//! All mutation funnels through the store: it is the single writer over
//! its persistence backends, and multi-step writes are staged into a
//! [`WriteBatch`] whose compensations run in reverse order when a later
//! step fails, leaving the store unchanged.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use brightchain_codec::xor;
use brightchain_crypto::hash::Hasher;
use rand::{CryptoRng, Rng};
use tracing::{debug, warn};

use crate::metadata::MetadataStore;
use crate::parity::{self, ParityShard};
use crate::persistence::{
    BlockPersistence, MemoryBlockPersistence, MemoryMetadataPersistence, MetadataPersistence,
};
use crate::{
    BlockDataType, BlockHandle, BlockId, BlockMetadata, BlockSize, BlockType, DurabilityLevel,
    RawDataBlock, ReplicationStatus, StoreError,
};


/// What the store does when a whitening caller wants more randomizers
/// than the corpus can provide.
///
/// Reuse is preferred in either mode: existing blocks multiply plausible
/// deniability. The policies differ only on the empty-corpus fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RandomizerPolicy {
    /// prefer existing blocks, mint fresh CSPRNG blocks for any shortfall
    #[default]
    ReuseOrGenerate,
    /// never mint; fail with `InsufficientRandomBlocks` on shortfall
    RequireExisting,
}

/// Options attached to a `put`.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub durability: DurabilityLevel,
    pub expires_at: Option<u64>,
    pub target_replication_factor: u32,
    pub pool: Option<String>,
    pub block_type: BlockType,
    pub data_type: BlockDataType,
}

/// Outcome of [`BlockStore::brighten_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrightenResult {
    pub brightened_block_id: BlockId,
    pub random_block_ids: Vec<BlockId>,
    pub original_block_id: BlockId,
}

/// Outcome of [`BlockStore::recover_block`].
#[derive(Debug, Clone)]
pub struct RecoverResult {
    pub success: bool,
    pub recovered_block: Option<BlockHandle>,
}

struct Inner<P, M> {
    blocks: P,
    metadata: MetadataStore<M>,
    parity: HashMap<BlockId, Vec<ParityShard>>,
}

/// A staged multi-step write.
///
/// Writes apply in order; the first failure rolls the already-applied
/// prefix back in reverse so the store observes all of the batch or none
/// of it.
#[derive(Default)]
struct WriteBatch {
    staged: Vec<StagedWrite>,
}

enum StagedWrite {
    Block { id: BlockId, bytes: Vec<u8> },
    Metadata(BlockMetadata),
}

impl WriteBatch {
    fn stage_block(&mut self, id: BlockId, bytes: Vec<u8>) {
        self.staged.push(StagedWrite::Block { id, bytes });
    }

    fn stage_metadata(&mut self, record: BlockMetadata) {
        self.staged.push(StagedWrite::Metadata(record));
    }

    fn apply<P, M>(self, inner: &mut Inner<P, M>) -> Result<(), StoreError>
    where
        P: BlockPersistence,
        M: MetadataPersistence,
    {
        for (applied, write) in self.staged.iter().enumerate() {
            let result = match write {
                StagedWrite::Block { id, bytes } => inner.blocks.put(*id, bytes.clone()),
                StagedWrite::Metadata(record) => inner.metadata.create(record.clone()),
            };

            if let Err(err) = result {
                for write in self.staged[..applied].iter().rev() {
                    let compensation = match write {
                        StagedWrite::Block { id, .. } => inner.blocks.delete(id).map(|_| ()),
                        StagedWrite::Metadata(record) => inner.metadata.delete(&record.block_id),
                    };
                    if let Err(rollback_err) = compensation {
                        warn!(?rollback_err, "rollback step failed, store may hold partial batch");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Content-addressed block store over abstract persistence.
///
/// Public operations are `async` to accommodate disk-backed backends; the
/// in-memory store computes synchronously inside them.
pub struct BlockStore<P, M> {
    block_size: BlockSize,
    randomizer_policy: RandomizerPolicy,
    inner: RwLock<Inner<P, M>>,
}

/// the all-in-memory store used by tests and single-process nodes
pub type MemoryBlockStore = BlockStore<MemoryBlockPersistence, MemoryMetadataPersistence>;

impl MemoryBlockStore {
    pub fn in_memory(block_size: BlockSize) -> Self {
        Self::new(
            block_size,
            MemoryBlockPersistence::default(),
            MemoryMetadataPersistence::default(),
            RandomizerPolicy::default(),
        )
    }

    pub fn in_memory_with_policy(block_size: BlockSize, policy: RandomizerPolicy) -> Self {
        Self::new(
            block_size,
            MemoryBlockPersistence::default(),
            MemoryMetadataPersistence::default(),
            policy,
        )
    }
}

impl<P, M> BlockStore<P, M>
where
    P: BlockPersistence,
    M: MetadataPersistence,
{
    pub fn new(block_size: BlockSize, blocks: P, metadata: M, policy: RandomizerPolicy) -> Self {
        Self {
            block_size,
            randomizer_policy: policy,
            inner: RwLock::new(Inner {
                blocks,
                metadata: MetadataStore::new(metadata),
                parity: HashMap::new(),
            }),
        }
    }

    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    pub fn randomizer_policy(&self) -> RandomizerPolicy {
        self.randomizer_policy
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<P, M>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<P, M>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /* lookups ************************************************************* */

    pub async fn has(&self, id: &BlockId) -> Result<bool, StoreError> {
        self.read().blocks.has(id)
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        self.read().blocks.len()
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        self.read().blocks.is_empty()
    }

    pub async fn metadata(&self, id: &BlockId) -> Result<BlockMetadata, StoreError> {
        self.read().metadata.get(id)
    }

    /// fetch a block, bumping its access statistics
    pub async fn get_data(&self, id: &BlockId) -> Result<BlockHandle, StoreError> {
        let mut inner = self.write();
        Self::get_data_locked(&mut inner, self.block_size, id)
    }

    /// fetch with the single local parity-recovery attempt the retrieval
    /// paths rely on
    pub async fn get_data_or_recover(&self, id: &BlockId) -> Result<BlockHandle, StoreError> {
        let fetched = {
            let mut inner = self.write();
            Self::get_data_locked(&mut inner, self.block_size, id)
        };

        match fetched {
            Ok(block) => Ok(block),
            Err(err @ (StoreError::NotFound { .. } | StoreError::ChecksumMismatch { .. })) => {
                debug!(%id, "raw fetch failed, attempting parity recovery");
                let recovered = self.recover_block(id).await?;
                match recovered.recovered_block {
                    Some(block) if recovered.success => Ok(block),
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn get_data_locked(
        inner: &mut Inner<P, M>,
        block_size: BlockSize,
        id: &BlockId,
    ) -> Result<BlockHandle, StoreError> {
        let bytes = inner
            .blocks
            .get(id)?
            .ok_or(StoreError::NotFound { key: *id })?;

        let actual = Hasher::<256>::hash(&bytes);
        if actual != *id {
            return Err(StoreError::ChecksumMismatch {
                expected: *id,
                actual,
            });
        }

        let record = inner.metadata.try_get(id)?;
        if record.is_some() {
            inner.metadata.record_access(id)?;
        }

        let (created_at, block_type, data_type) = record
            .map(|r| (r.created_at, r.block_type, r.data_type))
            .unwrap_or((crate::now_millis(), BlockType::default(), BlockDataType::default()));

        Ok(Arc::new(RawDataBlock::from_parts(
            block_size, bytes, created_at, block_type, data_type,
        )))
    }

    /* writes ************************************************************** */

    /// store a payload as a block, deriving its content address.
    ///
    /// Idempotent: putting bytes that are already present leaves the
    /// store untouched and returns the existing id.
    pub async fn put(&self, data: Vec<u8>, options: PutOptions) -> Result<BlockId, StoreError> {
        let block = RawDataBlock::new(
            self.block_size,
            data,
            options.block_type,
            options.data_type,
        )?;
        self.set_data(block, options).await
    }

    /// store an already-constructed block
    pub async fn set_data(
        &self,
        block: RawDataBlock,
        options: PutOptions,
    ) -> Result<BlockId, StoreError> {
        let mut inner = self.write();
        self.set_data_locked(&mut inner, block, &options)
    }

    fn set_data_locked(
        &self,
        inner: &mut Inner<P, M>,
        block: RawDataBlock,
        options: &PutOptions,
    ) -> Result<BlockId, StoreError> {
        if block.block_size() != self.block_size {
            return Err(StoreError::validation(format!(
                "block of size {} in a {} store",
                block.block_size(),
                self.block_size
            )));
        }

        let id = block.id();
        if inner.blocks.has(&id)? {
            debug!(%id, "idempotent put, block already present");
            return Ok(id);
        }

        let record = BlockMetadata {
            block_id: id,
            created_at: block.created_at(),
            expires_at: options.expires_at,
            durability: options.durability,
            parity_block_ids: Vec::new(),
            access_count: 0,
            last_accessed_at: None,
            replication_status: ReplicationStatus::Pending,
            target_replication_factor: options.target_replication_factor,
            replica_node_ids: Vec::new(),
            size: self.block_size.size() as u32,
            checksum: id,
            pool_id: options.pool.clone(),
            block_type: block.block_type(),
            data_type: block.data_type(),
        };

        let mut batch = WriteBatch::default();
        batch.stage_block(id, block.data().to_vec());
        batch.stage_metadata(record);
        batch.apply(inner)?;

        // parity failure never fails the put, it only leaves the block
        // without protection
        let parity_count = options.durability.parity_count();
        if parity_count > 0 {
            if let Err(err) = Self::generate_parity_locked(inner, &block, parity_count) {
                warn!(%id, ?err, "parity generation failed, block stored unprotected");
            }
        }

        debug!(%id, block_type = ?block.block_type(), "block stored");
        Ok(id)
    }

    /// remove a block together with its parity shards and metadata
    pub async fn delete_data(&self, id: &BlockId) -> Result<(), StoreError> {
        let mut inner = self.write();
        Self::delete_locked(&mut inner, id)
    }

    fn delete_locked(inner: &mut Inner<P, M>, id: &BlockId) -> Result<(), StoreError> {
        if !inner.blocks.delete(id)? {
            return Err(StoreError::NotFound { key: *id });
        }
        inner.parity.remove(id);
        if inner.metadata.try_get(id)?.is_some() {
            inner.metadata.delete(id)?;
        }
        debug!(%id, "block deleted");
        Ok(())
    }

    /* random selection **************************************************** */

    /// uniformly sample up to `min(n, |store|)` block ids without
    /// replacement
    pub async fn get_random_blocks(&self, n: usize) -> Result<Vec<BlockId>, StoreError> {
        let mut rng = rand::rng();
        let inner = self.read();
        Self::sample_ids_locked(&inner, n, None, &mut rng)
    }

    /// deterministic variant for tests and reproducible whitening
    pub async fn get_random_blocks_with<R>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<BlockId>, StoreError>
    where
        R: Rng,
    {
        let inner = self.read();
        Self::sample_ids_locked(&inner, n, None, rng)
    }

    fn sample_ids_locked<R>(
        inner: &Inner<P, M>,
        n: usize,
        exclude: Option<&BlockId>,
        rng: &mut R,
    ) -> Result<Vec<BlockId>, StoreError>
    where
        R: Rng + ?Sized,
    {
        let mut ids = inner.blocks.ids()?;
        if let Some(excluded) = exclude {
            ids.retain(|id| id != excluded);
        }

        let amount = n.min(ids.len());
        let picked = rand::seq::index::sample(rng, ids.len(), amount)
            .into_iter()
            .map(|i| ids[i])
            .collect();
        Ok(picked)
    }

    /// hand out `n` randomizer blocks for whitening.
    ///
    /// Existing blocks are preferred over fresh randomness; the policy
    /// decides whether a shortfall mints CSPRNG blocks or fails.
    pub async fn acquire_randomizers(&self, n: usize) -> Result<Vec<BlockHandle>, StoreError> {
        let mut inner = self.write();
        let mut rng = rand::rng();
        self.acquire_randomizers_locked(&mut inner, n, None, &mut rng)
    }

    fn acquire_randomizers_locked<R>(
        &self,
        inner: &mut Inner<P, M>,
        n: usize,
        exclude: Option<&BlockId>,
        rng: &mut R,
    ) -> Result<Vec<BlockHandle>, StoreError>
    where
        R: Rng + CryptoRng,
    {
        let picked = Self::sample_ids_locked(inner, n, exclude, rng)?;

        let mut out = Vec::with_capacity(n);
        for id in &picked {
            out.push(Self::get_data_locked(inner, self.block_size, id)?);
        }

        if out.len() < n {
            match self.randomizer_policy {
                RandomizerPolicy::RequireExisting => {
                    return Err(StoreError::InsufficientRandomBlocks {
                        requested: n,
                        available: out.len(),
                    });
                }
                RandomizerPolicy::ReuseOrGenerate => {
                    while out.len() < n {
                        let bytes =
                            brightchain_crypto::random_bytes(rng, self.block_size.size());
                        let block = RawDataBlock::new(
                            self.block_size,
                            bytes,
                            BlockType::Random,
                            BlockDataType::RawData,
                        )?;
                        let options = PutOptions {
                            durability: DurabilityLevel::Ephemeral,
                            block_type: BlockType::Random,
                            ..PutOptions::default()
                        };
                        self.set_data_locked(inner, block.clone(), &options)?;
                        out.push(Arc::new(block));
                    }
                }
            }
        }

        Ok(out)
    }

    /// XOR a block with `m` randomizers and store the result as a new
    /// block
    pub async fn brighten_block(
        &self,
        id: &BlockId,
        m: usize,
    ) -> Result<BrightenResult, StoreError> {
        let mut inner = self.write();
        let mut rng = rand::rng();

        let source = Self::get_data_locked(&mut inner, self.block_size, id)?;
        let randomizers =
            self.acquire_randomizers_locked(&mut inner, m, Some(id), &mut rng)?;

        let mut bytes = source.data().to_vec();
        for randomizer in &randomizers {
            xor::xor_in_place(&mut bytes, randomizer.data())?;
        }

        let brightened = RawDataBlock::new(
            self.block_size,
            bytes,
            BlockType::Brightened,
            BlockDataType::WhitenedData,
        )?;
        let brightened_id = self.set_data_locked(
            &mut inner,
            brightened,
            &PutOptions {
                block_type: BlockType::Brightened,
                data_type: BlockDataType::WhitenedData,
                ..PutOptions::default()
            },
        )?;

        Ok(BrightenResult {
            brightened_block_id: brightened_id,
            random_block_ids: randomizers.iter().map(|r| r.id()).collect(),
            original_block_id: *id,
        })
    }

    /* parity ************************************************************** */

    /// derive and retain `parity_count` shards for the block, recording
    /// the shard ids in its metadata
    pub async fn generate_parity_blocks(
        &self,
        id: &BlockId,
        parity_count: usize,
    ) -> Result<Vec<BlockId>, StoreError> {
        let mut inner = self.write();

        let record = inner.metadata.get(id)?;
        let bytes = inner
            .blocks
            .get(id)?
            .ok_or(StoreError::NotFound { key: *id })?;
        let block = RawDataBlock::from_parts(
            self.block_size,
            bytes,
            record.created_at,
            record.block_type,
            record.data_type,
        );

        Self::generate_parity_locked(&mut inner, &block, parity_count)
    }

    fn generate_parity_locked(
        inner: &mut Inner<P, M>,
        block: &RawDataBlock,
        parity_count: usize,
    ) -> Result<Vec<BlockId>, StoreError> {
        let shards = parity::create_parity_blocks(block, parity_count)?;
        let ids: Vec<BlockId> = shards.iter().map(ParityShard::id).collect();

        inner.parity.insert(block.id(), shards);
        inner.metadata.update(&block.id(), |record| {
            record.parity_block_ids = ids.clone();
        })?;

        Ok(ids)
    }

    /// the parity shard ids recorded for a block
    pub async fn get_parity_blocks(&self, id: &BlockId) -> Result<Vec<BlockId>, StoreError> {
        Ok(self.read().metadata.get(id)?.parity_block_ids)
    }

    /// try to reconstruct a lost or corrupted block from its parity
    /// shards, restoring it into the store on success
    pub async fn recover_block(&self, id: &BlockId) -> Result<RecoverResult, StoreError> {
        let mut inner = self.write();

        // corrupted bytes count as absent for the decode
        let data = inner
            .blocks
            .get(id)?
            .filter(|bytes| Hasher::<256>::hash(bytes) == *id);

        let shards = inner.parity.get(id).cloned().unwrap_or_default();
        if data.is_none() && shards.is_empty() {
            debug!(%id, "nothing to recover from");
            return Ok(RecoverResult {
                success: false,
                recovered_block: None,
            });
        }

        let recovered = parity::recover_data_block(self.block_size, data.as_deref(), &shards)?;

        let actual = Hasher::<256>::hash(&recovered);
        if actual != *id {
            return Err(StoreError::ChecksumMismatch {
                expected: *id,
                actual,
            });
        }

        inner.blocks.put(*id, recovered.clone())?;

        let record = inner.metadata.try_get(id)?;
        let (created_at, block_type, data_type) = record
            .map(|r| (r.created_at, r.block_type, r.data_type))
            .unwrap_or((crate::now_millis(), BlockType::default(), BlockDataType::default()));

        debug!(%id, "block restored from parity");
        Ok(RecoverResult {
            success: true,
            recovered_block: Some(Arc::new(RawDataBlock::from_parts(
                self.block_size,
                recovered,
                created_at,
                block_type,
                data_type,
            ))),
        })
    }

    /// re-derive parity from the current bytes and compare with the
    /// retained shards
    pub async fn verify_block_integrity(&self, id: &BlockId) -> Result<bool, StoreError> {
        let inner = self.read();

        let Some(bytes) = inner.blocks.get(id)? else {
            return Ok(false);
        };
        if Hasher::<256>::hash(&bytes) != *id {
            return Ok(false);
        }

        let Some(shards) = inner.parity.get(id) else {
            return Ok(true);
        };
        if shards.is_empty() {
            return Ok(true);
        }

        let record = inner.metadata.try_get(id)?;
        let (created_at, block_type, data_type) = record
            .map(|r| (r.created_at, r.block_type, r.data_type))
            .unwrap_or((crate::now_millis(), BlockType::default(), BlockDataType::default()));

        let block =
            RawDataBlock::from_parts(self.block_size, bytes, created_at, block_type, data_type);
        let rederived = parity::create_parity_blocks(&block, shards.len())?;

        Ok(rederived
            .iter()
            .zip(shards.iter())
            .all(|(fresh, kept)| fresh.data == kept.data && fresh.index == kept.index))
    }

    /* replication bookkeeping ********************************************* */

    /// note that `node_id` now holds a replica of the block
    pub async fn record_replication(
        &self,
        id: &BlockId,
        node_id: &str,
    ) -> Result<ReplicationStatus, StoreError> {
        let mut inner = self.write();
        let record = inner.metadata.update(id, |record| {
            if !record.replica_node_ids.iter().any(|n| n == node_id) {
                record.replica_node_ids.push(node_id.to_string());
            }
            record.recompute_replication();
        })?;
        Ok(record.replication_status)
    }

    /// note that `node_id` lost (or dropped) its replica
    pub async fn record_replica_loss(
        &self,
        id: &BlockId,
        node_id: &str,
    ) -> Result<ReplicationStatus, StoreError> {
        let mut inner = self.write();
        let record = inner.metadata.update(id, |record| {
            record.replica_node_ids.retain(|n| n != node_id);
            record.recompute_replication();
        })?;
        Ok(record.replication_status)
    }

    pub async fn blocks_pending_replication(&self) -> Result<Vec<BlockId>, StoreError> {
        Ok(self
            .read()
            .metadata
            .find_by_replication_status(ReplicationStatus::Pending)?
            .into_iter()
            .map(|r| r.block_id)
            .collect())
    }

    pub async fn under_replicated_blocks(&self) -> Result<Vec<BlockId>, StoreError> {
        Ok(self
            .read()
            .metadata
            .find_by_replication_status(ReplicationStatus::UnderReplicated)?
            .into_iter()
            .map(|r| r.block_id)
            .collect())
    }

    /* expiry ************************************************************** */

    pub async fn find_expired(&self, now: u64) -> Result<Vec<BlockId>, StoreError> {
        Ok(self
            .read()
            .metadata
            .find_expired(now)?
            .into_iter()
            .map(|r| r.block_id)
            .collect())
    }

    /// test hook: lose the raw bytes while keeping parity and metadata,
    /// simulating disk damage
    #[cfg(test)]
    pub(crate) fn drop_block_bytes(&self, id: &BlockId) {
        let mut inner = self.write();
        let _ = inner.blocks.delete(id);
    }

    /// delete every block whose expiry has passed, returning the purged
    /// ids
    pub async fn purge_expired(&self, now: u64) -> Result<Vec<BlockId>, StoreError> {
        let mut inner = self.write();

        let expired: Vec<BlockId> = inner
            .metadata
            .find_expired(now)?
            .into_iter()
            .map(|r| r.block_id)
            .collect();

        for id in &expired {
            Self::delete_locked(&mut inner, id)?;
        }

        Ok(expired)
    }
}
