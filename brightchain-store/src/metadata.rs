//! Per-block metadata records and the store that owns them.
//!
//! A metadata record is created atomically with its block and shares its
//! lifecycle: access statistics mutate on every read, replication fields
//! only through the record/loss bookkeeping calls.

use serde::{Deserialize, Serialize};

use crate::persistence::MetadataPersistence;
use crate::{now_millis, BlockDataType, BlockId, BlockType, StoreError};

/// Durability policy knob, mapped to a parity shard count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurabilityLevel {
    /// no parity protection
    Ephemeral,
    #[default]
    Standard,
    High,
    Critical,
}

impl DurabilityLevel {
    /// how many parity shards accompany a block at this level
    pub const fn parity_count(self) -> usize {
        match self {
            DurabilityLevel::Ephemeral => 0,
            DurabilityLevel::Standard => 1,
            DurabilityLevel::High => 3,
            DurabilityLevel::Critical => 6,
        }
    }
}

/// Where a block stands relative to its target replica count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationStatus {
    #[default]
    Pending,
    UnderReplicated,
    Replicated,
    Lost,
}

/// The side record tracked for every stored block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub block_id: BlockId,
    pub created_at: u64,
    pub expires_at: Option<u64>,
    pub durability: DurabilityLevel,
    pub parity_block_ids: Vec<BlockId>,
    pub access_count: u64,
    pub last_accessed_at: Option<u64>,
    pub replication_status: ReplicationStatus,
    pub target_replication_factor: u32,
    pub replica_node_ids: Vec<String>,
    pub size: u32,
    pub checksum: BlockId,
    pub pool_id: Option<String>,
    pub block_type: BlockType,
    pub data_type: BlockDataType,
}

impl BlockMetadata {
    /// recompute the replication status from the replica count and target
    pub(crate) fn recompute_replication(&mut self) {
        let count = self.replica_node_ids.len() as u32;
        self.replication_status = if count >= self.target_replication_factor {
            ReplicationStatus::Replicated
        } else if count > 0 {
            ReplicationStatus::UnderReplicated
        } else {
            ReplicationStatus::Pending
        };
    }
}

/// The block id to metadata mapping, queryable by expiry and replication
/// status.
pub struct MetadataStore<M> {
    backend: M,
}

impl<M: MetadataPersistence> MetadataStore<M> {
    pub fn new(backend: M) -> Self {
        Self { backend }
    }

    /// insert a fresh record; fails with `AlreadyExists` on collision
    pub fn create(&mut self, record: BlockMetadata) -> Result<(), StoreError> {
        if self.backend.get(&record.block_id)?.is_some() {
            return Err(StoreError::AlreadyExists {
                key: record.block_id,
            });
        }
        self.backend.put(record)
    }

    pub fn get(&self, id: &BlockId) -> Result<BlockMetadata, StoreError> {
        self.backend
            .get(id)?
            .ok_or(StoreError::NotFound { key: *id })
    }

    pub fn try_get(&self, id: &BlockId) -> Result<Option<BlockMetadata>, StoreError> {
        self.backend.get(id)
    }

    /// apply a partial mutation to an existing record
    pub fn update<F>(&mut self, id: &BlockId, mutate: F) -> Result<BlockMetadata, StoreError>
    where
        F: FnOnce(&mut BlockMetadata),
    {
        let mut record = self.get(id)?;
        mutate(&mut record);
        self.backend.put(record.clone())?;
        Ok(record)
    }

    pub fn delete(&mut self, id: &BlockId) -> Result<(), StoreError> {
        if !self.backend.delete(id)? {
            return Err(StoreError::NotFound { key: *id });
        }
        Ok(())
    }

    /// bump the access counter and stamp the access time
    pub fn record_access(&mut self, id: &BlockId) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.access_count += 1;
            record.last_accessed_at = Some(now_millis());
        })?;
        Ok(())
    }

    /// every record whose expiry is set and has passed
    pub fn find_expired(&self, now: u64) -> Result<Vec<BlockMetadata>, StoreError> {
        let mut out = Vec::new();
        for id in self.backend.ids()? {
            if let Some(record) = self.backend.get(&id)? {
                if record.expires_at.is_some_and(|at| at <= now) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    pub fn find_by_replication_status(
        &self,
        status: ReplicationStatus,
    ) -> Result<Vec<BlockMetadata>, StoreError> {
        let mut out = Vec::new();
        for id in self.backend.ids()? {
            if let Some(record) = self.backend.get(&id)? {
                if record.replication_status == status {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }
}
