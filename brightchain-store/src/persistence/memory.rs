use std::collections::HashMap;

use super::{BlockPersistence, MetadataPersistence};
use crate::{BlockId, BlockMetadata, StoreError};

/// Block bytes in a plain map. The default backend for tests and
/// single-process deployments.
#[derive(Default)]
pub struct MemoryBlockPersistence {
    blocks: HashMap<BlockId, Vec<u8>>,
}

impl BlockPersistence for MemoryBlockPersistence {
    fn put(&mut self, id: BlockId, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blocks.insert(id, bytes);
        Ok(())
    }

    fn get(&self, id: &BlockId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blocks.get(id).cloned())
    }

    fn has(&self, id: &BlockId) -> Result<bool, StoreError> {
        Ok(self.blocks.contains_key(id))
    }

    fn delete(&mut self, id: &BlockId) -> Result<bool, StoreError> {
        Ok(self.blocks.remove(id).is_some())
    }

    fn ids(&self) -> Result<Vec<BlockId>, StoreError> {
        Ok(self.blocks.keys().copied().collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.blocks.len())
    }
}

/// Metadata records in a plain map.
#[derive(Default)]
pub struct MemoryMetadataPersistence {
    records: HashMap<BlockId, BlockMetadata>,
}

impl MetadataPersistence for MemoryMetadataPersistence {
    fn put(&mut self, record: BlockMetadata) -> Result<(), StoreError> {
        self.records.insert(record.block_id, record);
        Ok(())
    }

    fn get(&self, id: &BlockId) -> Result<Option<BlockMetadata>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    fn delete(&mut self, id: &BlockId) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }

    fn ids(&self) -> Result<Vec<BlockId>, StoreError> {
        Ok(self.records.keys().copied().collect())
    }
}
