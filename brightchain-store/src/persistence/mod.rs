//! Abstract persistence behind the store.
//!
//! The store core never touches a filesystem or database directly; it
//! speaks to these two collaborator traits. The in-memory backends are
//! plain maps, the `fs` backends lay blocks out one file per id.

mod fs;
mod memory;

pub use fs::{FsBlockPersistence, FsMetadataPersistence};
pub use memory::{MemoryBlockPersistence, MemoryMetadataPersistence};

use crate::{BlockId, BlockMetadata, StoreError};

/// Raw block bytes keyed by content address.
pub trait BlockPersistence: Send {
    fn put(&mut self, id: BlockId, bytes: Vec<u8>) -> Result<(), StoreError>;

    fn get(&self, id: &BlockId) -> Result<Option<Vec<u8>>, StoreError>;

    fn has(&self, id: &BlockId) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }

    /// remove the entry, reporting whether it existed
    fn delete(&mut self, id: &BlockId) -> Result<bool, StoreError>;

    fn ids(&self) -> Result<Vec<BlockId>, StoreError>;

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.ids()?.len())
    }

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Metadata records keyed by the same content address.
pub trait MetadataPersistence: Send {
    fn put(&mut self, record: BlockMetadata) -> Result<(), StoreError>;

    fn get(&self, id: &BlockId) -> Result<Option<BlockMetadata>, StoreError>;

    /// remove the record, reporting whether it existed
    fn delete(&mut self, id: &BlockId) -> Result<bool, StoreError>;

    fn ids(&self) -> Result<Vec<BlockId>, StoreError>;
}
