//! Disk-backed persistence.
//!
//! Each block is a file whose contents are exactly the block bytes and
//! whose name is the hex id. Metadata lives as JSON side records in a
//! sibling directory keyed by the same id.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

use super::{BlockPersistence, MetadataPersistence};
use crate::{BlockId, BlockMetadata, StoreError};

fn io_err(context: &str, err: std::io::Error) -> StoreError {
    StoreError::Io(format!("{context}: {err}"))
}

fn scan_ids(dir: &Path, extension: Option<&str>) -> Result<Vec<BlockId>, StoreError> {
    let mut out = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| io_err("read_dir", e))?;

    for entry in entries {
        let entry = entry.map_err(|e| io_err("read_dir entry", e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        let stem = match extension {
            Some(ext) => match name.strip_suffix(ext) {
                Some(stem) => stem,
                None => continue,
            },
            None => name,
        };

        match BlockId::from_str(stem) {
            Ok(id) => out.push(id),
            // foreign files in the directory are not ours to touch
            Err(_) => warn!(file = %name, "skipping non-block file"),
        }
    }

    Ok(out)
}

/// One file per block, named by hex id, holding exactly the block bytes.
pub struct FsBlockPersistence {
    dir: PathBuf,
}

impl FsBlockPersistence {
    /// open (creating if missing) a block directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_err("create block dir", e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &BlockId) -> PathBuf {
        self.dir.join(id.to_string())
    }
}

impl BlockPersistence for FsBlockPersistence {
    fn put(&mut self, id: BlockId, bytes: Vec<u8>) -> Result<(), StoreError> {
        fs::write(self.path_for(&id), bytes).map_err(|e| io_err("write block", e))
    }

    fn get(&self, id: &BlockId) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err("read block", e)),
        }
    }

    fn has(&self, id: &BlockId) -> Result<bool, StoreError> {
        Ok(self.path_for(id).exists())
    }

    fn delete(&mut self, id: &BlockId) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("delete block", e)),
        }
    }

    fn ids(&self) -> Result<Vec<BlockId>, StoreError> {
        scan_ids(&self.dir, None)
    }
}

/// JSON metadata side records, one `<hex id>.json` per block.
pub struct FsMetadataPersistence {
    dir: PathBuf,
}

impl FsMetadataPersistence {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_err("create metadata dir", e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &BlockId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl MetadataPersistence for FsMetadataPersistence {
    fn put(&mut self, record: BlockMetadata) -> Result<(), StoreError> {
        let path = self.path_for(&record.block_id);
        let json = serde_json::to_vec(&record)
            .map_err(|e| StoreError::Io(format!("encode metadata: {e}")))?;
        fs::write(path, json).map_err(|e| io_err("write metadata", e))
    }

    fn get(&self, id: &BlockId) -> Result<Option<BlockMetadata>, StoreError> {
        let bytes = match fs::read(self.path_for(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("read metadata", e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Io(format!("decode metadata: {e}")))
    }

    fn delete(&mut self, id: &BlockId) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("delete metadata", e)),
        }
    }

    fn ids(&self) -> Result<Vec<BlockId>, StoreError> {
        scan_ids(&self.dir, Some(".json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brightchain_crypto::hash::Hasher;

    #[test]
    fn block_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FsBlockPersistence::open(dir.path().join("blocks")).unwrap();

        let bytes = vec![3u8; 512];
        let id = Hasher::<256>::hash(&bytes);

        backend.put(id, bytes.clone()).unwrap();
        assert!(backend.has(&id).unwrap());
        assert_eq!(backend.get(&id).unwrap(), Some(bytes));
        assert_eq!(backend.ids().unwrap(), vec![id]);

        // the file on disk is named by the hex id and holds the raw bytes
        let path = dir.path().join("blocks").join(id.to_string());
        assert_eq!(fs::read(path).unwrap().len(), 512);

        assert!(backend.delete(&id).unwrap());
        assert!(!backend.delete(&id).unwrap());
        assert_eq!(backend.get(&id).unwrap(), None);
    }

    #[test]
    fn foreign_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBlockPersistence::open(dir.path()).unwrap();

        fs::write(dir.path().join("README"), b"not a block").unwrap();
        assert!(backend.ids().unwrap().is_empty());
    }

    #[test]
    fn metadata_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let bytes = vec![9u8; 512];
        let id = Hasher::<256>::hash(&bytes);
        let record = BlockMetadata {
            block_id: id,
            created_at: 123,
            expires_at: Some(456),
            durability: crate::DurabilityLevel::High,
            parity_block_ids: vec![],
            access_count: 7,
            last_accessed_at: None,
            replication_status: crate::ReplicationStatus::Pending,
            target_replication_factor: 2,
            replica_node_ids: vec!["node-a".into()],
            size: 512,
            checksum: id,
            pool_id: Some("team-a".into()),
            block_type: crate::BlockType::RawData,
            data_type: crate::BlockDataType::RawData,
        };

        {
            let mut backend = FsMetadataPersistence::open(dir.path()).unwrap();
            backend.put(record.clone()).unwrap();
        }

        let reopened = FsMetadataPersistence::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&id).unwrap(), Some(record));
        assert_eq!(reopened.ids().unwrap(), vec![id]);
    }
}
