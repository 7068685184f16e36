//! The end-to-end file pipeline.
//!
//! Ingest: chunk the bytes into blocks (random-padding the tail), store
//! each chunk, build the signed manifest, whiten it, and hand back the
//! magnet URL. Files whose address list outgrows one manifest escalate
//! into a Super-CBL hierarchy automatically.
//!
//! Reconstruct walks it all back, with one parity-recovery attempt per
//! missing block and a final SHA3 check of the assembled bytes.

use std::sync::Arc;

use brightchain_crypto::hash::{Hash, Hasher};
use brightchain_magnet::CblMagnet;
use brightchain_store::persistence::{BlockPersistence, MetadataPersistence};
use brightchain_store::{BlockId, BlockStore, DurabilityLevel, PutOptions, StoreError};
use tracing::debug;

use crate::creator::Creator;
use crate::fields;
use crate::header;
use crate::hierarchy::{
    create_hierarchical_cbl, reconstruct_hierarchical_cbl, HierarchyConfig, DEFAULT_MAX_DEPTH,
};
use crate::model::{parse_document, CblData};
use crate::whiten::WhitenedCblStore;
use crate::CblError;

/// Knobs for one ingest.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub file_name: String,
    pub mime_type: String,
    pub durability: DurabilityLevel,
    pub max_depth: u32,
}

impl IngestOptions {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            durability: DurabilityLevel::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// What an ingest produced.
#[derive(Debug, Clone)]
pub struct IngestResult {
    /// the root manifest, regular or super
    pub cbl: CblData,
    /// magnet for the whitened root; `None` when the root outgrew a
    /// block and lives with the caller instead
    pub magnet: Option<CblMagnet>,
    /// every data block the file was chunked into, in order
    pub block_ids: Vec<BlockId>,
    pub original_size: u64,
    pub data_checksum: Hash<32>,
}

/// Ingest/reconstruct over a shared store and its whitening layer.
pub struct FilePipeline<P, M> {
    store: Arc<BlockStore<P, M>>,
    cbls: WhitenedCblStore<P, M>,
}

impl<P, M> FilePipeline<P, M>
where
    P: BlockPersistence,
    M: MetadataPersistence,
{
    pub fn new(store: Arc<BlockStore<P, M>>) -> Self {
        Self {
            cbls: WhitenedCblStore::new(store.clone()),
            store,
        }
    }

    pub fn block_store(&self) -> &BlockStore<P, M> {
        &self.store
    }

    pub fn whitener(&self) -> &WhitenedCblStore<P, M> {
        &self.cbls
    }

    /// chunk, store and manifest a file
    pub async fn ingest(
        &self,
        bytes: &[u8],
        creator: &Creator,
        options: &IngestOptions,
    ) -> Result<IngestResult, CblError> {
        fields::validate_file_name(&options.file_name)?;
        fields::validate_mime_type(&options.mime_type)?;

        let block_size = self.store.block_size();
        let data_checksum = Hasher::<256>::hash(bytes);

        let mut block_ids = Vec::with_capacity(bytes.len() / block_size.size() + 1);
        for chunk in bytes.chunks(block_size.size()) {
            let mut data = chunk.to_vec();
            if data.len() < block_size.size() {
                // random padding: a short tail must not leak its length
                // through trailing zeros
                let padding = {
                    let mut rng = rand::rng();
                    brightchain_crypto::random_bytes(&mut rng, block_size.size() - data.len())
                };
                data.extend_from_slice(&padding);
            }

            let id = self
                .store
                .put(
                    data,
                    PutOptions {
                        durability: options.durability,
                        ..PutOptions::default()
                    },
                )
                .await?;
            block_ids.push(id);
        }

        debug!(
            chunks = block_ids.len(),
            size = bytes.len(),
            "file chunked into the store"
        );

        let mut config = HierarchyConfig::new(
            block_size,
            options.file_name.clone(),
            options.mime_type.clone(),
            bytes.len() as u64,
            data_checksum,
        );
        config.max_depth = options.max_depth;

        let cbls = &self.cbls;
        let durability = options.durability;
        let cbl = create_hierarchical_cbl(&block_ids, &config, creator, |manifest| async move {
            let stored = cbls.store_cbl(&manifest, durability, false).await?;
            Ok(stored.magnet.to_string())
        })
        .await?;

        let magnet = match &cbl {
            CblData::Regular(parsed) => {
                let stored = self
                    .cbls
                    .store_cbl(&header::encode(parsed), durability, false)
                    .await?;
                Some(stored.magnet)
            }
            CblData::Super(sup) => {
                // a root small enough to whiten gets a magnet too;
                // otherwise the caller keeps the manifest itself
                match self.cbls.store_cbl(&sup.to_bytes()?, durability, false).await {
                    Ok(stored) => Some(stored.magnet),
                    Err(CblError::Store(StoreError::ValidationFailed { .. })) => None,
                    Err(err) => return Err(err),
                }
            }
            _ => None,
        };

        Ok(IngestResult {
            cbl,
            magnet,
            block_ids,
            original_size: bytes.len() as u64,
            data_checksum,
        })
    }

    /// walk a manifest back into the original bytes
    pub async fn reconstruct(&self, root: &CblData, max_depth: u32) -> Result<Vec<u8>, CblError> {
        let cbls = &self.cbls;
        let walked = reconstruct_hierarchical_cbl(root, max_depth, |url| async move {
            let magnet: CblMagnet = url
                .parse()
                .map_err(|err| CblError::InvalidCblFormat(format!("bad child magnet: {err}")))?;
            cbls.retrieve_cbl(&magnet).await
        })
        .await?;

        let original_size = walked.original_size.ok_or_else(|| {
            CblError::InvalidCblFormat("manifest does not carry the original size".into())
        })?;

        let mut out = Vec::with_capacity(walked.addresses.len() * self.store.block_size().size());
        for id in &walked.addresses {
            let block = self.store.get_data_or_recover(id).await?;
            out.extend_from_slice(block.data());
        }
        out.truncate(original_size as usize);

        if let Some(expected) = walked.data_checksum {
            let actual = Hasher::<256>::hash(&out);
            if actual != expected {
                return Err(StoreError::ChecksumMismatch { expected, actual }.into());
            }
        }

        Ok(out)
    }

    /// resolve a whitened root manifest by magnet and reconstruct the
    /// file it describes
    pub async fn reconstruct_from_magnet(&self, magnet: &CblMagnet) -> Result<Vec<u8>, CblError> {
        let bytes = self.cbls.retrieve_cbl(magnet).await?;
        let root = parse_document(&bytes)?;
        self.reconstruct(&root, DEFAULT_MAX_DEPTH).await
    }
}
