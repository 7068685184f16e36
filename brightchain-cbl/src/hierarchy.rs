//! The Super-CBL hierarchy.
//!
//! When a file's address list exceeds one CBL's capacity, the list is
//! split into contiguous slices, each stored as a binary sub-CBL, and a
//! JSON Super-CBL manifest references them by magnet URL. When even the
//! URL list outgrows a manifest, intermediate Super-CBLs stack another
//! level, up to a configured depth cap.
//!
//! Storage and retrieval of child manifests go through caller-supplied
//! async callbacks; the builder itself never touches a store.

use std::future::Future;

use brightchain_crypto::hash::Hash;
use brightchain_magnet::BlockId;
use brightchain_store::BlockSize;
use tracing::debug;

use crate::capacity::{address_capacity, EncryptionMode};
use crate::creator::Creator;
use crate::header::{self, BuildParams, DEFAULT_TUPLE_SIZE};
use crate::model::{parse_document, CblData, SubCbl, SuperCbl};
use crate::CblError;

/// recursion cap when none is configured
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// budgeted wire length of one child magnet URL
pub const MAGNET_URL_LEN_CEILING: usize = 256;

/// root manifests live with the caller rather than inside a block, so a
/// policy floor applies regardless of block size
pub const MIN_SUPER_CBL_FANOUT: usize = 256;

/// how many child magnet URLs one Super-CBL may reference
pub fn url_list_capacity(block_size: BlockSize) -> usize {
    (block_size.size() / MAGNET_URL_LEN_CEILING).max(MIN_SUPER_CBL_FANOUT)
}

/// Everything the splitter needs besides the address list itself.
pub struct HierarchyConfig {
    pub block_size: BlockSize,
    pub file_name: String,
    pub mime_type: String,
    pub original_size: u64,
    pub data_checksum: Hash<32>,
    pub max_depth: u32,
}

impl HierarchyConfig {
    pub fn new(
        block_size: BlockSize,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        original_size: u64,
        data_checksum: Hash<32>,
    ) -> Self {
        Self {
            block_size,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            original_size,
            data_checksum,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// addresses one (sub-)CBL can hold under this configuration
    pub fn address_capacity(&self) -> usize {
        address_capacity(
            self.block_size.size(),
            EncryptionMode::None,
            Some((self.file_name.len(), self.mime_type.len())),
            DEFAULT_TUPLE_SIZE,
        )
    }
}

fn build_slice(
    config: &HierarchyConfig,
    creator: &Creator,
    addresses: &[BlockId],
) -> Result<Vec<u8>, CblError> {
    header::build(
        BuildParams {
            creator,
            date_created: brightchain_store::now_millis(),
            tuple_size: DEFAULT_TUPLE_SIZE,
            original_data_len: config.original_size,
            data_checksum: config.data_checksum,
            extended: Some(header::ExtendedHeader::new(
                config.file_name.clone(),
                config.mime_type.clone(),
            )),
        },
        addresses,
        config.block_size.size(),
    )
}

/// split an address list into a manifest tree.
///
/// Lists that fit one CBL come back as a regular manifest; larger lists
/// are split into stored sub-CBLs under a Super-CBL root, stacking
/// levels while the URL list itself overflows. `store_sub` persists each
/// child manifest and returns its magnet URL.
pub async fn create_hierarchical_cbl<F, Fut>(
    blocks: &[BlockId],
    config: &HierarchyConfig,
    creator: &Creator,
    mut store_sub: F,
) -> Result<CblData, CblError>
where
    F: FnMut(Vec<u8>) -> Fut,
    Fut: Future<Output = Result<String, CblError>>,
{
    let cap = config.address_capacity();
    if cap == 0 {
        return Err(CblError::InvalidCblFormat(format!(
            "{} byte blocks cannot hold a CBL with this header shape",
            config.block_size
        )));
    }

    if blocks.len() <= cap {
        let bytes = build_slice(config, creator, blocks)?;
        return Ok(CblData::Regular(header::parse(&bytes)?));
    }

    // a split forces at least depth 2
    if config.max_depth < 2 {
        return Err(CblError::MaxDepthExceeded {
            current: 2,
            max: config.max_depth,
        });
    }

    let chunks: Vec<&[BlockId]> = blocks.chunks(cap).collect();
    debug!(
        blocks = blocks.len(),
        cap,
        subs = chunks.len(),
        "splitting address list into sub-CBLs"
    );

    // each level entry is (stored child url, leaf blocks underneath it)
    let mut level: Vec<(String, u64)> = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let bytes = build_slice(config, creator, chunk)?;
        let url = store_sub(bytes).await?;
        level.push((url, chunk.len() as u64));
    }

    let url_cap = url_list_capacity(config.block_size);
    let mut depth = 2u32;

    while level.len() > url_cap {
        depth += 1;
        if depth > config.max_depth {
            return Err(CblError::MaxDepthExceeded {
                current: depth,
                max: config.max_depth,
            });
        }

        debug!(urls = level.len(), url_cap, depth, "stacking an intermediate manifest level");
        let mut next = Vec::with_capacity(level.len() / url_cap + 1);
        for group in level.chunks(url_cap) {
            let group_count: u64 = group.iter().map(|(_, count)| count).sum();
            let intermediate = SuperCbl {
                total_block_count: group_count,
                depth: depth - 1,
                sub_cbl_count: group.len() as u32,
                sub_cbl_magnet_urls: group.iter().map(|(url, _)| url.clone()).collect(),
                block_size: config.block_size.size() as u32,
                file_name: None,
            };
            let url = store_sub(intermediate.to_bytes()?).await?;
            next.push((url, group_count));
        }
        level = next;
    }

    Ok(CblData::Super(SuperCbl {
        total_block_count: blocks.len() as u64,
        depth,
        sub_cbl_count: level.len() as u32,
        sub_cbl_magnet_urls: level.into_iter().map(|(url, _)| url).collect(),
        block_size: config.block_size.size() as u32,
        file_name: Some(config.file_name.clone()),
    }))
}

/// What a tree walk recovers: the ordered leaf addresses plus the file
/// metadata found on the first binary leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedCbl {
    pub addresses: Vec<BlockId>,
    pub original_size: Option<u64>,
    pub data_checksum: Option<Hash<32>>,
}

/// one in-flight Super-CBL during the walk
struct Frame {
    urls: Vec<String>,
    next_child: usize,
    depth: u32,
    expected_total: u64,
    seen: u64,
}

/// a leaf's contribution: its addresses land in `out`, its count goes to
/// the enclosing frame
fn take_leaf(doc: CblData, out: &mut ReconstructedCbl) -> Result<u64, CblError> {
    match doc {
        CblData::V1(legacy) => {
            let addresses = legacy.addresses()?;
            if addresses.len() as u64 != legacy.block_count {
                return Err(CblError::BlockCountMismatch {
                    expected: legacy.block_count,
                    actual: addresses.len() as u64,
                });
            }
            if out.original_size.is_none() {
                out.original_size = Some(legacy.original_size);
            }
            let count = addresses.len() as u64;
            out.addresses.extend(addresses);
            Ok(count)
        }
        CblData::Regular(cbl) | CblData::Sub(SubCbl { cbl, .. }) => {
            if out.original_size.is_none() {
                out.original_size = Some(cbl.header.original_data_len);
                out.data_checksum = Some(cbl.header.data_checksum);
            }
            let count = cbl.addresses.len() as u64;
            out.addresses.extend(cbl.addresses);
            Ok(count)
        }
        CblData::Super(_) => unreachable!("supers are pushed as frames, not taken as leaves"),
    }
}

fn open_frame(
    sup: &SuperCbl,
    parent_depth: Option<u32>,
    max_depth: u32,
) -> Result<Frame, CblError> {
    if sup.depth > max_depth {
        return Err(CblError::MaxDepthExceeded {
            current: sup.depth,
            max: max_depth,
        });
    }
    if let Some(parent) = parent_depth {
        if sup.depth >= parent {
            return Err(CblError::InvalidCblFormat(format!(
                "child depth {} does not decrease below parent depth {parent}",
                sup.depth
            )));
        }
    }
    if sup.sub_cbl_count as usize != sup.sub_cbl_magnet_urls.len() {
        return Err(CblError::InvalidCblFormat(format!(
            "subCblCount {} disagrees with {} magnet URLs",
            sup.sub_cbl_count,
            sup.sub_cbl_magnet_urls.len()
        )));
    }

    Ok(Frame {
        urls: sup.sub_cbl_magnet_urls.clone(),
        next_child: 0,
        depth: sup.depth,
        expected_total: sup.total_block_count,
        seen: 0,
    })
}

/// walk a manifest tree depth-first, fetching children through
/// `retrieve_sub` and checking the conservation invariants at each
/// level.
pub async fn reconstruct_hierarchical_cbl<F, Fut>(
    root: &CblData,
    max_depth: u32,
    mut retrieve_sub: F,
) -> Result<ReconstructedCbl, CblError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, CblError>>,
{
    let mut out = ReconstructedCbl {
        addresses: Vec::new(),
        original_size: None,
        data_checksum: None,
    };

    let mut stack: Vec<Frame> = Vec::new();
    match root {
        CblData::Super(sup) => stack.push(open_frame(sup, None, max_depth)?),
        leaf => {
            take_leaf(leaf.clone(), &mut out)?;
            return Ok(out);
        }
    }

    while let Some(top) = stack.last() {
        // frame exhausted: verify its total and fold it into the parent
        if top.next_child >= top.urls.len() {
            let frame = stack.pop().expect("peeked frame");
            if frame.seen != frame.expected_total {
                return Err(CblError::BlockCountMismatch {
                    expected: frame.expected_total,
                    actual: frame.seen,
                });
            }
            if let Some(parent) = stack.last_mut() {
                parent.seen += frame.seen;
            }
            continue;
        }

        let index = top.next_child;
        let url = top.urls[index].clone();
        let parent_depth = top.depth;
        let total_children = top.urls.len() as u32;
        stack.last_mut().expect("peeked frame").next_child += 1;

        let bytes = retrieve_sub(url.clone())
            .await
            .map_err(|cause| CblError::MissingSubCbl {
                url: url.clone(),
                cause: cause.to_string(),
            })?;

        match parse_document(&bytes)? {
            CblData::Super(sup) => {
                stack.push(open_frame(&sup, Some(parent_depth), max_depth)?);
            }
            // binary children of a super manifest are slices; their
            // position metadata comes from URL order
            CblData::Regular(cbl) => {
                let count = take_leaf(
                    CblData::Sub(SubCbl {
                        sub_cbl_index: index as u32,
                        total_sub_cbls: total_children,
                        cbl,
                    }),
                    &mut out,
                )?;
                stack.last_mut().expect("parent frame").seen += count;
            }
            leaf => {
                let count = take_leaf(leaf, &mut out)?;
                stack.last_mut().expect("parent frame").seen += count;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brightchain_crypto::hash::Hasher;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn creator() -> Creator {
        let mut rng = rand::rng();
        loop {
            let c = Creator::member(&mut rng);
            if c.id().as_ref()[0] != header::ECIES_MAGIC {
                return c;
            }
        }
    }

    fn addresses(n: usize) -> Vec<BlockId> {
        (0..n)
            .map(|i| Hasher::<256>::hash(&(i as u64).to_be_bytes()))
            .collect()
    }

    fn config(max_depth: u32) -> HierarchyConfig {
        let mut config = HierarchyConfig::new(
            BlockSize::Message,
            "large.bin",
            "application/octet-stream",
            1_000_000,
            Hasher::<256>::hash(b"the whole file"),
        );
        config.max_depth = max_depth;
        config
    }

    /// in-memory child storage shared by the store and retrieve callbacks
    struct MapStore {
        manifests: RefCell<HashMap<String, Vec<u8>>>,
        counter: RefCell<u32>,
    }

    impl MapStore {
        fn new() -> Self {
            Self {
                manifests: RefCell::new(HashMap::new()),
                counter: RefCell::new(0),
            }
        }

        fn save(&self, bytes: Vec<u8>) -> String {
            let mut counter = self.counter.borrow_mut();
            *counter += 1;
            let url = format!("magnet:?sub={counter}");
            self.manifests.borrow_mut().insert(url.clone(), bytes);
            url
        }

        fn load(&self, url: &str) -> Result<Vec<u8>, CblError> {
            self.manifests
                .borrow()
                .get(url)
                .cloned()
                .ok_or_else(|| CblError::InvalidCblFormat(format!("no manifest at {url}")))
        }

        fn len(&self) -> usize {
            self.manifests.borrow().len()
        }
    }

    #[tokio::test]
    async fn small_list_stays_regular() {
        let creator = creator();
        let blocks = addresses(5);
        let map = MapStore::new();

        let cbl = create_hierarchical_cbl(&blocks, &config(10), &creator, |bytes| {
            let url = map.save(bytes);
            async move { Ok(url) }
        })
        .await
        .unwrap();

        match &cbl {
            CblData::Regular(regular) => assert_eq!(regular.addresses, blocks),
            other => panic!("expected regular, got {}", other.type_name()),
        }
        // nothing was pushed to the sub store
        assert_eq!(map.len(), 0);
    }

    #[tokio::test]
    async fn thousand_blocks_split_at_depth_two() {
        let creator = creator();
        let blocks = addresses(1000);
        let config = config(10);
        let cap = config.address_capacity();
        let map = MapStore::new();

        let cbl = create_hierarchical_cbl(&blocks, &config, &creator, |bytes| {
            let url = map.save(bytes);
            async move { Ok(url) }
        })
        .await
        .unwrap();

        let expected_subs = 1000usize.div_ceil(cap);
        match &cbl {
            CblData::Super(sup) => {
                assert_eq!(sup.depth, 2);
                assert_eq!(sup.total_block_count, 1000);
                assert_eq!(sup.sub_cbl_count as usize, expected_subs);
                assert_eq!(sup.sub_cbl_magnet_urls.len(), expected_subs);
            }
            other => panic!("expected super-cbl, got {}", other.type_name()),
        }
        assert_eq!(map.len(), expected_subs);

        // the walk recovers the address list in file order
        let walked = reconstruct_hierarchical_cbl(&cbl, 10, |url| {
            let bytes = map.load(&url);
            async move { bytes }
        })
        .await
        .unwrap();
        assert_eq!(walked.addresses, blocks);
        assert_eq!(walked.original_size, Some(1_000_000));
    }

    #[tokio::test]
    async fn depth_cap_of_one_rejects_any_split() {
        let creator = creator();
        let blocks = addresses(1000);
        let map = MapStore::new();

        let result = create_hierarchical_cbl(&blocks, &config(1), &creator, |bytes| {
            let url = map.save(bytes);
            async move { Ok(url) }
        })
        .await;

        match result {
            Err(CblError::MaxDepthExceeded { current, max }) => {
                assert_eq!(current, 2);
                assert_eq!(max, 1);
            }
            other => panic!("expected MaxDepthExceeded, got {other:?}"),
        }
        // the cap was checked before any sub was stored
        assert_eq!(map.len(), 0);
    }

    #[tokio::test]
    async fn very_large_lists_stack_a_third_level() {
        let creator = creator();
        let config = config(10);
        let cap = config.address_capacity();
        let url_cap = url_list_capacity(config.block_size);

        // enough blocks that the sub URL list itself overflows
        let count = cap * url_cap + cap;
        let blocks = addresses(count);
        let map = MapStore::new();

        let cbl = create_hierarchical_cbl(&blocks, &config, &creator, |bytes| {
            let url = map.save(bytes);
            async move { Ok(url) }
        })
        .await
        .unwrap();

        match &cbl {
            CblData::Super(sup) => {
                assert_eq!(sup.depth, 3);
                assert_eq!(sup.total_block_count, count as u64);
                assert_eq!(sup.sub_cbl_magnet_urls.len(), 2);
            }
            other => panic!("expected super-cbl, got {}", other.type_name()),
        }

        let walked = reconstruct_hierarchical_cbl(&cbl, 10, |url| {
            let bytes = map.load(&url);
            async move { bytes }
        })
        .await
        .unwrap();
        assert_eq!(walked.addresses.len(), count);
        assert_eq!(walked.addresses, blocks);
    }

    #[tokio::test]
    async fn missing_child_is_wrapped() {
        let sup = CblData::Super(SuperCbl {
            total_block_count: 9,
            depth: 2,
            sub_cbl_count: 1,
            sub_cbl_magnet_urls: vec!["magnet:?sub=404".into()],
            block_size: 512,
            file_name: None,
        });

        let result = reconstruct_hierarchical_cbl(&sup, 10, |url| async move {
            Err(CblError::InvalidCblFormat(format!("no manifest at {url}")))
        })
        .await;

        match result {
            Err(CblError::MissingSubCbl { url, cause }) => {
                assert_eq!(url, "magnet:?sub=404");
                assert!(cause.contains("no manifest"));
            }
            other => panic!("expected MissingSubCbl, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dishonest_totals_are_caught() {
        let creator = creator();
        let blocks = addresses(1000);
        let config = config(10);
        let map = MapStore::new();

        let cbl = create_hierarchical_cbl(&blocks, &config, &creator, |bytes| {
            let url = map.save(bytes);
            async move { Ok(url) }
        })
        .await
        .unwrap();

        let CblData::Super(mut sup) = cbl else {
            panic!("expected a super-cbl");
        };
        sup.total_block_count = 999;

        let result =
            reconstruct_hierarchical_cbl(&CblData::Super(sup), 10, |url| {
                let bytes = map.load(&url);
                async move { bytes }
            })
            .await;

        match result {
            Err(CblError::BlockCountMismatch { expected, actual }) => {
                assert_eq!(expected, 999);
                assert_eq!(actual, 1000);
            }
            other => panic!("expected BlockCountMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_decreasing_depth_is_rejected() {
        // a child claiming the same depth as its parent would loop
        let child = SuperCbl {
            total_block_count: 5,
            depth: 2,
            sub_cbl_count: 0,
            sub_cbl_magnet_urls: vec![],
            block_size: 512,
            file_name: None,
        };
        let child_bytes = child.to_bytes().unwrap();

        let root = CblData::Super(SuperCbl {
            total_block_count: 5,
            depth: 2,
            sub_cbl_count: 1,
            sub_cbl_magnet_urls: vec!["magnet:?sub=1".into()],
            block_size: 512,
            file_name: None,
        });

        let result = reconstruct_hierarchical_cbl(&root, 10, |_| {
            let bytes = child_bytes.clone();
            async move { Ok(bytes) }
        })
        .await;

        assert!(matches!(result, Err(CblError::InvalidCblFormat(_))));
    }

    #[tokio::test]
    async fn runaway_depth_is_rejected() {
        let root = CblData::Super(SuperCbl {
            total_block_count: 5,
            depth: 99,
            sub_cbl_count: 0,
            sub_cbl_magnet_urls: vec![],
            block_size: 512,
            file_name: None,
        });

        let result = reconstruct_hierarchical_cbl(&root, 10, |_| async move {
            Ok(Vec::new())
        })
        .await;

        assert!(matches!(
            result,
            Err(CblError::MaxDepthExceeded {
                current: 99,
                max: 10
            })
        ));
    }
}
