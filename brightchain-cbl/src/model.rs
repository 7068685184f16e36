//! The logical CBL variants.
//!
//! Four shapes share the "constituent block list" name:
//!
//! * [`LegacyCbl`]: the version-1 JSON document kept for old manifests
//! * [`RegularCbl`]: the signed binary form of [`crate::header`]
//! * [`SubCbl`]: a binary CBL holding one slice of a larger address
//!   list, with its position metadata
//! * [`SuperCbl`]: the JSON manifest referencing child manifests by
//!   magnet URL
//!
//! [`parse_document`] sniffs a retrieved buffer (JSON object vs binary
//! header) and yields the matching variant; unknown `type` discriminators
//! and unsupported legacy versions are rejected with the dedicated
//! errors.

use brightchain_magnet::BlockId;
use serde::{Deserialize, Serialize};

use crate::header::{self, ParsedCbl};
use crate::CblError;

/// The version-1 JSON manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyCbl {
    pub version: u32,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "originalSize")]
    pub original_size: u64,
    #[serde(rename = "blockSize")]
    pub block_size: u32,
    #[serde(rename = "blockCount")]
    pub block_count: u64,
    /// hex block ids, in file order
    pub blocks: Vec<String>,
}

impl LegacyCbl {
    pub fn addresses(&self) -> Result<Vec<BlockId>, CblError> {
        self.blocks
            .iter()
            .map(|hex| {
                hex.parse().map_err(|_| {
                    CblError::InvalidCblFormat(format!("legacy block id `{hex}` is not hex"))
                })
            })
            .collect()
    }
}

/// A parsed binary CBL, the canonical form of a direct manifest.
pub type RegularCbl = ParsedCbl;

/// One slice of a split address list, with its position among the
/// siblings. The wire form is the plain binary CBL; index and total are
/// metadata implied by the parent manifest's URL order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCbl {
    pub sub_cbl_index: u32,
    pub total_sub_cbls: u32,
    pub cbl: RegularCbl,
}

/// The hierarchical manifest: children referenced by magnet URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperCbl {
    #[serde(rename = "totalBlockCount")]
    pub total_block_count: u64,
    pub depth: u32,
    #[serde(rename = "subCblCount")]
    pub sub_cbl_count: u32,
    #[serde(rename = "subCblMagnetUrls")]
    pub sub_cbl_magnet_urls: Vec<String>,
    #[serde(rename = "blockSize")]
    pub block_size: u32,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none", default)]
    pub file_name: Option<String>,
}

/// JSON envelope distinguishing typed documents from the legacy form.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum TaggedDocument {
    #[serde(rename = "super-cbl")]
    Super(SuperCbl),
}

impl SuperCbl {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CblError> {
        serde_json::to_vec(&TaggedDocument::Super(self.clone()))
            .map_err(|e| CblError::InvalidCblFormat(format!("encode super-cbl: {e}")))
    }
}

/// Any CBL, discriminated.
#[derive(Debug, Clone, PartialEq)]
pub enum CblData {
    V1(LegacyCbl),
    Regular(RegularCbl),
    Sub(SubCbl),
    Super(SuperCbl),
}

impl CblData {
    /// how many leaf block addresses this manifest accounts for
    pub fn block_count(&self) -> u64 {
        match self {
            CblData::V1(legacy) => legacy.block_count,
            CblData::Regular(regular) => regular.header.address_count as u64,
            CblData::Sub(sub) => sub.cbl.header.address_count as u64,
            CblData::Super(sup) => sup.total_block_count,
        }
    }

    /// the wire discriminator used in JSON documents
    pub fn type_name(&self) -> &'static str {
        match self {
            CblData::V1(_) => "v1",
            CblData::Regular(_) => "regular",
            CblData::Sub(_) => "sub-cbl",
            CblData::Super(_) => "super-cbl",
        }
    }
}

/// decode a retrieved manifest buffer.
///
/// JSON objects dispatch on their `type` field (or on `version` for the
/// legacy form); anything else is treated as a binary CBL header.
pub fn parse_document(bytes: &[u8]) -> Result<CblData, CblError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    let value = if first == Some(&b'{') {
        // a binary header could coincidentally start with `{`, so a
        // failed JSON parse falls through to the binary codec
        serde_json::from_slice::<serde_json::Value>(bytes).ok()
    } else {
        None
    };

    let Some(value) = value else {
        return Ok(CblData::Regular(header::parse(bytes)?));
    };

    if let Some(doc_type) = value.get("type").and_then(|t| t.as_str()) {
        return match doc_type {
            "super-cbl" => {
                let TaggedDocument::Super(sup) = serde_json::from_value(value)
                    .map_err(|e| CblError::InvalidCblFormat(format!("super-cbl: {e}")))?;
                Ok(CblData::Super(sup))
            }
            other => Err(CblError::InvalidCblType(other.to_string())),
        };
    }

    match value.get("version").and_then(|v| v.as_u64()) {
        Some(1) => {
            let legacy: LegacyCbl = serde_json::from_value(value)
                .map_err(|e| CblError::InvalidCblFormat(format!("legacy cbl: {e}")))?;
            Ok(CblData::V1(legacy))
        }
        Some(other) => Err(CblError::InvalidCblFormat(format!(
            "unsupported CBL version {other}"
        ))),
        None => Err(CblError::InvalidCblFormat(
            "JSON manifest carries neither `type` nor `version`".into(),
        )),
    }
}
