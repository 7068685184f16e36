//! Magnet URLs for BrightChain manifests
//!
//! A magnet URL is the self-describing name of a stored artifact: it
//! carries the block size and the ids of every block (and optional parity
//! block) needed to reconstruct it. Two topics exist:
//!
//! * `urn:brightchain:cbl`: a whitened constituent block list stored as
//!   an XOR pair, see [`CblMagnet`]
//! * `urn:brightchain:tuple`: a 3-block XOR tuple, see [`TupleMagnet`]
//!
//! Hex fields are lowercase on the wire; parity lists are comma
//! separated; `enc=1` flags a payload that is further encrypted by an
//! external cipher. Parsing is strict: unknown topics, uppercase hex and
//! missing parameters are all rejected with a dedicated error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use brightchain_crypto::hash::Hash;
use thiserror::Error;

/// block identity, the SHA3-256 digest of the block bytes
pub type BlockId = Hash<32>;

const MAGNET_PREFIX: &str = "magnet:?";
const CBL_TOPIC: &str = "urn:brightchain:cbl";
const TUPLE_TOPIC: &str = "urn:brightchain:tuple";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MagnetError {
    #[error("not a magnet URL")]
    NotAMagnet,

    #[error("missing required parameter `{0}`")]
    MissingParam(&'static str),

    #[error("duplicate parameter `{0}`")]
    DuplicateParam(String),

    #[error("unknown magnet topic `{0}`")]
    UnknownTopic(String),

    #[error("parameter `{param}` is not a lowercase 32-byte hex id: `{value}`")]
    BadBlockId { param: String, value: String },

    #[error("parameter `bs` is not a block size: `{0}`")]
    BadBlockSize(String),

    #[error("parameter `{param}` has a malformed value `{value}`")]
    BadValue { param: String, value: String },
}

/// Whitened-CBL magnet: the XOR pair plus optional per-block parity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CblMagnet {
    pub block_size: u32,
    pub block1: BlockId,
    pub block2: BlockId,
    pub parity1: Vec<BlockId>,
    pub parity2: Vec<BlockId>,
    pub encrypted: bool,
}

/// Tuple magnet: the data block, its two randomizers and optional parity
/// for each of the three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleMagnet {
    pub block_size: u32,
    pub data: BlockId,
    pub randomizer1: BlockId,
    pub randomizer2: BlockId,
    pub parity_data: Vec<BlockId>,
    pub parity_randomizer1: Vec<BlockId>,
    pub parity_randomizer2: Vec<BlockId>,
}

/// Either magnet topic, for callers that sniff before dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Magnet {
    Cbl(CblMagnet),
    Tuple(TupleMagnet),
}

fn parse_params(s: &str) -> Result<HashMap<&str, &str>, MagnetError> {
    let query = s.strip_prefix(MAGNET_PREFIX).ok_or(MagnetError::NotAMagnet)?;

    let mut params = HashMap::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').ok_or_else(|| MagnetError::BadValue {
            param: pair.to_string(),
            value: String::new(),
        })?;
        if params.insert(key, value).is_some() {
            return Err(MagnetError::DuplicateParam(key.to_string()));
        }
    }
    Ok(params)
}

fn require<'a>(
    params: &HashMap<&str, &'a str>,
    key: &'static str,
) -> Result<&'a str, MagnetError> {
    params.get(key).copied().ok_or(MagnetError::MissingParam(key))
}

fn parse_id(param: &str, value: &str) -> Result<BlockId, MagnetError> {
    let malformed = || MagnetError::BadBlockId {
        param: param.to_string(),
        value: value.to_string(),
    };

    if value.len() != 64 || value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(malformed());
    }
    value.parse().map_err(|_| malformed())
}

fn parse_id_list(params: &HashMap<&str, &str>, param: &str) -> Result<Vec<BlockId>, MagnetError> {
    match params.get(param) {
        None => Ok(Vec::new()),
        Some(value) => value.split(',').map(|id| parse_id(param, id)).collect(),
    }
}

fn parse_block_size(value: &str) -> Result<u32, MagnetError> {
    value
        .parse::<u32>()
        .map_err(|_| MagnetError::BadBlockSize(value.to_string()))
}

fn push_id_list(out: &mut String, key: &str, ids: &[BlockId]) {
    if ids.is_empty() {
        return;
    }
    out.push('&');
    out.push_str(key);
    out.push('=');
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
}

impl CblMagnet {
    /// the two pair ids, order as emitted; XOR is commutative so either
    /// order reconstructs
    pub fn pair(&self) -> [BlockId; 2] {
        [self.block1, self.block2]
    }
}

impl fmt::Display for CblMagnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format!(
            "{MAGNET_PREFIX}xt={CBL_TOPIC}&bs={}&b1={}&b2={}",
            self.block_size, self.block1, self.block2
        );
        push_id_list(&mut out, "p1", &self.parity1);
        push_id_list(&mut out, "p2", &self.parity2);
        if self.encrypted {
            out.push_str("&enc=1");
        }
        f.write_str(&out)
    }
}

impl FromStr for CblMagnet {
    type Err = MagnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params = parse_params(s)?;

        let topic = require(&params, "xt")?;
        if topic != CBL_TOPIC {
            return Err(MagnetError::UnknownTopic(topic.to_string()));
        }

        let encrypted = match params.get("enc") {
            None => false,
            Some(&"1") => true,
            Some(other) => {
                return Err(MagnetError::BadValue {
                    param: "enc".to_string(),
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            block_size: parse_block_size(require(&params, "bs")?)?,
            block1: parse_id("b1", require(&params, "b1")?)?,
            block2: parse_id("b2", require(&params, "b2")?)?,
            parity1: parse_id_list(&params, "p1")?,
            parity2: parse_id_list(&params, "p2")?,
            encrypted,
        })
    }
}

impl fmt::Display for TupleMagnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format!(
            "{MAGNET_PREFIX}xt={TUPLE_TOPIC}&bs={}&d={}&r1={}&r2={}",
            self.block_size, self.data, self.randomizer1, self.randomizer2
        );
        push_id_list(&mut out, "pd", &self.parity_data);
        push_id_list(&mut out, "pr1", &self.parity_randomizer1);
        push_id_list(&mut out, "pr2", &self.parity_randomizer2);
        f.write_str(&out)
    }
}

impl FromStr for TupleMagnet {
    type Err = MagnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params = parse_params(s)?;

        let topic = require(&params, "xt")?;
        if topic != TUPLE_TOPIC {
            return Err(MagnetError::UnknownTopic(topic.to_string()));
        }

        Ok(Self {
            block_size: parse_block_size(require(&params, "bs")?)?,
            data: parse_id("d", require(&params, "d")?)?,
            randomizer1: parse_id("r1", require(&params, "r1")?)?,
            randomizer2: parse_id("r2", require(&params, "r2")?)?,
            parity_data: parse_id_list(&params, "pd")?,
            parity_randomizer1: parse_id_list(&params, "pr1")?,
            parity_randomizer2: parse_id_list(&params, "pr2")?,
        })
    }
}

impl fmt::Display for Magnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnet::Cbl(m) => m.fmt(f),
            Magnet::Tuple(m) => m.fmt(f),
        }
    }
}

impl FromStr for Magnet {
    type Err = MagnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let params = parse_params(s)?;
        match require(&params, "xt")? {
            CBL_TOPIC => Ok(Magnet::Cbl(s.parse()?)),
            TUPLE_TOPIC => Ok(Magnet::Tuple(s.parse()?)),
            other => Err(MagnetError::UnknownTopic(other.to_string())),
        }
    }
}
