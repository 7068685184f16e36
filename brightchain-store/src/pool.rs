//! Optional pool scoping of the storage key space.
//!
//! A pool id is `[A-Za-z0-9_-]`, 1 to 64 characters, case sensitive;
//! `default` is the reserved name for the implicit pool. Scoped storage
//! keys are `<poolId>:<hex>`; pool ids cannot contain colons, so parsing
//! splits at the first one.

use std::str::FromStr;

use crate::{BlockId, StoreError};

pub const MAX_POOL_ID_LEN: usize = 64;

/// the reserved pool name callers get when they never chose one
pub const DEFAULT_POOL: &str = "default";

/// `^[A-Za-z0-9_-]{1,64}$`
pub fn is_valid_pool_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_POOL_ID_LEN
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// render a storage key, scoped when a pool is given
pub fn make_storage_key(pool: Option<&str>, id: &BlockId) -> Result<String, StoreError> {
    match pool {
        None => Ok(id.to_string()),
        Some(pool) => {
            if !is_valid_pool_id(pool) {
                return Err(StoreError::validation(format!("invalid pool id `{pool}`")));
            }
            Ok(format!("{pool}:{id}"))
        }
    }
}

/// split a storage key back into its pool and block id
pub fn parse_storage_key(key: &str) -> Result<(Option<String>, BlockId), StoreError> {
    let (pool, hex) = match key.split_once(':') {
        Some((pool, hex)) => {
            if !is_valid_pool_id(pool) {
                return Err(StoreError::validation(format!(
                    "invalid pool id `{pool}` in storage key"
                )));
            }
            (Some(pool.to_string()), hex)
        }
        None => (None, key),
    };

    let id = BlockId::from_str(hex)
        .map_err(|_| StoreError::validation(format!("invalid block id `{hex}` in storage key")))?;

    Ok((pool, id))
}
