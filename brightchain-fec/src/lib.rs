//! Reed-Solomon forward error correction
//!
//! Shards are a fixed byte size. An encode of `N` data shards and `K`
//! parity shards produces one contiguous buffer of `(N + K) * shard_size`
//! bytes with the data verbatim up front (systematic layout); any `N`
//! surviving shards reconstruct the data exactly.
//!
//! The field arithmetic comes from the `reed-solomon-erasure` codec;
//! this crate adapts it to the flat buffer + availability-flags calling
//! convention the block store wants, and layers the store's error
//! vocabulary on top. Encoding and decoding are pure functions of their
//! inputs.

use reed_solomon_erasure::galois_8;
use thiserror::Error;

/// Errors surfaced by the FEC engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FecError {
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("not enough shards: {available} available, {required} required")]
    NotEnoughShards { available: usize, required: usize },
}

/// A Reed-Solomon coder for a fixed `(data, parity)` geometry.
///
/// A geometry with zero parity shards is legal and degenerates to plain
/// pass-through: nothing to derive, nothing to recover from.
#[derive(Clone)]
pub struct ReedSolomon {
    data_shards: usize,
    parity_shards: usize,
    codec: Option<galois_8::ReedSolomon>,
}

impl ReedSolomon {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, FecError> {
        if data_shards == 0 {
            return Err(FecError::EncodingFailed(
                "at least one data shard is required".into(),
            ));
        }

        let codec = if parity_shards == 0 {
            None
        } else {
            let codec = galois_8::ReedSolomon::new(data_shards, parity_shards)
                .map_err(|e| FecError::EncodingFailed(e.to_string()))?;
            Some(codec)
        };

        Ok(Self {
            data_shards,
            parity_shards,
            codec,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// slice `data` into equal shards, zero-padding the tail
    fn data_rows(&self, data: &[u8], shard_size: usize) -> Vec<Vec<u8>> {
        let mut rows = Vec::with_capacity(self.total_shards());
        for index in 0..self.data_shards {
            let mut row = vec![0u8; shard_size];
            let start = (index * shard_size).min(data.len());
            let end = ((index + 1) * shard_size).min(data.len());
            row[..end - start].copy_from_slice(&data[start..end]);
            rows.push(row);
        }
        rows
    }

    /// encode `data` into a contiguous `(data + parity) * shard_size`
    /// buffer.
    ///
    /// With `padded` set the input must already be exactly
    /// `data_shards * shard_size` bytes; otherwise any shorter input is
    /// zero-extended into the data shards.
    pub fn encode(&self, data: &[u8], shard_size: usize, padded: bool) -> Result<Vec<u8>, FecError> {
        if shard_size == 0 {
            return Err(FecError::EncodingFailed("zero shard size".into()));
        }

        let data_len = self.data_shards * shard_size;
        if padded && data.len() != data_len {
            return Err(FecError::EncodingFailed(format!(
                "padded input is {} bytes, geometry wants {data_len}",
                data.len()
            )));
        }
        if data.len() > data_len {
            return Err(FecError::EncodingFailed(format!(
                "input of {} bytes overflows {} data shards of {shard_size}",
                data.len(),
                self.data_shards
            )));
        }

        // data rows up front, zeroed parity rows behind; the codec fills
        // the parity in place
        let mut shards = self.data_rows(data, shard_size);
        for _ in 0..self.parity_shards {
            shards.push(vec![0u8; shard_size]);
        }

        if let Some(codec) = &self.codec {
            codec
                .encode(&mut shards)
                .map_err(|e| FecError::EncodingFailed(e.to_string()))?;
        }

        Ok(shards.concat())
    }

    /// reconstruct the data region from a shard buffer with erasures.
    ///
    /// `available[i]` marks whether shard `i` of the buffer holds valid
    /// bytes. At least `data_shards` positions must be available;
    /// reconstruction returns exactly `data_shards * shard_size` bytes.
    pub fn decode(
        &self,
        shards: &[u8],
        shard_size: usize,
        available: &[bool],
    ) -> Result<Vec<u8>, FecError> {
        let total = self.total_shards();
        if shard_size == 0 || shards.len() != total * shard_size {
            return Err(FecError::DecodingFailed(format!(
                "shard buffer is {} bytes, geometry wants {}",
                shards.len(),
                total * shard_size
            )));
        }
        if available.len() != total {
            return Err(FecError::DecodingFailed(format!(
                "{} availability flags for {total} shards",
                available.len()
            )));
        }

        let present = available.iter().filter(|a| **a).count();
        if present < self.data_shards {
            return Err(FecError::NotEnoughShards {
                available: present,
                required: self.data_shards,
            });
        }

        // systematic fast path: all data shards survived
        if available[..self.data_shards].iter().all(|a| *a) {
            return Ok(shards[..self.data_shards * shard_size].to_vec());
        }

        let Some(codec) = &self.codec else {
            // with zero parity, "all data present" is the only way past
            // the threshold check above
            return Err(FecError::DecodingFailed(
                "no parity shards to reconstruct from".into(),
            ));
        };

        let mut slots: Vec<Option<Vec<u8>>> = shards
            .chunks(shard_size)
            .zip(available.iter())
            .map(|(chunk, ok)| ok.then(|| chunk.to_vec()))
            .collect();

        codec
            .reconstruct_data(&mut slots)
            .map_err(|e| FecError::DecodingFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(self.data_shards * shard_size);
        for slot in slots.into_iter().take(self.data_shards) {
            let row = slot.ok_or_else(|| {
                FecError::DecodingFailed("reconstruction left a data shard empty".into())
            })?;
            out.extend_from_slice(&row);
        }
        Ok(out)
    }
}

/// one-shot encode, see [`ReedSolomon::encode`]
pub fn encode(
    data: &[u8],
    shard_size: usize,
    data_shards: usize,
    parity_shards: usize,
    padded: bool,
) -> Result<Vec<u8>, FecError> {
    ReedSolomon::new(data_shards, parity_shards)?.encode(data, shard_size, padded)
}

/// one-shot decode, see [`ReedSolomon::decode`]
pub fn decode(
    shards: &[u8],
    shard_size: usize,
    data_shards: usize,
    parity_shards: usize,
    available: &[bool],
) -> Result<Vec<u8>, FecError> {
    ReedSolomon::new(data_shards, parity_shards)?.decode(shards, shard_size, available)
}
