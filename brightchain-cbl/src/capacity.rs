//! Address capacity arithmetic.
//!
//! How many 32-byte block addresses fit in one block of a given size
//! once the header, signature and (optional) encryption envelope have
//! taken their share. A capacity of zero means the block cannot hold a
//! valid CBL of that shape at all.

use crate::header::{ADDRESS_LEN, BASE_HEADER_LEN, SIGNATURE_LEN};

/// ECIES envelope: 65-byte uncompressed ephemeral key, 16-byte IV,
/// 16-byte auth tag
pub const ECIES_OVERHEAD: usize = 97;
/// per-recipient share of a multi-recipient envelope
pub const PER_RECIPIENT_OVERHEAD: usize = 129;
/// fixed cost of the recipient list framing
pub const RECIPIENT_LIST_OVERHEAD: usize = 8;

/// policy cap on the original file size a CBL may describe (1 TiB)
pub const MAX_INPUT_FILE_SIZE: u64 = 1 << 40;

/// the fewest addresses a CBL is allowed to carry
pub const MIN_ADDRESS_COUNT: usize = 4;

/// How the stored CBL buffer is (or is not) encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncryptionMode {
    #[default]
    None,
    SingleRecipient,
    MultiRecipient(usize),
}

impl EncryptionMode {
    pub fn overhead(self) -> usize {
        match self {
            EncryptionMode::None => 0,
            EncryptionMode::SingleRecipient => ECIES_OVERHEAD,
            EncryptionMode::MultiRecipient(recipients) => {
                PER_RECIPIENT_OVERHEAD * recipients + RECIPIENT_LIST_OVERHEAD
            }
        }
    }
}

/// byte length of the optional extended header for the given field sizes
pub const fn extended_header_len(file_name_len: usize, mime_type_len: usize) -> usize {
    2 + file_name_len + 1 + mime_type_len
}

/// address capacity of one block.
///
/// `extended` carries the `(file name, mime type)` byte lengths when the
/// extended header is present. The result is rounded down to a multiple
/// of `tuple_size` and floors to zero below [`MIN_ADDRESS_COUNT`].
pub fn address_capacity(
    block_size: usize,
    mode: EncryptionMode,
    extended: Option<(usize, usize)>,
    tuple_size: u8,
) -> usize {
    let overhead = BASE_HEADER_LEN
        + extended.map_or(0, |(f, m)| extended_header_len(f, m))
        + SIGNATURE_LEN
        + mode.overhead();

    let Some(available) = block_size.checked_sub(overhead) else {
        return 0;
    };

    let mut cap = available / ADDRESS_LEN;
    cap -= cap % tuple_size.max(1) as usize;

    if cap >= MIN_ADDRESS_COUNT {
        cap
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_block_plain_header() {
        // 512 - (86 + 64) = 362 bytes, 11 addresses, 9 after tuple rounding
        let cap = address_capacity(512, EncryptionMode::None, None, 3);
        assert_eq!(cap, 9);
    }

    #[test]
    fn extended_header_costs_addresses() {
        let plain = address_capacity(4096, EncryptionMode::None, None, 3);
        let extended = address_capacity(4096, EncryptionMode::None, Some((64, 32)), 3);
        assert!(extended < plain);
        assert_eq!(extended % 3, 0);
    }

    #[test]
    fn encryption_costs_addresses() {
        let plain = address_capacity(1024, EncryptionMode::None, None, 3);
        let single = address_capacity(1024, EncryptionMode::SingleRecipient, None, 3);
        let multi = address_capacity(1024, EncryptionMode::MultiRecipient(3), None, 3);
        assert!(single < plain);
        assert!(multi < single);
    }

    #[test]
    fn tiny_blocks_hold_nothing() {
        assert_eq!(address_capacity(128, EncryptionMode::None, None, 3), 0);
        // large tuple size can push a small capacity under the floor
        assert_eq!(address_capacity(512, EncryptionMode::None, None, 11), 0);
    }

    proptest! {
        /// capacity is non-decreasing in block size (fixed shape)
        #[test]
        fn monotonic_in_block_size(
            smaller in 128usize..=1_048_576,
            delta in 0usize..=65_536,
            tuple_size in 3u8..=16,
        ) {
            let small = address_capacity(smaller, EncryptionMode::None, Some((32, 16)), tuple_size);
            let large = address_capacity(smaller + delta, EncryptionMode::None, Some((32, 16)), tuple_size);
            prop_assert!(large >= small);
        }

        /// any nonzero capacity is a tuple multiple and at least the floor
        #[test]
        fn shape_invariants(
            block_size in 128usize..=1_048_576,
            tuple_size in 3u8..=32,
        ) {
            let cap = address_capacity(block_size, EncryptionMode::None, None, tuple_size);
            if cap > 0 {
                prop_assert_eq!(cap % tuple_size as usize, 0);
                prop_assert!(cap >= MIN_ADDRESS_COUNT);
            }
        }
    }
}
