//! Equal-length XOR combination.
//!
//! XOR is the whitening primitive of the whole system: a payload combined
//! with randomizer blocks yields a block that reveals nothing on its own,
//! and combining again with the same randomizers restores the payload.

use crate::CodecError;

/// XOR two equal-length byte sequences into a fresh buffer.
pub fn xor(a: &[u8], b: &[u8]) -> Result<Vec<u8>, CodecError> {
    if a.len() != b.len() {
        return Err(CodecError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect())
}

/// XOR `src` into `dst` in place.
pub fn xor_in_place(dst: &mut [u8], src: &[u8]) -> Result<(), CodecError> {
    if dst.len() != src.len() {
        return Err(CodecError::LengthMismatch {
            left: dst.len(),
            right: src.len(),
        });
    }

    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }

    Ok(())
}

/// XOR an arbitrary number of equal-length sequences together.
///
/// Fails with [`CodecError::LengthMismatch`] on the first sequence whose
/// length differs from the first one. An empty input list yields an empty
/// buffer.
pub fn xor_all<I, B>(parts: I) -> Result<Vec<u8>, CodecError>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut iter = parts.into_iter();

    let Some(first) = iter.next() else {
        return Ok(Vec::new());
    };

    let mut acc = first.as_ref().to_vec();
    for part in iter {
        xor_in_place(&mut acc, part.as_ref())?;
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mismatch_rejected() {
        assert_eq!(
            xor(&[1, 2], &[1]),
            Err(CodecError::LengthMismatch { left: 2, right: 1 })
        );
    }

    #[test]
    fn xor_all_of_three() {
        let out = xor_all([&[0b1100u8][..], &[0b1010][..], &[0b0001][..]]).unwrap();
        assert_eq!(out, vec![0b0111]);
    }

    proptest! {
        #[test]
        fn involution((a, b) in proptest::collection::vec(any::<u8>(), 0..256).prop_flat_map(|a| {
                          let len = a.len();
                          (Just(a), proptest::collection::vec(any::<u8>(), len..=len))
                      })) {
            let once = xor(&a, &b).unwrap();
            let twice = xor(&once, &b).unwrap();
            prop_assert_eq!(twice, a);
        }

        #[test]
        fn whitening_round_trip(p in proptest::collection::vec(any::<u8>(), 1..512),
                                seed in any::<u64>()) {
            // two pseudo-randomizers the same length as the payload
            let r1: Vec<u8> = (0..p.len()).map(|i| (seed.wrapping_mul(i as u64 + 1) >> 3) as u8).collect();
            let r2: Vec<u8> = (0..p.len()).map(|i| (seed.wrapping_add(i as u64 * 7) >> 5) as u8).collect();

            let s = xor_all([&p[..], &r1[..], &r2[..]]).unwrap();
            let back = xor_all([&s[..], &r1[..], &r2[..]]).unwrap();
            prop_assert_eq!(back, p);
        }
    }
}
