//! Tag-prefixed length framing.
//!
//! A frame is `tag || length || payload` where the one-byte tag picks the
//! width of the big-endian length field: 0 reads a `u8`, 1 a `u16`, 2 a
//! `u32`, 3 a `u64`. The encoder always emits the smallest width that fits; the
//! decoder accepts any of the four. Framing is how a variable-length
//! payload (a CBL, a participant record) is padded into a fixed-size
//! block and later trimmed back without an external length.

use crate::{be, CodecError};

/// tag values on the wire
const TAG_U8: u8 = 0;
const TAG_U16: u8 = 1;
const TAG_U32: u8 = 2;
const TAG_U64: u8 = 3;

/// A decoded frame: the payload plus the total number of bytes the frame
/// occupied (tag + length field + payload).
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub payload: &'a [u8],
    pub consumed: usize,
}

/// the encoded overhead for a payload of the given length
pub fn overhead_for(len: usize) -> usize {
    if len <= u8::MAX as usize {
        2
    } else if len <= u16::MAX as usize {
        3
    } else if len <= u32::MAX as usize {
        5
    } else {
        9
    }
}

/// encode `payload` with the smallest length prefix that fits
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut w = be::Writer::with_capacity(overhead_for(payload.len()) + payload.len());

    if payload.len() <= u8::MAX as usize {
        w.put_u8(TAG_U8).put_u8(payload.len() as u8);
    } else if payload.len() <= u16::MAX as usize {
        w.put_u8(TAG_U16).put_u16(payload.len() as u16);
    } else if payload.len() <= u32::MAX as usize {
        w.put_u8(TAG_U32).put_u32(payload.len() as u32);
    } else {
        w.put_u8(TAG_U64).put_u64(payload.len() as u64);
    }

    w.put_bytes(payload);
    w.into_bytes()
}

/// decode one frame from the head of `buf`.
///
/// Trailing bytes after the frame are ignored (they are padding when the
/// frame was stored inside a fixed-size block).
pub fn decode(buf: &[u8]) -> Result<Frame<'_>, CodecError> {
    let mut r = be::Reader::new(buf);

    let tag = r.read_u8()?;
    let length = match tag {
        TAG_U8 => r.read_u8()? as u64,
        TAG_U16 => r.read_u16()? as u64,
        TAG_U32 => r.read_u32()? as u64,
        TAG_U64 => r.read_u64()?,
        other => return Err(CodecError::UnknownTag(other)),
    };

    if length > r.remaining() as u64 {
        return Err(CodecError::FrameOverflow {
            length,
            available: r.remaining(),
        });
    }

    let payload = r.read_bytes(length as usize)?;

    Ok(Frame {
        payload,
        consumed: r.position(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_payload_uses_u8_prefix() {
        let encoded = encode(b"hi");
        assert_eq!(encoded, vec![TAG_U8, 2, b'h', b'i']);
    }

    #[test]
    fn medium_payload_uses_u16_prefix() {
        let payload = vec![0xaa; 300];
        let encoded = encode(&payload);
        assert_eq!(encoded[0], TAG_U16);
        assert_eq!(&encoded[1..3], &300u16.to_be_bytes());
        assert_eq!(encoded.len(), 3 + 300);
    }

    #[test]
    fn decode_ignores_padding() {
        let mut encoded = encode(b"data");
        let consumed = encoded.len();
        encoded.extend_from_slice(&[0u8; 40]);

        let frame = decode(&encoded).unwrap();
        assert_eq!(frame.payload, b"data");
        assert_eq!(frame.consumed, consumed);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(decode(&[9, 0, 0]), Err(CodecError::UnknownTag(9)));
    }

    #[test]
    fn truncated_payload_rejected() {
        // claims 10 bytes, carries 2
        assert_eq!(
            decode(&[TAG_U8, 10, 1, 2]),
            Err(CodecError::FrameOverflow {
                length: 10,
                available: 2
            })
        );
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(decode(&[]), Err(CodecError::Truncated { .. })));
    }

    proptest! {
        #[test]
        fn round_trip(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = encode(&payload);
            let frame = decode(&encoded).unwrap();
            prop_assert_eq!(frame.payload, &payload[..]);
            prop_assert_eq!(frame.consumed, encoded.len());
        }
    }
}
