//! Offset-addressed big-endian packing and a cursor-style reader.
//!
//! All multi-byte integers in the BrightChain formats are big-endian.

use crate::CodecError;

fn check(buf: &[u8], offset: usize, wanted: usize) -> Result<(), CodecError> {
    match buf.len().checked_sub(offset) {
        Some(available) if available >= wanted => Ok(()),
        Some(available) => Err(CodecError::Truncated {
            offset,
            wanted,
            available,
        }),
        None => Err(CodecError::Truncated {
            offset,
            wanted,
            available: 0,
        }),
    }
}

macro_rules! impl_put_get {
    ($put:ident, $get:ident, $t:ty) => {
        /// write the value big-endian at `offset`
        pub fn $put(buf: &mut [u8], offset: usize, value: $t) -> Result<(), CodecError> {
            const N: usize = std::mem::size_of::<$t>();
            check(buf, offset, N)?;
            buf[offset..offset + N].copy_from_slice(&value.to_be_bytes());
            Ok(())
        }

        /// read the value big-endian from `offset`
        pub fn $get(buf: &[u8], offset: usize) -> Result<$t, CodecError> {
            const N: usize = std::mem::size_of::<$t>();
            check(buf, offset, N)?;
            let mut raw = [0u8; N];
            raw.copy_from_slice(&buf[offset..offset + N]);
            Ok(<$t>::from_be_bytes(raw))
        }
    };
}

impl_put_get!(put_u8, get_u8, u8);
impl_put_get!(put_u16, get_u16, u16);
impl_put_get!(put_u32, get_u32, u32);
impl_put_get!(put_u64, get_u64, u64);

/// Sequential reader over a byte slice.
///
/// Every `read_*` advances the position; a short buffer surfaces as
/// [`CodecError::Truncated`] with the failing offset.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let v = get_u8(self.buf, self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let v = get_u16(self.buf, self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let v = get_u32(self.buf, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let v = get_u64(self.buf, self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    /// borrow the next `n` bytes and advance past them
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        check(self.buf, self.pos, n)?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

/// Append-only big-endian writer over a growable buffer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn put_get_at_offset() {
        let mut buf = vec![0u8; 16];
        put_u32(&mut buf, 4, 0xdead_beef).unwrap();
        assert_eq!(&buf[4..8], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(get_u32(&buf, 4).unwrap(), 0xdead_beef);
    }

    #[test]
    fn put_past_end_fails() {
        let mut buf = vec![0u8; 4];
        assert_eq!(
            put_u64(&mut buf, 0, 1),
            Err(CodecError::Truncated {
                offset: 0,
                wanted: 8,
                available: 4
            })
        );
        assert_eq!(
            get_u16(&buf, 3),
            Err(CodecError::Truncated {
                offset: 3,
                wanted: 2,
                available: 1
            })
        );
    }

    #[test]
    fn reader_walks_writer_output() {
        let mut w = Writer::new();
        w.put_u8(7).put_u16(0x0102).put_u64(99).put_bytes(b"tail");

        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_u64().unwrap(), 99);
        assert_eq!(r.read_bytes(4).unwrap(), b"tail");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reader_truncation_reports_position() {
        let mut r = Reader::new(&[1, 2]);
        r.read_u8().unwrap();
        assert_eq!(
            r.read_u32(),
            Err(CodecError::Truncated {
                offset: 1,
                wanted: 4,
                available: 1
            })
        );
    }

    proptest! {
        #[test]
        fn u64_round_trip(v in any::<u64>(), pad in 0usize..8) {
            let mut buf = vec![0u8; 8 + pad];
            put_u64(&mut buf, pad, v).unwrap();
            prop_assert_eq!(get_u64(&buf, pad).unwrap(), v);
        }

        #[test]
        fn u32_round_trip(v in any::<u32>()) {
            let mut buf = vec![0u8; 4];
            put_u32(&mut buf, 0, v).unwrap();
            prop_assert_eq!(get_u32(&buf, 0).unwrap(), v);
        }
    }
}
