//! Big-endian field readers over raw byte slices.
//!
//! Every read is bounds-checked against the slice and reports
//! `FeedError::BufferTooSmall` instead of panicking, so nothing here ever
//! reinterprets network bytes as a packed struct.

use crate::error::{FeedError, FeedResult};
use byteorder::{BigEndian, ByteOrder};

#[inline]
fn field(buf: &[u8], offset: usize, len: usize) -> FeedResult<&[u8]> {
    let end = offset.checked_add(len).ok_or(FeedError::BufferTooSmall {
        need: usize::MAX,
        have: buf.len(),
    })?;
    buf.get(offset..end).ok_or(FeedError::BufferTooSmall {
        need: end,
        have: buf.len(),
    })
}

pub fn read_u16_at(buf: &[u8], offset: usize) -> FeedResult<u16> {
    field(buf, offset, 2).map(BigEndian::read_u16)
}

pub fn read_u32_at(buf: &[u8], offset: usize) -> FeedResult<u32> {
    field(buf, offset, 4).map(BigEndian::read_u32)
}

pub fn read_u64_at(buf: &[u8], offset: usize) -> FeedResult<u64> {
    field(buf, offset, 8).map(BigEndian::read_u64)
}

pub fn read_i64_at(buf: &[u8], offset: usize) -> FeedResult<i64> {
    field(buf, offset, 8).map(BigEndian::read_i64)
}

/// Read a fixed-width, right-space-padded ASCII field and trim the padding.
pub fn read_padded_str_at(buf: &[u8], offset: usize, len: usize) -> FeedResult<String> {
    field(buf, offset, len).map(padded_to_string)
}

/// Strip trailing ASCII spaces by scanning backward from the end.
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b' ' {
        end -= 1;
    }
    &bytes[..end]
}

pub fn padded_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_padding(bytes)).into_owned()
}

/// Sequential reader for fixed-layout records.
///
/// Keeps a cursor so record parsers can read fields in wire order without
/// tracking offsets by hand.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FieldReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Take the next `len` bytes as a borrowed slice
    pub fn take(&mut self, len: usize) -> FeedResult<&'a [u8]> {
        let bytes = field(self.buf, self.pos, len)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> FeedResult<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> FeedResult<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> FeedResult<u16> {
        self.take(2).map(BigEndian::read_u16)
    }

    pub fn read_u32(&mut self) -> FeedResult<u32> {
        self.take(4).map(BigEndian::read_u32)
    }

    pub fn read_u64(&mut self) -> FeedResult<u64> {
        self.take(8).map(BigEndian::read_u64)
    }

    pub fn read_i64(&mut self) -> FeedResult<i64> {
        self.take(8).map(BigEndian::read_i64)
    }

    pub fn read_array<const N: usize>(&mut self) -> FeedResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_padded_str(&mut self, len: usize) -> FeedResult<String> {
        self.take(len).map(padded_to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_at_offsets() {
        let buf = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        assert_eq!(read_u16_at(&buf, 0).unwrap(), 0x0001);
        assert_eq!(read_u32_at(&buf, 2).unwrap(), 0x0203_0405);
        assert_eq!(read_u64_at(&buf, 2).unwrap(), 0x0203_0405_0607_0809);
    }

    #[test]
    fn test_read_past_end() {
        let buf = [0u8; 4];
        assert_eq!(
            read_u64_at(&buf, 0),
            Err(FeedError::BufferTooSmall { need: 8, have: 4 })
        );
        assert!(read_u16_at(&buf, usize::MAX).is_err());
    }

    #[test]
    fn test_negative_i64() {
        let buf = (-42i64).to_be_bytes();
        assert_eq!(read_i64_at(&buf, 0).unwrap(), -42);
    }

    #[test]
    fn test_trim_padding() {
        assert_eq!(trim_padding(b"000001  "), b"000001");
        assert_eq!(trim_padding(b"        "), b"");
        assert_eq!(trim_padding(b""), b"");
        assert_eq!(trim_padding(b" A B "), b" A B");
        assert_eq!(read_padded_str_at(b"xx102  ", 2, 5).unwrap(), "102");
    }

    #[test]
    fn test_field_reader_sequence() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7u16.to_be_bytes());
        buf.extend_from_slice(&99u64.to_be_bytes());
        buf.extend_from_slice(b"AB ");
        buf.push(b'1');

        let mut reader = FieldReader::new(&buf);
        assert_eq!(reader.read_u16().unwrap(), 7);
        assert_eq!(reader.read_u64().unwrap(), 99);
        assert_eq!(reader.read_padded_str(3).unwrap(), "AB");
        assert_eq!(reader.read_u8().unwrap(), b'1');
        assert_eq!(reader.remaining(), 0);
        assert!(reader.read_u8().is_err());
    }
}
