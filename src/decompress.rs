//! Message envelope parsing and zlib decompression

use std::borrow::Cow;
use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::codec::FieldReader;
use crate::error::{DecompressionError, FeedError, FeedResult};
use crate::protocol::ENVELOPE_SIZE;

/// Header that precedes every logical message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub reserved: u32,
    pub compression_flag: u16,
    pub size_before_compress: u32,
    pub size_after_compress: u32,
    pub size_repeat: u32,
}

impl MessageEnvelope {
    /// Split a complete message into its envelope and the payload that follows
    pub fn parse(message: &[u8]) -> FeedResult<(Self, &[u8])> {
        if message.len() < ENVELOPE_SIZE {
            return Err(FeedError::BufferTooSmall {
                need: ENVELOPE_SIZE,
                have: message.len(),
            });
        }
        let mut r = FieldReader::new(message);
        let envelope = MessageEnvelope {
            reserved: r.read_u32()?,
            compression_flag: r.read_u16()?,
            size_before_compress: r.read_u32()?,
            size_after_compress: r.read_u32()?,
            size_repeat: r.read_u32()?,
        };
        Ok((envelope, &message[ENVELOPE_SIZE..]))
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_flag != 0
    }
}

/// Recover the original payload bytes.
///
/// Uncompressed payloads are returned as a borrowed view; compressed ones are
/// inflated into an owned buffer that must match the declared original size.
pub fn decompress<'a>(envelope: &MessageEnvelope, payload: &'a [u8]) -> FeedResult<Cow<'a, [u8]>> {
    let declared = envelope.size_before_compress as usize;

    if !envelope.is_compressed() {
        return payload
            .get(..declared)
            .map(Cow::Borrowed)
            .ok_or(FeedError::BufferTooSmall {
                need: declared,
                have: payload.len(),
            });
    }

    let compressed_len = envelope.size_after_compress as usize;
    let compressed = payload.get(..compressed_len).ok_or(DecompressionError::Truncated {
        declared: compressed_len,
        have: payload.len(),
    })?;

    // Read one byte past the declared size so an oversized stream is detected
    let mut out = Vec::with_capacity(declared);
    ZlibDecoder::new(compressed)
        .take(declared as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| DecompressionError::Inflate(e.to_string()))?;

    if out.len() != declared {
        return Err(DecompressionError::SizeMismatch {
            declared,
            actual: out.len(),
        }
        .into());
    }

    Ok(Cow::Owned(out))
}
