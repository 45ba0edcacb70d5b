//! Record decoder
//!
//! A decompressed message is a packed list of records, each prefixed by a
//! big-endian message-type code and body length. The decoder walks the list
//! and turns every record into a typed, owned value.

use std::collections::BTreeMap;

use tracing::debug;

use crate::book_builder::SnapshotBookBuilder;
use crate::codec::{read_u16_at, read_u32_at};
use crate::error::{FeedError, FeedResult};
use crate::protocol::*;
use crate::records::{MarketRecord, Order, Snapshot, Trade};

/// One undecoded record inside a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub message_type: u32,
    pub body: &'a [u8],
}

/// Iterator over the records packed into one decompressed message.
///
/// Stops after the first framing error since the following offsets can no
/// longer be trusted.
#[derive(Debug, Clone)]
pub struct PackedRecords<'a> {
    data: &'a [u8],
    offset: usize,
    declared: u16,
    seen: u16,
    failed: bool,
}

impl<'a> PackedRecords<'a> {
    pub fn new(data: &'a [u8]) -> FeedResult<Self> {
        let declared = read_u16_at(data, 0)?;
        Ok(PackedRecords {
            data,
            offset: MD_COUNT_SIZE,
            declared,
            seen: 0,
            failed: false,
        })
    }

    /// Record count announced by the message
    pub fn declared_count(&self) -> u16 {
        self.declared
    }

    fn next_record(&mut self) -> FeedResult<RawRecord<'a>> {
        let message_type = read_u32_at(self.data, self.offset)?;
        let body_len = read_u32_at(self.data, self.offset + 4)? as usize;
        let start = self.offset + RECORD_HEADER_SIZE;
        let body = start
            .checked_add(body_len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| {
                FeedError::MalformedRecord(format!(
                    "record type {} declares {} body bytes, only {} left",
                    message_type,
                    body_len,
                    self.data.len() - start
                ))
            })?;
        self.offset = start + body_len;
        Ok(RawRecord { message_type, body })
    }
}

impl<'a> Iterator for PackedRecords<'a> {
    type Item = FeedResult<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.offset >= self.data.len() {
            if self.seen != self.declared {
                debug!(declared = self.declared, seen = self.seen, "record count mismatch");
            }
            return None;
        }
        match self.next_record() {
            Ok(record) => {
                self.seen = self.seen.wrapping_add(1);
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Every record kind the feed carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRecord {
    Order(Order),
    Trade(Trade),
    Snapshot(Snapshot),
    Heartbeat,
    Stats,
    Unknown(u32),
}

impl DecodedRecord {
    /// The record as something a sink consumes, if it is one
    pub fn into_market_record(self) -> Option<MarketRecord> {
        match self {
            DecodedRecord::Order(o) => Some(MarketRecord::Order(o)),
            DecodedRecord::Trade(t) => Some(MarketRecord::Trade(t)),
            DecodedRecord::Snapshot(s) => Some(MarketRecord::Snapshot(s)),
            _ => None,
        }
    }
}

pub struct RecordDecoder {
    codes: MessageTypeCodes,
    book_builder: SnapshotBookBuilder,
    unknown_counts: BTreeMap<u32, u64>,
}

impl RecordDecoder {
    pub fn new(codes: MessageTypeCodes, book_builder: SnapshotBookBuilder) -> Self {
        RecordDecoder {
            codes,
            book_builder,
            unknown_counts: BTreeMap::new(),
        }
    }

    /// Decode one record body by its message-type code
    pub fn decode(&mut self, message_type: u32, body: &[u8]) -> FeedResult<DecodedRecord> {
        let record = match self.codes.classify(message_type) {
            Some(MessageType::Order) => DecodedRecord::Order(Order::decode(body)?),
            Some(MessageType::Trade) => DecodedRecord::Trade(Trade::decode(body)?),
            Some(MessageType::Snapshot) => {
                DecodedRecord::Snapshot(self.book_builder.build_from_body(body)?)
            }
            Some(MessageType::Heartbeat) => DecodedRecord::Heartbeat,
            Some(MessageType::Stats) => DecodedRecord::Stats,
            None => {
                let count = self.unknown_counts.entry(message_type).or_insert(0);
                if *count == 0 {
                    debug!(message_type, body_len = body.len(), "unknown message type");
                }
                *count += 1;
                DecodedRecord::Unknown(message_type)
            }
        };
        Ok(record)
    }

    /// Decode every record of a message.
    /// Calls callback for each record result; stops on a framing error or if
    /// callback returns false. Returns the number of records visited.
    pub fn decode_stream<F>(&mut self, message: &[u8], mut callback: F) -> FeedResult<usize>
    where
        F: FnMut(FeedResult<DecodedRecord>) -> bool,
    {
        let mut count = 0;
        for raw in PackedRecords::new(message)? {
            let raw = raw?;
            count += 1;
            if !callback(self.decode(raw.message_type, raw.body)) {
                break;
            }
        }
        Ok(count)
    }

    /// Occurrences of each message-type code nobody handles
    pub fn unknown_message_types(&self) -> &BTreeMap<u32, u64> {
        &self.unknown_counts
    }
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new(MessageTypeCodes::default(), SnapshotBookBuilder::default())
    }
}
