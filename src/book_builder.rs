//! Order book builder from snapshot entry lists
//!
//! A snapshot carries a fixed header followed by `md_entry_num` market-data
//! entries. Each entry is 32 fixed bytes plus a trailer of per-order
//! quantities that is skipped. Bid/ask entries land in 1-based level arrays;
//! open and latest-trade entries set scalar prices.

use crate::codec::FieldReader;
use crate::error::{FeedError, FeedResult};
use crate::protocol::*;
use crate::records::{BookLevel, Snapshot};

/// Fixed leading portion of one snapshot entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdEntry {
    pub entry_type: EntryType,
    pub price: i64,
    pub quantity: i64,
    pub price_level: u16,
    pub number_of_orders: i64,
    pub order_quantity_count: u32,
}

impl MdEntry {
    fn read(r: &mut FieldReader<'_>) -> FeedResult<Self> {
        Ok(MdEntry {
            entry_type: EntryType::from_wire(r.read_array::<2>()?),
            price: r.read_i64()?,
            quantity: r.read_i64()?,
            price_level: r.read_u16()?,
            number_of_orders: r.read_i64()?,
            order_quantity_count: r.read_u32()?,
        })
    }

    /// Bytes this entry occupies including its per-order trailer
    pub fn wire_len(&self) -> usize {
        MD_ENTRY_SIZE + self.order_quantity_count as usize * ORDER_QUANTITY_SIZE
    }
}

/// Builds `Snapshot`s, exposing the top `depth` levels per side
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBookBuilder {
    depth: usize,
}

impl SnapshotBookBuilder {
    pub fn new(depth: usize) -> Self {
        SnapshotBookBuilder {
            depth: depth.clamp(1, MAX_BOOK_LEVELS),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Decode a full snapshot record body
    pub fn build_from_body(&self, body: &[u8]) -> FeedResult<Snapshot> {
        if body.len() < SNAPSHOT_HEADER_SIZE {
            return Err(FeedError::BufferTooSmall {
                need: SNAPSHOT_HEADER_SIZE,
                have: body.len(),
            });
        }
        let (header, entries) = body.split_at(SNAPSHOT_HEADER_SIZE);
        self.build(header, entries)
    }

    /// Parse the fixed header, then walk the entry list.
    pub fn build(&self, header: &[u8], entries: &[u8]) -> FeedResult<Snapshot> {
        let mut snapshot = self.parse_header(header)?;
        let mut r = FieldReader::new(entries);

        for i in 0..snapshot.md_entry_num {
            let entry = MdEntry::read(&mut r).map_err(|e| match e {
                FeedError::BufferTooSmall { .. } => FeedError::MalformedRecord(format!(
                    "snapshot {} truncated at entry {} of {}",
                    snapshot.security_id, i, snapshot.md_entry_num
                )),
                other => other,
            })?;
            apply_entry(&mut snapshot, &entry)?;
            r.skip(entry.order_quantity_count as usize * ORDER_QUANTITY_SIZE)
                .map_err(|_| {
                    FeedError::MalformedRecord(format!(
                        "snapshot {} entry {} order quantities run past end",
                        snapshot.security_id, i
                    ))
                })?;
        }

        Ok(snapshot)
    }

    fn parse_header(&self, header: &[u8]) -> FeedResult<Snapshot> {
        if header.len() < SNAPSHOT_HEADER_SIZE {
            return Err(FeedError::BufferTooSmall {
                need: SNAPSHOT_HEADER_SIZE,
                have: header.len(),
            });
        }
        let mut r = FieldReader::new(header);
        Ok(Snapshot {
            orig_time: r.read_i64()?,
            channel_no: r.read_u16()?,
            md_stream_id: r.read_padded_str(MD_STREAM_ID_LEN)?,
            security_id: r.read_padded_str(SECURITY_ID_LEN)?,
            security_id_source: r.read_padded_str(SECURITY_ID_SOURCE_LEN)?,
            trading_phase_code: r.read_padded_str(TRADING_PHASE_CODE_LEN)?,
            prev_close_price: r.read_i64()?,
            total_trade_num: r.read_i64()?,
            total_trade_volume: r.read_i64()?,
            total_trade_value: r.read_i64()?,
            md_entry_num: r.read_u32()?,
            open_price: 0,
            latest_trade_price: 0,
            bid_levels: [BookLevel::default(); MAX_BOOK_LEVELS + 1],
            ask_levels: [BookLevel::default(); MAX_BOOK_LEVELS + 1],
            depth: self.depth,
        })
    }
}

impl Default for SnapshotBookBuilder {
    fn default() -> Self {
        Self::new(5)
    }
}

fn apply_entry(snapshot: &mut Snapshot, entry: &MdEntry) -> FeedResult<()> {
    match entry.entry_type {
        EntryType::Open => snapshot.open_price = entry.price,
        EntryType::Latest => snapshot.latest_trade_price = entry.price,
        EntryType::Buy => {
            let level = checked_level(snapshot, entry)?;
            snapshot.bid_levels[level] = BookLevel {
                price: entry.price,
                quantity: entry.quantity,
            };
        }
        EntryType::Sell => {
            let level = checked_level(snapshot, entry)?;
            snapshot.ask_levels[level] = BookLevel {
                price: entry.price,
                quantity: entry.quantity,
            };
        }
        EntryType::Other(_) => {}
    }
    Ok(())
}

// Level 0 and anything past the feed depth mean the entry walk lost sync
fn checked_level(snapshot: &Snapshot, entry: &MdEntry) -> FeedResult<usize> {
    let level = entry.price_level as usize;
    if level == 0 || level > MAX_BOOK_LEVELS {
        return Err(FeedError::MalformedRecord(format!(
            "snapshot {} price level {} outside 1..={}",
            snapshot.security_id, level, MAX_BOOK_LEVELS
        )));
    }
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(entry_num: u32) -> Vec<u8> {
        let mut h = Vec::with_capacity(SNAPSHOT_HEADER_SIZE);
        h.extend_from_slice(&93000000i64.to_be_bytes());
        h.extend_from_slice(&1u16.to_be_bytes());
        h.extend_from_slice(b"010");
        h.extend_from_slice(b"000001  ");
        h.extend_from_slice(b"102 ");
        h.extend_from_slice(b"T0      ");
        h.extend_from_slice(&0i64.to_be_bytes());
        h.extend_from_slice(&0i64.to_be_bytes());
        h.extend_from_slice(&0i64.to_be_bytes());
        h.extend_from_slice(&0i64.to_be_bytes());
        h.extend_from_slice(&entry_num.to_be_bytes());
        h
    }

    fn entry(code: &[u8; 2], price: i64, qty: i64, level: u16, trailer: u32) -> Vec<u8> {
        let mut e = Vec::new();
        e.extend_from_slice(code);
        e.extend_from_slice(&price.to_be_bytes());
        e.extend_from_slice(&qty.to_be_bytes());
        e.extend_from_slice(&level.to_be_bytes());
        e.extend_from_slice(&1i64.to_be_bytes());
        e.extend_from_slice(&trailer.to_be_bytes());
        for i in 0..trailer {
            e.extend_from_slice(&(i as i64 * 100).to_be_bytes());
        }
        e
    }

    #[test]
    fn test_header_fields() {
        let snap = SnapshotBookBuilder::default().build(&header(0), &[]).unwrap();
        assert_eq!(snap.security_id, "000001");
        assert_eq!(snap.security_id_source, "102");
        assert_eq!(snap.trading_phase_code, "T0");
        assert_eq!(snap.orig_time, 93000000);
        assert_eq!(snap.bids().len(), 5);
    }

    #[test]
    fn test_trailer_skipped() {
        let mut entries = entry(b"0 ", 10_000_000, 100, 1, 3);
        entries.extend(entry(b"1 ", 10_010_000, 200, 1, 0));
        let snap = SnapshotBookBuilder::default().build(&header(2), &entries).unwrap();
        assert_eq!(snap.bid_levels[1], BookLevel { price: 10_000_000, quantity: 100 });
        assert_eq!(snap.ask_levels[1], BookLevel { price: 10_010_000, quantity: 200 });
    }

    #[test]
    fn test_level_zero_malformed() {
        let entries = entry(b"0 ", 1, 1, 0, 0);
        let result = SnapshotBookBuilder::default().build(&header(1), &entries);
        assert!(matches!(result, Err(FeedError::MalformedRecord(_))));
    }

    #[test]
    fn test_depth_clamped() {
        assert_eq!(SnapshotBookBuilder::new(0).depth(), 1);
        assert_eq!(SnapshotBookBuilder::new(50).depth(), MAX_BOOK_LEVELS);
    }

    #[test]
    fn test_wire_len() {
        let e = MdEntry {
            entry_type: EntryType::Buy,
            price: 0,
            quantity: 0,
            price_level: 1,
            number_of_orders: 0,
            order_quantity_count: 4,
        };
        assert_eq!(e.wire_len(), 32 + 32);
    }
}
