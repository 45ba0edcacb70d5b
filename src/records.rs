//! Decoded market-data records.
//!
//! All of these are plain owned values: once decoded they no longer borrow
//! from the datagram or the decompression buffer.

use crate::codec::FieldReader;
use crate::error::{FeedError, FeedResult};
use crate::protocol::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Map the ASCII side code carried by orders ('1' buy, '2' sell)
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            b'1' => Some(Side::Bid),
            b'2' => Some(Side::Ask),
            _ => None,
        }
    }
}

/// Order entry (51 bytes on the wire)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub channel_no: u16,
    pub appl_seq_num: u64,
    pub md_stream_id: String,
    pub security_id: String,
    pub security_id_source: String,
    pub price: i64,       // fixed-point: price * 10^4
    pub order_qty: i64,   // lots * 100
    pub side: u8,
    pub transact_time: i64,
    pub order_type: u8,
}

impl Order {
    pub fn decode(body: &[u8]) -> FeedResult<Self> {
        ensure_len(body, ORDER_SIZE)?;
        let mut r = FieldReader::new(body);
        Ok(Order {
            channel_no: r.read_u16()?,
            appl_seq_num: r.read_u64()?,
            md_stream_id: r.read_padded_str(MD_STREAM_ID_LEN)?,
            security_id: r.read_padded_str(SECURITY_ID_LEN)?,
            security_id_source: r.read_padded_str(SECURITY_ID_SOURCE_LEN)?,
            price: r.read_i64()?,
            order_qty: r.read_i64()?,
            side: r.read_u8()?,
            transact_time: r.read_i64()?,
            order_type: r.read_u8()?,
        })
    }

    pub fn side(&self) -> Option<Side> {
        Side::from_u8(self.side)
    }
}

/// Trade execution (66 bytes on the wire)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub channel_no: u16,
    pub appl_seq_num: u64,
    pub md_stream_id: String,
    pub bid_appl_seq_num: u64,
    pub offer_appl_seq_num: u64,
    pub security_id: String,
    pub security_id_source: String,
    pub last_px: i64,  // fixed-point: price * 10^4
    pub last_qty: i64, // lots * 100
    pub exec_type: u8,
    pub transact_time: i64,
}

impl Trade {
    pub fn decode(body: &[u8]) -> FeedResult<Self> {
        ensure_len(body, TRADE_SIZE)?;
        let mut r = FieldReader::new(body);
        Ok(Trade {
            channel_no: r.read_u16()?,
            appl_seq_num: r.read_u64()?,
            md_stream_id: r.read_padded_str(MD_STREAM_ID_LEN)?,
            bid_appl_seq_num: r.read_u64()?,
            offer_appl_seq_num: r.read_u64()?,
            security_id: r.read_padded_str(SECURITY_ID_LEN)?,
            security_id_source: r.read_padded_str(SECURITY_ID_SOURCE_LEN)?,
            last_px: r.read_i64()?,
            last_qty: r.read_i64()?,
            exec_type: r.read_u8()?,
            transact_time: r.read_i64()?,
        })
    }

    /// Traded amount, `price * quantity / 100`, in the price's fixed-point scale
    pub fn notional(&self) -> i64 {
        let amount = self.last_px as i128 * self.last_qty as i128 / QUANTITY_SCALE as i128;
        amount.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// One price level of a snapshot book side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookLevel {
    pub price: i64,    // fixed-point: price * 10^6
    pub quantity: i64, // lots * 100
}

/// Full order-book snapshot of one instrument.
///
/// Level arrays are indexed by the 1-based wire level; index 0 is unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub orig_time: i64,
    pub channel_no: u16,
    pub md_stream_id: String,
    pub security_id: String,
    pub security_id_source: String,
    pub trading_phase_code: String,
    pub prev_close_price: i64,
    pub total_trade_num: i64,
    pub total_trade_volume: i64,
    pub total_trade_value: i64,
    pub md_entry_num: u32,
    pub open_price: i64,
    pub latest_trade_price: i64,
    pub bid_levels: [BookLevel; MAX_BOOK_LEVELS + 1],
    pub ask_levels: [BookLevel; MAX_BOOK_LEVELS + 1],
    pub depth: usize,
}

impl Snapshot {
    pub fn bid_level(&self, level: usize) -> Option<&BookLevel> {
        if level == 0 {
            return None;
        }
        self.bid_levels.get(level)
    }

    pub fn ask_level(&self, level: usize) -> Option<&BookLevel> {
        if level == 0 {
            return None;
        }
        self.ask_levels.get(level)
    }

    /// Top `depth` bid levels, best first
    pub fn bids(&self) -> &[BookLevel] {
        &self.bid_levels[1..=self.visible_depth()]
    }

    /// Top `depth` ask levels, best first
    pub fn asks(&self) -> &[BookLevel] {
        &self.ask_levels[1..=self.visible_depth()]
    }

    fn visible_depth(&self) -> usize {
        self.depth.min(MAX_BOOK_LEVELS)
    }

    pub fn orig_time_string(&self) -> String {
        format_exchange_time(self.orig_time)
    }
}

/// A record that survived arbitration and is handed to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketRecord {
    Order(Order),
    Trade(Trade),
    Snapshot(Snapshot),
}

impl MarketRecord {
    pub fn message_type(&self) -> MessageType {
        match self {
            MarketRecord::Order(_) => MessageType::Order,
            MarketRecord::Trade(_) => MessageType::Trade,
            MarketRecord::Snapshot(_) => MessageType::Snapshot,
        }
    }

    pub fn security_id(&self) -> &str {
        match self {
            MarketRecord::Order(o) => &o.security_id,
            MarketRecord::Trade(t) => &t.security_id,
            MarketRecord::Snapshot(s) => &s.security_id,
        }
    }
}

fn ensure_len(body: &[u8], need: usize) -> FeedResult<()> {
    if body.len() < need {
        return Err(FeedError::BufferTooSmall {
            need,
            have: body.len(),
        });
    }
    Ok(())
}
