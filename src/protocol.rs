//! Wire layout of the exchange binary feed
//!
//! A UDP datagram carries one fragment of a logical message:
//!   - fragment header: 22 bytes
//!       sequence_id: i64, channel_id: u32, total_fragments: u16,
//!       initial_index: u16, current_index: u16, body_len: u32
//!   - body: body_len bytes
//!
//! A complete logical message starts with an 18-byte envelope
//! (reserved: u32, compressed: u16, size_before: u32, size_after: u32,
//! size_repeat: u32) followed by the (optionally zlib-compressed) payload.
//! The decompressed payload is a packed record list:
//!   md_count: u16, then md_count x [message_type: u32][body_len: u32][body]
//!
//! Every integer is big-endian.

use serde::{Deserialize, Serialize};

pub const FRAGMENT_HEADER_SIZE: usize = 22;
/// Largest fragment body the exchange emits
pub const MAX_FRAGMENT_LEN: usize = 0x054e;

pub const ENVELOPE_SIZE: usize = 18;
/// Reserved envelope word as the exchange sends it
pub const ENVELOPE_RESERVED: u32 = 0x0064_0000;
pub const MD_COUNT_SIZE: usize = 2;
pub const RECORD_HEADER_SIZE: usize = 8;

// Fixed record bodies
pub const ORDER_SIZE: usize = 51;
pub const TRADE_SIZE: usize = 66;
pub const SNAPSHOT_HEADER_SIZE: usize = 69;
pub const MD_ENTRY_SIZE: usize = 32;
/// Size of one per-order quantity in a snapshot entry trailer
pub const ORDER_QUANTITY_SIZE: usize = 8;

pub const MD_STREAM_ID_LEN: usize = 3;
pub const SECURITY_ID_LEN: usize = 8;
pub const SECURITY_ID_SOURCE_LEN: usize = 4;
pub const TRADING_PHASE_CODE_LEN: usize = 8;

/// Feed depth of a snapshot book side
pub const MAX_BOOK_LEVELS: usize = 10;

pub const PRICE_SCALE: i64 = 10_000;
pub const BOOK_PRICE_SCALE: i64 = 1_000_000;
pub const QUANTITY_SCALE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    Order,
    Trade,
    Snapshot,
    Heartbeat,
    Stats,
}

/// Numeric message-type codes of the feed revision being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTypeCodes {
    #[serde(default = "default_order_code")]
    pub order: u32,
    #[serde(default = "default_trade_code")]
    pub trade: u32,
    #[serde(default = "default_snapshot_code")]
    pub snapshot: u32,
    #[serde(default = "default_heartbeat_code")]
    pub heartbeat: u32,
    #[serde(default = "default_stats_code")]
    pub stats: u32,
}

fn default_order_code() -> u32 {
    300192
}

fn default_trade_code() -> u32 {
    300191
}

fn default_snapshot_code() -> u32 {
    300111
}

fn default_heartbeat_code() -> u32 {
    390095
}

fn default_stats_code() -> u32 {
    390090
}

impl Default for MessageTypeCodes {
    fn default() -> Self {
        MessageTypeCodes {
            order: default_order_code(),
            trade: default_trade_code(),
            snapshot: default_snapshot_code(),
            heartbeat: default_heartbeat_code(),
            stats: default_stats_code(),
        }
    }
}

impl MessageTypeCodes {
    pub fn classify(&self, code: u32) -> Option<MessageType> {
        match code {
            c if c == self.order => Some(MessageType::Order),
            c if c == self.trade => Some(MessageType::Trade),
            c if c == self.snapshot => Some(MessageType::Snapshot),
            c if c == self.heartbeat => Some(MessageType::Heartbeat),
            c if c == self.stats => Some(MessageType::Stats),
            _ => None,
        }
    }

    pub fn code(&self, msg_type: MessageType) -> u32 {
        match msg_type {
            MessageType::Order => self.order,
            MessageType::Trade => self.trade,
            MessageType::Snapshot => self.snapshot,
            MessageType::Heartbeat => self.heartbeat,
            MessageType::Stats => self.stats,
        }
    }

    /// True when no two message types share a code
    pub fn is_distinct(&self) -> bool {
        let mut codes = [self.order, self.trade, self.snapshot, self.heartbeat, self.stats];
        codes.sort_unstable();
        codes.windows(2).all(|w| w[0] != w[1])
    }
}

/// Snapshot entry type, carried on the wire as a space-padded 2-byte ASCII code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Buy,
    Sell,
    Latest,
    Open,
    Other([u8; 2]),
}

impl EntryType {
    pub fn from_wire(code: [u8; 2]) -> Self {
        match &code {
            b"0 " => EntryType::Buy,
            b"1 " => EntryType::Sell,
            b"2 " => EntryType::Latest,
            b"4 " => EntryType::Open,
            _ => EntryType::Other(code),
        }
    }

    pub fn to_wire(self) -> [u8; 2] {
        match self {
            EntryType::Buy => *b"0 ",
            EntryType::Sell => *b"1 ",
            EntryType::Latest => *b"2 ",
            EntryType::Open => *b"4 ",
            EntryType::Other(code) => code,
        }
    }
}

/// Convert an order/trade price to float
pub fn price_from_fixed(fixed: i64) -> f64 {
    fixed as f64 / PRICE_SCALE as f64
}

/// Convert a snapshot book price to float
pub fn book_price_from_fixed(fixed: i64) -> f64 {
    fixed as f64 / BOOK_PRICE_SCALE as f64
}

pub fn quantity_in_lots(quantity: i64) -> i64 {
    quantity / QUANTITY_SCALE
}

/// Format the HHMMSSmmm tail of a packed exchange time as `HH:MM:SS.mmm`
pub fn format_exchange_time(ts: i64) -> String {
    let millis = ts % 1000;
    let ts = ts / 1000;
    let seconds = ts % 100;
    let ts = ts / 100;
    let minutes = ts % 100;
    let hours = (ts / 100) % 100;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_classification() {
        let codes = MessageTypeCodes::default();
        assert_eq!(codes.classify(300192), Some(MessageType::Order));
        assert_eq!(codes.classify(300111), Some(MessageType::Snapshot));
        assert_eq!(codes.classify(390090), Some(MessageType::Stats));
        assert_eq!(codes.classify(99), None);
        assert_eq!(codes.code(MessageType::Trade), 300191);
        assert!(codes.is_distinct());
    }

    #[test]
    fn test_custom_codes() {
        let codes = MessageTypeCodes { order: 1, trade: 2, snapshot: 3, heartbeat: 4, stats: 4 };
        assert_eq!(codes.classify(1), Some(MessageType::Order));
        assert_eq!(codes.classify(300192), None);
        assert!(!codes.is_distinct());
    }

    #[test]
    fn test_entry_type_codes() {
        assert_eq!(EntryType::from_wire(*b"0 "), EntryType::Buy);
        assert_eq!(EntryType::from_wire(*b"1 "), EntryType::Sell);
        assert_eq!(EntryType::from_wire(*b"x1"), EntryType::Other(*b"x1"));
        assert_eq!(EntryType::from_wire(EntryType::Open.to_wire()), EntryType::Open);
    }

    #[test]
    fn test_price_conversions() {
        assert!((price_from_fixed(123_4500) - 123.45).abs() < 1e-9);
        assert!((book_price_from_fixed(123_456_780_000) - 123_456.78).abs() < 1e-6);
        assert_eq!(quantity_in_lots(500_000), 5_000);
    }

    #[test]
    fn test_format_exchange_time() {
        assert_eq!(format_exchange_time(20200423_094212_094), "09:42:12.094");
        assert_eq!(format_exchange_time(93000000), "09:30:00.000");
    }
}
