//! Synthetic feed encoder
//!
//! Writes records, envelopes and fragments in the exchange wire layout. Used to
//! generate test traffic for the decoders, benches and the demo generator.

use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{FeedError, FeedResult};
use crate::protocol::*;
use crate::reassembler::UdpFragment;
use crate::records::{Order, Snapshot, Trade};

/// Copy `s` into a fixed-width field, right-padded with spaces
fn write_padded(dst: &mut [u8], s: &str) {
    let src = s.as_bytes();
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(b' ');
}

pub fn encode_order(order: &Order) -> [u8; ORDER_SIZE] {
    let mut msg = [0u8; ORDER_SIZE];
    BigEndian::write_u16(&mut msg[0..2], order.channel_no);
    BigEndian::write_u64(&mut msg[2..10], order.appl_seq_num);
    write_padded(&mut msg[10..13], &order.md_stream_id);
    write_padded(&mut msg[13..21], &order.security_id);
    write_padded(&mut msg[21..25], &order.security_id_source);
    BigEndian::write_i64(&mut msg[25..33], order.price);
    BigEndian::write_i64(&mut msg[33..41], order.order_qty);
    msg[41] = order.side;
    BigEndian::write_i64(&mut msg[42..50], order.transact_time);
    msg[50] = order.order_type;
    msg
}

pub fn encode_trade(trade: &Trade) -> [u8; TRADE_SIZE] {
    let mut msg = [0u8; TRADE_SIZE];
    BigEndian::write_u16(&mut msg[0..2], trade.channel_no);
    BigEndian::write_u64(&mut msg[2..10], trade.appl_seq_num);
    write_padded(&mut msg[10..13], &trade.md_stream_id);
    BigEndian::write_u64(&mut msg[13..21], trade.bid_appl_seq_num);
    BigEndian::write_u64(&mut msg[21..29], trade.offer_appl_seq_num);
    write_padded(&mut msg[29..37], &trade.security_id);
    write_padded(&mut msg[37..41], &trade.security_id_source);
    BigEndian::write_i64(&mut msg[41..49], trade.last_px);
    BigEndian::write_i64(&mut msg[49..57], trade.last_qty);
    msg[57] = trade.exec_type;
    BigEndian::write_i64(&mut msg[58..66], trade.transact_time);
    msg
}

/// One snapshot entry to encode, with its per-order quantity trailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub entry_type: EntryType,
    pub price: i64,
    pub quantity: i64,
    pub price_level: u16,
    pub number_of_orders: i64,
    pub order_quantities: Vec<i64>,
}

impl SnapshotEntry {
    pub fn level(entry_type: EntryType, price_level: u16, price: i64, quantity: i64) -> Self {
        SnapshotEntry {
            entry_type,
            price,
            quantity,
            price_level,
            number_of_orders: 1,
            order_quantities: Vec::new(),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        let mut fixed = [0u8; MD_ENTRY_SIZE];
        fixed[0..2].copy_from_slice(&self.entry_type.to_wire());
        BigEndian::write_i64(&mut fixed[2..10], self.price);
        BigEndian::write_i64(&mut fixed[10..18], self.quantity);
        BigEndian::write_u16(&mut fixed[18..20], self.price_level);
        BigEndian::write_i64(&mut fixed[20..28], self.number_of_orders);
        BigEndian::write_u32(&mut fixed[28..32], self.order_quantities.len() as u32);
        out.extend_from_slice(&fixed);

        let mut qty = [0u8; ORDER_QUANTITY_SIZE];
        for &q in &self.order_quantities {
            BigEndian::write_i64(&mut qty, q);
            out.extend_from_slice(&qty);
        }
    }
}

/// Encode a snapshot body from the header fields of `snapshot` and `entries`.
///
/// The entry count written is `entries.len()`; `snapshot.md_entry_num` and the
/// level arrays are not consulted.
pub fn encode_snapshot(snapshot: &Snapshot, entries: &[SnapshotEntry]) -> Vec<u8> {
    let mut header = [0u8; SNAPSHOT_HEADER_SIZE];
    BigEndian::write_i64(&mut header[0..8], snapshot.orig_time);
    BigEndian::write_u16(&mut header[8..10], snapshot.channel_no);
    write_padded(&mut header[10..13], &snapshot.md_stream_id);
    write_padded(&mut header[13..21], &snapshot.security_id);
    write_padded(&mut header[21..25], &snapshot.security_id_source);
    write_padded(&mut header[25..33], &snapshot.trading_phase_code);
    BigEndian::write_i64(&mut header[33..41], snapshot.prev_close_price);
    BigEndian::write_i64(&mut header[41..49], snapshot.total_trade_num);
    BigEndian::write_i64(&mut header[49..57], snapshot.total_trade_volume);
    BigEndian::write_i64(&mut header[57..65], snapshot.total_trade_value);
    BigEndian::write_u32(&mut header[65..69], entries.len() as u32);

    let mut body = header.to_vec();
    for entry in entries {
        entry.write(&mut body);
    }
    body
}

/// Pack `(message_type, body)` pairs into one record list
pub fn pack_records<B: AsRef<[u8]>>(records: &[(u32, B)]) -> Vec<u8> {
    let len = records
        .iter()
        .map(|(_, b)| RECORD_HEADER_SIZE + b.as_ref().len())
        .sum::<usize>();
    let mut out = Vec::with_capacity(MD_COUNT_SIZE + len);

    let mut header = [0u8; RECORD_HEADER_SIZE];
    BigEndian::write_u16(&mut header[..MD_COUNT_SIZE], records.len() as u16);
    out.extend_from_slice(&header[..MD_COUNT_SIZE]);

    for (message_type, body) in records {
        let body = body.as_ref();
        BigEndian::write_u32(&mut header[0..4], *message_type);
        BigEndian::write_u32(&mut header[4..8], body.len() as u32);
        out.extend_from_slice(&header);
        out.extend_from_slice(body);
    }
    out
}

/// Prefix a payload with its envelope, zlib-compressing it if asked to
pub fn encode_envelope(payload: &[u8], compress: bool) -> io::Result<Vec<u8>> {
    let body = if compress {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?
    } else {
        payload.to_vec()
    };

    let mut header = [0u8; ENVELOPE_SIZE];
    BigEndian::write_u32(&mut header[0..4], ENVELOPE_RESERVED);
    BigEndian::write_u16(&mut header[4..6], compress as u16);
    BigEndian::write_u32(&mut header[6..10], payload.len() as u32);
    BigEndian::write_u32(&mut header[10..14], body.len() as u32);
    // repeats size_after_compress
    BigEndian::write_u32(&mut header[14..18], body.len() as u32);

    let mut message = Vec::with_capacity(ENVELOPE_SIZE + body.len());
    message.extend_from_slice(&header);
    message.extend_from_slice(&body);
    Ok(message)
}

/// Serialize one fragment as a UDP payload
pub fn encode_fragment(fragment: &UdpFragment<'_>) -> Vec<u8> {
    let mut header = [0u8; FRAGMENT_HEADER_SIZE];
    BigEndian::write_i64(&mut header[0..8], fragment.sequence_id);
    BigEndian::write_u32(&mut header[8..12], fragment.channel_id);
    BigEndian::write_u16(&mut header[12..14], fragment.total_fragments);
    BigEndian::write_u16(&mut header[14..16], fragment.initial_index);
    BigEndian::write_u16(&mut header[16..18], fragment.current_index);
    BigEndian::write_u32(&mut header[18..22], fragment.body.len() as u32);

    let mut datagram = Vec::with_capacity(FRAGMENT_HEADER_SIZE + fragment.body.len());
    datagram.extend_from_slice(&header);
    datagram.extend_from_slice(fragment.body);
    datagram
}

/// Split a message into datagrams carrying at most `max_len` body bytes each.
///
/// An empty message still produces one (empty) fragment.
pub fn fragment_message(
    sequence_id: i64,
    channel_id: u32,
    message: &[u8],
    max_len: usize,
) -> FeedResult<Vec<Vec<u8>>> {
    let chunks: Vec<&[u8]> = if message.is_empty() {
        vec![message]
    } else {
        message.chunks(max_len.max(1)).collect()
    };

    let total_fragments = u16::try_from(chunks.len()).map_err(|_| {
        FeedError::InvalidFragment(format!(
            "channel {} seq {}: {} bytes need {} fragments",
            channel_id,
            sequence_id,
            message.len(),
            chunks.len()
        ))
    })?;

    Ok(chunks
        .iter()
        .enumerate()
        .map(|(i, body)| {
            encode_fragment(&UdpFragment {
                sequence_id,
                channel_id,
                total_fragments,
                initial_index: 0,
                current_index: i as u16,
                body,
            })
        })
        .collect())
}

/// Pack, wrap and fragment records into ready-to-send datagrams
pub fn encode_datagrams<B: AsRef<[u8]>>(
    sequence_id: i64,
    channel_id: u32,
    records: &[(u32, B)],
    compress: bool,
) -> io::Result<Vec<Vec<u8>>> {
    let message = encode_envelope(&pack_records(records), compress)?;
    fragment_message(sequence_id, channel_id, &message, MAX_FRAGMENT_LEN)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::{decompress, MessageEnvelope};

    #[test]
    fn test_padded_field() {
        let mut field = [0u8; 8];
        write_padded(&mut field, "000001");
        assert_eq!(&field, b"000001  ");
        write_padded(&mut field[..3], "toolong");
        assert_eq!(&field[..3], b"too");
    }

    #[test]
    fn test_pack_records_layout() {
        let packed = pack_records(&[(300192u32, &b"abc"[..])]);
        assert_eq!(&packed[..2], &[0, 1]);
        assert_eq!(&packed[2..6], &300192u32.to_be_bytes());
        assert_eq!(&packed[6..10], &3u32.to_be_bytes());
        assert_eq!(&packed[10..], b"abc");
    }

    #[test]
    fn test_envelope_compressed() {
        let payload = vec![7u8; 500];
        let message = encode_envelope(&payload, true).unwrap();
        let (envelope, rest) = MessageEnvelope::parse(&message).unwrap();
        assert!(envelope.is_compressed());
        assert_eq!(envelope.reserved, ENVELOPE_RESERVED);
        assert_eq!(envelope.size_before_compress, 500);
        assert_eq!(envelope.size_after_compress as usize, rest.len());
        assert_eq!(envelope.size_repeat, envelope.size_after_compress);
        assert!(rest.len() < 500);
        assert_eq!(decompress(&envelope, rest).unwrap().as_ref(), &payload[..]);
    }

    #[test]
    fn test_envelope_plain_sizes_match() {
        let message = encode_envelope(b"abc", false).unwrap();
        let (envelope, rest) = MessageEnvelope::parse(&message).unwrap();
        assert!(!envelope.is_compressed());
        assert_eq!(envelope.size_before_compress, 3);
        assert_eq!(envelope.size_after_compress, 3);
        assert_eq!(envelope.size_repeat, 3);
        assert_eq!(rest, b"abc");
    }

    #[test]
    fn test_fragment_message_splits() {
        let message = vec![1u8; 2500];
        let datagrams = fragment_message(9, 3, &message, MAX_FRAGMENT_LEN).unwrap();
        assert_eq!(datagrams.len(), 2);

        let first = UdpFragment::parse(&datagrams[0]).unwrap();
        let second = UdpFragment::parse(&datagrams[1]).unwrap();
        assert_eq!(first.total_fragments, 2);
        assert_eq!(first.body.len(), MAX_FRAGMENT_LEN);
        assert_eq!(second.index(), 1);
        assert_eq!(second.body.len(), 2500 - MAX_FRAGMENT_LEN);
    }

    #[test]
    fn test_empty_message_single_fragment() {
        let datagrams = fragment_message(1, 1, &[], 16).unwrap();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0].len(), FRAGMENT_HEADER_SIZE);
    }
}
