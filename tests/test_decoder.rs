/// Protocol conformance and decoder tests

use byteorder::{BigEndian, ByteOrder};
use md_normalizer::encoder::{encode_order, encode_trade, pack_records};
use md_normalizer::protocol::{ORDER_SIZE, TRADE_SIZE};
use md_normalizer::{
    DecodedRecord, FeedError, MessageTypeCodes, Order, RecordDecoder, Side, SnapshotBookBuilder,
    Trade,
};

fn sample_order(appl_seq_num: u64) -> Order {
    Order {
        channel_no: 2011,
        appl_seq_num,
        md_stream_id: "011".into(),
        security_id: "000001".into(),
        security_id_source: "102".into(),
        price: 105_000,
        order_qty: 150_000,
        side: b'1',
        transact_time: 20240102093015250,
        order_type: b'2',
    }
}

fn sample_trade(appl_seq_num: u64) -> Trade {
    Trade {
        channel_no: 2011,
        appl_seq_num,
        md_stream_id: "011".into(),
        bid_appl_seq_num: 17,
        offer_appl_seq_num: 23,
        security_id: "300750".into(),
        security_id_source: "102".into(),
        last_px: 1_981_200,
        last_qty: 30_000,
        exec_type: b'F',
        transact_time: 20240102093015251,
    }
}

#[test]
fn test_decode_order() {
    let body = encode_order(&sample_order(42));
    let mut decoder = RecordDecoder::default();

    match decoder.decode(300192, &body).unwrap() {
        DecodedRecord::Order(order) => {
            assert_eq!(order, sample_order(42));
            assert_eq!(order.side(), Some(Side::Bid));
        }
        other => panic!("expected order, got {:?}", other),
    }
}

#[test]
fn test_decode_trade() {
    let body = encode_trade(&sample_trade(7));
    let mut decoder = RecordDecoder::default();

    match decoder.decode(300191, &body).unwrap() {
        DecodedRecord::Trade(trade) => {
            assert_eq!(trade, sample_trade(7));
            assert_eq!(trade.notional(), 1_981_200 * 300);
        }
        other => panic!("expected trade, got {:?}", other),
    }
}

#[test]
fn test_order_fields_big_endian() {
    let mut body = [b' '; ORDER_SIZE];
    BigEndian::write_u16(&mut body[0..2], 0x0102);
    BigEndian::write_u64(&mut body[2..10], 0x0000_0000_0000_0100);
    body[13..19].copy_from_slice(b"600000");
    BigEndian::write_i64(&mut body[25..33], 1);
    BigEndian::write_i64(&mut body[33..41], 100);
    body[41] = b'2';
    BigEndian::write_i64(&mut body[42..50], 0);

    let order = Order::decode(&body).unwrap();
    assert_eq!(order.channel_no, 258);
    assert_eq!(order.appl_seq_num, 256);
    assert_eq!(order.md_stream_id, "");
    assert_eq!(order.security_id, "600000");
    assert_eq!(order.price, 1);
    assert_eq!(order.side(), Some(Side::Ask));
}

#[test]
fn test_padding_trimmed() {
    let mut order = sample_order(1);
    order.security_id = "1".into();
    let body = encode_order(&order);
    assert_eq!(&body[13..21], b"1       ");
    assert_eq!(Order::decode(&body).unwrap().security_id, "1");
}

#[test]
fn test_short_trade_body() {
    let body = encode_trade(&sample_trade(1));
    let result = Trade::decode(&body[..TRADE_SIZE - 1]);
    assert!(matches!(
        result,
        Err(FeedError::BufferTooSmall { need: TRADE_SIZE, have }) if have == TRADE_SIZE - 1
    ));
}

#[test]
fn test_longer_body_ignores_tail() {
    let mut body = encode_order(&sample_order(3)).to_vec();
    body.extend_from_slice(b"extension");
    assert_eq!(Order::decode(&body).unwrap(), sample_order(3));
}

#[test]
fn test_decode_stream_mixed() {
    let order = encode_order(&sample_order(1));
    let trade = encode_trade(&sample_trade(2));
    let message = pack_records(&[
        (300192u32, &order[..]),
        (390095u32, &b""[..]),
        (300191u32, &trade[..]),
        (555u32, &b"??"[..]),
    ]);

    let mut decoder = RecordDecoder::default();
    let mut records = Vec::new();
    let visited = decoder
        .decode_stream(&message, |r| {
            records.push(r.unwrap());
            true
        })
        .unwrap();

    assert_eq!(visited, 4);
    assert!(matches!(records[0], DecodedRecord::Order(_)));
    assert_eq!(records[1], DecodedRecord::Heartbeat);
    assert!(matches!(records[2], DecodedRecord::Trade(_)));
    assert_eq!(records[3], DecodedRecord::Unknown(555));
    assert_eq!(decoder.unknown_message_types().get(&555), Some(&1));
}

#[test]
fn test_custom_message_codes() {
    let codes = MessageTypeCodes {
        order: 1,
        ..MessageTypeCodes::default()
    };
    let mut decoder = RecordDecoder::new(codes, SnapshotBookBuilder::default());
    let body = encode_order(&sample_order(5));

    assert!(matches!(decoder.decode(1, &body).unwrap(), DecodedRecord::Order(_)));
    assert_eq!(decoder.decode(300192, &body).unwrap(), DecodedRecord::Unknown(300192));
}

#[test]
fn test_framing_error_surfaces() {
    let mut message = pack_records(&[(390095u32, &b""[..])]);
    message.extend_from_slice(&300192u32.to_be_bytes());
    message.extend_from_slice(&(ORDER_SIZE as u32).to_be_bytes());
    message.extend_from_slice(&[0u8; 10]);

    let mut decoder = RecordDecoder::default();
    let result = decoder.decode_stream(&message, |r| r.is_ok());
    assert!(matches!(result, Err(FeedError::MalformedRecord(_))));
}
