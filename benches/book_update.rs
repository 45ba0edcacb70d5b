//! Snapshot book reconstruction benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use md_normalizer::encoder::{encode_snapshot, SnapshotEntry};
use md_normalizer::protocol::MAX_BOOK_LEVELS;
use md_normalizer::{BookLevel, EntryType, Snapshot, SnapshotBookBuilder};

fn header() -> Snapshot {
    Snapshot {
        orig_time: 93000000,
        channel_no: 1,
        md_stream_id: "010".into(),
        security_id: "000001".into(),
        security_id_source: "102".into(),
        trading_phase_code: "T0".into(),
        prev_close_price: 100_000,
        total_trade_num: 0,
        total_trade_volume: 0,
        total_trade_value: 0,
        md_entry_num: 0,
        open_price: 0,
        latest_trade_price: 0,
        bid_levels: [BookLevel::default(); MAX_BOOK_LEVELS + 1],
        ask_levels: [BookLevel::default(); MAX_BOOK_LEVELS + 1],
        depth: 5,
    }
}

/// Full ten-level book on both sides, each level carrying `orders_per_level` queued quantities
fn full_book(orders_per_level: usize) -> Vec<u8> {
    let mut entries = vec![
        SnapshotEntry::level(EntryType::Open, 0, 100_000_000, 0),
        SnapshotEntry::level(EntryType::Latest, 0, 100_050_000, 0),
    ];
    for level in 1..=MAX_BOOK_LEVELS as u16 {
        let offset = level as i64 * 10_000;
        let mut bid = SnapshotEntry::level(EntryType::Buy, level, 100_000_000 - offset, 100 * level as i64);
        let mut ask = SnapshotEntry::level(EntryType::Sell, level, 100_050_000 + offset, 100 * level as i64);
        bid.order_quantities = vec![100; orders_per_level];
        ask.order_quantities = vec![100; orders_per_level];
        entries.push(bid);
        entries.push(ask);
    }
    encode_snapshot(&header(), &entries)
}

fn bench_top_of_book(c: &mut Criterion) {
    let body = full_book(0);
    let builder = SnapshotBookBuilder::default();

    c.bench_function("snapshot_build_10_levels", |b| {
        b.iter(|| builder.build_from_body(black_box(&body)))
    });
}

fn bench_with_order_trailers(c: &mut Criterion) {
    let body = full_book(50);
    let builder = SnapshotBookBuilder::new(MAX_BOOK_LEVELS);

    c.bench_function("snapshot_build_50_orders_per_level", |b| {
        b.iter(|| builder.build_from_body(black_box(&body)))
    });
}

fn bench_best_levels(c: &mut Criterion) {
    let snapshot = SnapshotBookBuilder::default()
        .build_from_body(&full_book(0))
        .unwrap();

    c.bench_function("snapshot_best_bid_ask", |b| {
        b.iter(|| {
            black_box((snapshot.bid_level(1), snapshot.ask_level(1)))
        });
    });
}

criterion_group!(
    benches,
    bench_top_of_book,
    bench_with_order_trailers,
    bench_best_levels
);
criterion_main!(benches);
