//! Synthetic market data feed generator
//!
//! Creates realistic order flow, packs it into compressed and fragmented
//! datagrams, sends every datagram on two lossy, reordering feeds and runs the
//! result through the pipeline.
//!
//! Usage: feed_generator [message_count] [config.toml]

use std::env;

use md_normalizer::encoder::{encode_datagrams, encode_order, encode_snapshot, encode_trade, SnapshotEntry};
use md_normalizer::protocol::MAX_BOOK_LEVELS;
use md_normalizer::{
    Arrival, BookLevel, EntryType, FeedId, MdPipeline, MessageType, Order, PipelineConfig,
    Snapshot, Trade,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SECURITIES: [&str; 4] = ["000001", "000002", "300750", "600000"];
const CHANNEL_NO: u16 = 2011;

struct Generator {
    rng: StdRng,
    appl_seq_num: u64,
    clock_ms: i64,
}

impl Generator {
    fn transact_time(&self) -> i64 {
        let ms = self.clock_ms;
        let (h, m, s, milli) = (9 + ms / 3_600_000, ms / 60_000 % 60, ms / 1000 % 60, ms % 1000);
        20240102_000000000 + h * 10_000_000 + m * 100_000 + s * 1000 + milli
    }

    fn price(&mut self) -> i64 {
        // 100.00 +/- 5.00, in 1e4 fixed point
        1_000_000 + self.rng.gen_range(-50_000i64..50_000)
    }

    fn order(&mut self) -> Order {
        self.appl_seq_num += 1;
        Order {
            channel_no: CHANNEL_NO,
            appl_seq_num: self.appl_seq_num,
            md_stream_id: "011".into(),
            security_id: SECURITIES.choose(&mut self.rng).copied().unwrap_or("000001").into(),
            security_id_source: "102".into(),
            price: self.price(),
            order_qty: self.rng.gen_range(1i64..100) * 100 * 100,
            side: if self.rng.gen_bool(0.5) { b'1' } else { b'2' },
            transact_time: self.transact_time(),
            order_type: b'2',
        }
    }

    fn trade(&mut self) -> Trade {
        self.appl_seq_num += 1;
        let seq = self.appl_seq_num;
        Trade {
            channel_no: CHANNEL_NO,
            appl_seq_num: seq,
            md_stream_id: "011".into(),
            bid_appl_seq_num: self.rng.gen_range(1..seq),
            offer_appl_seq_num: self.rng.gen_range(1..seq),
            security_id: SECURITIES.choose(&mut self.rng).copied().unwrap_or("000001").into(),
            security_id_source: "102".into(),
            last_px: self.price(),
            last_qty: self.rng.gen_range(1i64..50) * 100 * 100,
            exec_type: b'F',
            transact_time: self.transact_time(),
        }
    }

    fn snapshot(&mut self, security_id: &str) -> Vec<u8> {
        let header = Snapshot {
            orig_time: self.transact_time() % 1_000_000_000,
            channel_no: 1,
            md_stream_id: "010".into(),
            security_id: security_id.into(),
            security_id_source: "102".into(),
            trading_phase_code: "T0".into(),
            prev_close_price: 1_000_000,
            total_trade_num: self.appl_seq_num as i64,
            total_trade_volume: 0,
            total_trade_value: 0,
            md_entry_num: 0,
            open_price: 0,
            latest_trade_price: 0,
            bid_levels: [BookLevel::default(); MAX_BOOK_LEVELS + 1],
            ask_levels: [BookLevel::default(); MAX_BOOK_LEVELS + 1],
            depth: 5,
        };

        let mid = self.price() * 100;
        let mut entries = vec![SnapshotEntry::level(EntryType::Latest, 0, mid, 0)];
        for level in 1..=MAX_BOOK_LEVELS as u16 {
            let offset = level as i64 * 10_000;
            let mut bid = SnapshotEntry::level(EntryType::Buy, level, mid - offset, 0);
            let mut ask = SnapshotEntry::level(EntryType::Sell, level, mid + offset, 0);
            for entry in [&mut bid, &mut ask] {
                let orders = self.rng.gen_range(1..8);
                entry.order_quantities = (0..orders).map(|_| self.rng.gen_range(1i64..20) * 10_000).collect();
                entry.number_of_orders = orders as i64;
                entry.quantity = entry.order_quantities.iter().sum();
            }
            entries.push(bid);
            entries.push(ask);
        }
        encode_snapshot(&header, &entries)
    }
}

/// Swap neighbours within a small window and drop a fraction of datagrams
fn degrade(rng: &mut StdRng, datagrams: &[Vec<u8>], loss: f64) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = datagrams
        .iter()
        .filter(|_| !rng.gen_bool(loss))
        .cloned()
        .collect();
    for chunk in out.chunks_mut(4) {
        chunk.shuffle(rng);
    }
    out
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let message_count: usize = if args.len() > 1 {
        args[1].parse().unwrap_or(1000)
    } else {
        1000
    };

    let config = match args.get(2) {
        Some(path) => PipelineConfig::from_file(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?,
        None => PipelineConfig::default(),
    };
    let codes = config.message_types;

    let mut generator = Generator {
        rng: StdRng::seed_from_u64(42),
        appl_seq_num: 1,
        clock_ms: 30 * 60_000,
    };

    info!(message_count, "generating feed");

    let mut datagrams = Vec::new();
    for seq in 0..message_count {
        let mut records: Vec<(u32, Vec<u8>)> = Vec::new();
        for _ in 0..generator.rng.gen_range(1..40) {
            generator.clock_ms += generator.rng.gen_range(0..5);
            let record = match generator.rng.gen_range(0..10) {
                0..=5 => (codes.code(MessageType::Order), encode_order(&generator.order()).to_vec()),
                6..=8 => (codes.code(MessageType::Trade), encode_trade(&generator.trade()).to_vec()),
                _ => {
                    let security_id = SECURITIES.choose(&mut generator.rng).copied().unwrap_or("000001");
                    (codes.code(MessageType::Snapshot), generator.snapshot(security_id))
                }
            };
            records.push(record);
        }
        if seq % 50 == 0 {
            records.push((codes.code(MessageType::Heartbeat), Vec::new()));
        }

        let compress = generator.rng.gen_bool(0.7);
        datagrams.extend(encode_datagrams(seq as i64 + 1, 1, &records, compress)?);
    }

    let mut rng = StdRng::seed_from_u64(7);
    let feed_a = degrade(&mut rng, &datagrams, 0.02);
    let feed_b = degrade(&mut rng, &datagrams, 0.02);
    info!(
        datagrams = datagrams.len(),
        feed_a = feed_a.len(),
        feed_b = feed_b.len(),
        "feeds built"
    );

    let mut pipeline = MdPipeline::new(config);
    let mut emitted = 0usize;
    let longest = feed_a.len().max(feed_b.len());
    for i in 0..longest {
        for (feed, datagrams) in [(FeedId(0), &feed_a), (FeedId(1), &feed_b)] {
            if let Some(datagram) = datagrams.get(i) {
                let arrival = Arrival {
                    index: i as u64,
                    timestamp: i as u64 * 10,
                };
                emitted += pipeline.process(feed, datagram, arrival).len();
            }
        }
    }

    let summary = pipeline.finish();
    info!(
        generated = generator.appl_seq_num - 1,
        emitted,
        incomplete = summary.incomplete.len(),
        missing = summary.missing_appl_seq_nums,
        "feed replay complete"
    );

    Ok(())
}
