//! Feed statistics tracking
//!
//! Counts what happened to every datagram and record on its way through the
//! pipeline, plus a sliding window of per-message decode latencies.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::FeedError;
use crate::records::MarketRecord;

#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Errors by category; one bad datagram or record bumps exactly one of these
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCounts {
    pub truncated_fragments: u64,
    pub invalid_fragments: u64,
    pub decompression_failures: u64,
    pub malformed_records: u64,
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    // Timing
    start_time: Option<Instant>,

    datagrams: u64,
    datagram_bytes: u64,
    messages: u64,
    message_bytes: u64,

    orders: u64,
    trades: u64,
    snapshots: u64,
    ignored_records: u64,
    unknown_records: u64,
    duplicates_rejected: u64,

    errors: ErrorCounts,

    // Decode latencies (in microseconds)
    window: usize,
    decode_latencies: VecDeque<u64>,
}

impl FeedStats {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        FeedStats {
            start_time: None,
            datagrams: 0,
            datagram_bytes: 0,
            messages: 0,
            message_bytes: 0,
            orders: 0,
            trades: 0,
            snapshots: 0,
            ignored_records: 0,
            unknown_records: 0,
            duplicates_rejected: 0,
            errors: ErrorCounts::default(),
            window,
            decode_latencies: VecDeque::with_capacity(window),
        }
    }

    /// Record a datagram received
    pub fn record_datagram(&mut self, size: usize) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
        self.datagrams += 1;
        self.datagram_bytes += size as u64;
    }

    /// Record a complete, decompressed message
    pub fn record_message(&mut self, size: usize) {
        self.messages += 1;
        self.message_bytes += size as u64;
    }

    /// Record a record handed to the sink
    pub fn record_emitted(&mut self, record: &MarketRecord) {
        match record {
            MarketRecord::Order(_) => self.orders += 1,
            MarketRecord::Trade(_) => self.trades += 1,
            MarketRecord::Snapshot(_) => self.snapshots += 1,
        }
    }

    pub fn record_ignored(&mut self) {
        self.ignored_records += 1;
    }

    pub fn record_unknown(&mut self) {
        self.unknown_records += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates_rejected += 1;
    }

    pub fn record_error(&mut self, error: &FeedError) {
        match error {
            FeedError::TruncatedFragment { .. } => self.errors.truncated_fragments += 1,
            FeedError::InvalidFragment(_) => self.errors.invalid_fragments += 1,
            FeedError::Decompression(_) => self.errors.decompression_failures += 1,
            FeedError::BufferTooSmall { .. } | FeedError::MalformedRecord(_) => {
                self.errors.malformed_records += 1
            }
        }
    }

    /// Record decode latency in microseconds
    pub fn record_decode_latency(&mut self, micros: u64) {
        if self.decode_latencies.len() >= self.window {
            self.decode_latencies.pop_front();
        }
        self.decode_latencies.push_back(micros);
    }

    /// Get datagrams per second
    pub fn datagrams_per_sec(&self) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.datagrams as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    /// Get decode latency statistics
    pub fn decode_latency_stats(&self) -> Option<LatencyStats> {
        if self.decode_latencies.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.decode_latencies.iter().copied().collect();
        sorted.sort_unstable();

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        let p50 = sorted[sorted.len() / 2];
        let p99 = sorted[(sorted.len() * 99) / 100];

        Some(LatencyStats {
            min_us: min,
            max_us: max,
            mean_us: mean,
            p50_us: p50,
            p99_us: p99,
        })
    }

    /// Get total elapsed time
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn datagrams(&self) -> u64 {
        self.datagrams
    }

    pub fn datagram_bytes(&self) -> u64 {
        self.datagram_bytes
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn message_bytes(&self) -> u64 {
        self.message_bytes
    }

    pub fn orders(&self) -> u64 {
        self.orders
    }

    pub fn trades(&self) -> u64 {
        self.trades
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }

    pub fn emitted(&self) -> u64 {
        self.orders + self.trades + self.snapshots
    }

    pub fn ignored_records(&self) -> u64 {
        self.ignored_records
    }

    pub fn unknown_records(&self) -> u64 {
        self.unknown_records
    }

    pub fn duplicates_rejected(&self) -> u64 {
        self.duplicates_rejected
    }

    pub fn errors(&self) -> &ErrorCounts {
        &self.errors
    }

    /// Log statistics summary
    pub fn log_summary(&self) {
        info!(
            datagrams = self.datagrams,
            datagram_bytes = self.datagram_bytes,
            messages = self.messages,
            message_bytes = self.message_bytes,
            elapsed = ?self.elapsed(),
            datagrams_per_sec = self.datagrams_per_sec(),
            "feed statistics"
        );
        info!(
            orders = self.orders,
            trades = self.trades,
            snapshots = self.snapshots,
            duplicates_rejected = self.duplicates_rejected,
            ignored = self.ignored_records,
            unknown = self.unknown_records,
            "records"
        );
        info!(
            truncated_fragments = self.errors.truncated_fragments,
            invalid_fragments = self.errors.invalid_fragments,
            decompression_failures = self.errors.decompression_failures,
            malformed_records = self.errors.malformed_records,
            "errors"
        );

        if let Some(stats) = self.decode_latency_stats() {
            info!(
                min_us = stats.min_us,
                max_us = stats.max_us,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "decode latency"
            );
        }
    }
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new(10_000)
    }
}
