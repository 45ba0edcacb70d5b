//! Redundant-feed arbitration
//!
//! The exchange publishes the same logical stream on two networks. A record is
//! admitted only if its ordinal is strictly newer than the last one admitted
//! for its key: appl_seq_num per channel for orders and trades, exchange
//! origination time per instrument for snapshots. Everything else is a
//! duplicate or a stale replay.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::gap_detector::GapDetector;

#[derive(Debug, Default)]
pub struct FeedArbitrator {
    // Orders and trades of one channel share a single appl_seq_num space
    channels: HashMap<u16, GapDetector>,
    snapshot_times: HashMap<String, i64>,
    rejected_orders_trades: u64,
    rejected_snapshots: u64,
}

impl FeedArbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an order or trade if its appl_seq_num is newer than the channel's last.
    pub fn admit_order_or_trade(&mut self, channel_no: u16, appl_seq_num: u64) -> bool {
        let cursor = self.channels.entry(channel_no).or_default();

        if let Some(last) = cursor.last_sequence() {
            if appl_seq_num <= last {
                self.rejected_orders_trades += 1;
                debug!(channel_no, appl_seq_num, last, "dropped duplicate order/trade");
                return false;
            }
        }

        if let Some(gap) = cursor.process(appl_seq_num) {
            warn!(
                channel_no,
                appl_seq_num,
                gap_start = gap.start,
                gap_end = gap.end,
                missing = gap.missing(),
                "appl_seq_num gap"
            );
        }
        true
    }

    /// Admit a snapshot if it is newer than the last one seen for the instrument.
    pub fn admit_snapshot(&mut self, security_id: &str, orig_time: i64) -> bool {
        match self.snapshot_times.get_mut(security_id) {
            Some(last) if orig_time <= *last => {
                self.rejected_snapshots += 1;
                debug!(security_id, orig_time, last = *last, "dropped duplicate snapshot");
                false
            }
            Some(last) => {
                *last = orig_time;
                true
            }
            None => {
                self.snapshot_times.insert(security_id.to_owned(), orig_time);
                true
            }
        }
    }

    pub fn last_appl_seq_num(&self, channel_no: u16) -> Option<u64> {
        self.channels.get(&channel_no).and_then(|c| c.last_sequence())
    }

    pub fn last_snapshot_time(&self, security_id: &str) -> Option<i64> {
        self.snapshot_times.get(security_id).copied()
    }

    /// Gap history of one channel
    pub fn gaps(&self, channel_no: u16) -> Option<&GapDetector> {
        self.channels.get(&channel_no)
    }

    /// Missing appl_seq_nums summed over every channel
    pub fn total_missing(&self) -> u64 {
        self.channels.values().map(|c| c.total_missing()).sum()
    }

    pub fn gap_events(&self) -> usize {
        self.channels.values().map(|c| c.gap_count()).sum()
    }

    pub fn rejected_orders_trades(&self) -> u64 {
        self.rejected_orders_trades
    }

    pub fn rejected_snapshots(&self) -> u64 {
        self.rejected_snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_admission() {
        let mut arb = FeedArbitrator::new();
        for seq in [100, 101, 105, 200] {
            assert!(arb.admit_order_or_trade(1, seq));
        }
        assert!(!arb.admit_order_or_trade(1, 200));
        assert!(!arb.admit_order_or_trade(1, 150));
        assert!(!arb.admit_order_or_trade(1, 0));
        assert_eq!(arb.last_appl_seq_num(1), Some(200));
        assert_eq!(arb.rejected_orders_trades(), 3);
    }

    #[test]
    fn test_duplicate_then_next() {
        let mut arb = FeedArbitrator::new();
        assert!(arb.admit_order_or_trade(1, 100));
        assert!(!arb.admit_order_or_trade(1, 100));
        assert!(arb.admit_order_or_trade(1, 101));
    }

    #[test]
    fn test_first_sequence_zero_admitted() {
        let mut arb = FeedArbitrator::new();
        assert!(arb.admit_order_or_trade(9, 0));
        assert!(!arb.admit_order_or_trade(9, 0));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut arb = FeedArbitrator::new();
        assert!(arb.admit_order_or_trade(1, 500));
        assert!(arb.admit_order_or_trade(2, 10));
        assert!(arb.admit_order_or_trade(2, 11));
        assert!(!arb.admit_order_or_trade(1, 499));
        assert_eq!(arb.last_appl_seq_num(3), None);
    }

    #[test]
    fn test_gaps_pass_and_are_recorded() {
        let mut arb = FeedArbitrator::new();
        assert!(arb.admit_order_or_trade(4, 1));
        assert!(arb.admit_order_or_trade(4, 5));
        assert_eq!(arb.total_missing(), 3);
        assert_eq!(arb.gap_events(), 1);
        assert!(arb.gaps(4).unwrap().is_in_gap(3));
    }

    #[test]
    fn test_snapshot_admission() {
        let mut arb = FeedArbitrator::new();
        assert!(arb.admit_snapshot("000001", 93000000));
        assert!(!arb.admit_snapshot("000001", 93000000));
        assert!(!arb.admit_snapshot("000001", 92959000));
        assert!(arb.admit_snapshot("000002", 92959000));
        assert!(arb.admit_snapshot("000001", 93003000));
        assert_eq!(arb.last_snapshot_time("000001"), Some(93003000));
        assert_eq!(arb.rejected_snapshots(), 2);
    }
}
