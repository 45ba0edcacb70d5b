//! Datagram-to-record pipeline
//!
//! Drives one datagram at a time through reassembly, envelope parsing,
//! decompression, record decoding and arbitration. Every redundant feed gets
//! its own reassembler (fragment sequence ids are per network), while decoding
//! state and the arbitrator are shared so a record seen on both feeds is
//! emitted once.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::arbitrator::FeedArbitrator;
use crate::book_builder::SnapshotBookBuilder;
use crate::config::PipelineConfig;
use crate::decoder::{DecodedRecord, PackedRecords, RecordDecoder};
use crate::decompress::{decompress, MessageEnvelope};
use crate::error::{FeedError, FeedResult};
use crate::reassembler::{FragmentReassembler, IncompleteMessage, ReassemblyCounters, UdpFragment};
use crate::records::MarketRecord;
use crate::stats::FeedStats;

/// Which redundant physical network a datagram came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedId(pub u8);

/// Caller-supplied capture metadata, passed through untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Arrival {
    pub index: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    pub record: MarketRecord,
    pub arrival: Arrival,
    pub feed: FeedId,
}

/// End-of-run report returned by `MdPipeline::finish`
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: FeedStats,
    pub reassembly: ReassemblyCounters,
    pub incomplete: Vec<(FeedId, IncompleteMessage)>,
    pub unknown_message_types: BTreeMap<u32, u64>,
    pub gap_events: usize,
    pub missing_appl_seq_nums: u64,
}

pub struct MdPipeline {
    config: PipelineConfig,
    feeds: HashMap<FeedId, FragmentReassembler>,
    decoder: RecordDecoder,
    arbitrator: FeedArbitrator,
    stats: FeedStats,
}

impl MdPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let decoder = RecordDecoder::new(
            config.message_types,
            SnapshotBookBuilder::new(config.book_depth),
        );
        let stats = FeedStats::new(config.latency_window);
        MdPipeline {
            config,
            feeds: HashMap::new(),
            decoder,
            arbitrator: FeedArbitrator::new(),
            stats,
        }
    }

    /// Process one UDP payload and return the records it completed.
    ///
    /// Errors never escape: a bad datagram or record is logged, counted and
    /// skipped.
    pub fn process(&mut self, feed: FeedId, datagram: &[u8], arrival: Arrival) -> Vec<FeedEvent> {
        self.stats.record_datagram(datagram.len());

        let mut events = Vec::new();
        if let Err(e) = self.process_datagram(feed, datagram, arrival, &mut events) {
            self.stats.record_error(&e);
            warn!(feed = feed.0, arrival = arrival.index, error = %e, "dropped datagram");
        }
        events
    }

    fn process_datagram(
        &mut self,
        feed: FeedId,
        datagram: &[u8],
        arrival: Arrival,
        events: &mut Vec<FeedEvent>,
    ) -> FeedResult<()> {
        let fragment = UdpFragment::parse(datagram)?;
        let max_fragment_len = self.config.max_fragment_len;
        let reassembler = self
            .feeds
            .entry(feed)
            .or_insert_with(|| FragmentReassembler::new(max_fragment_len));

        let message = match reassembler.feed(&fragment)? {
            Some(message) => message,
            None => return Ok(()),
        };

        let started = Instant::now();
        let (envelope, payload) = MessageEnvelope::parse(&message)?;
        let payload = decompress(&envelope, payload)?;
        self.stats.record_message(payload.len());

        let records = PackedRecords::new(&payload)?;
        debug!(
            feed = feed.0,
            sequence_id = fragment.sequence_id,
            md_count = records.declared_count(),
            "decoding message"
        );
        for raw in records {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    // Offsets past a framing error are meaningless
                    self.record_failure(feed, fragment.sequence_id, &e);
                    break;
                }
            };
            match self.decoder.decode(raw.message_type, raw.body) {
                Ok(record) => self.admit(record, feed, arrival, events),
                Err(e) => self.record_failure(feed, fragment.sequence_id, &e),
            }
        }

        self.stats
            .record_decode_latency(started.elapsed().as_micros() as u64);
        Ok(())
    }

    fn admit(
        &mut self,
        record: DecodedRecord,
        feed: FeedId,
        arrival: Arrival,
        events: &mut Vec<FeedEvent>,
    ) {
        let admitted = match &record {
            DecodedRecord::Order(o) => {
                self.arbitrator.admit_order_or_trade(o.channel_no, o.appl_seq_num)
            }
            DecodedRecord::Trade(t) => {
                self.arbitrator.admit_order_or_trade(t.channel_no, t.appl_seq_num)
            }
            DecodedRecord::Snapshot(s) => self.arbitrator.admit_snapshot(&s.security_id, s.orig_time),
            DecodedRecord::Heartbeat | DecodedRecord::Stats => {
                self.stats.record_ignored();
                return;
            }
            DecodedRecord::Unknown(_) => {
                self.stats.record_unknown();
                return;
            }
        };

        if !admitted {
            self.stats.record_duplicate();
            return;
        }

        if let Some(record) = record.into_market_record() {
            debug!(
                feed = feed.0,
                security_id = record.security_id(),
                message_type = ?record.message_type(),
                "emitted record"
            );
            self.stats.record_emitted(&record);
            events.push(FeedEvent {
                record,
                arrival,
                feed,
            });
        }
    }

    fn record_failure(&mut self, feed: FeedId, sequence_id: i64, error: &FeedError) {
        self.stats.record_error(error);
        warn!(feed = feed.0, sequence_id, error = %error, "skipped record");
    }

    /// Drain what is left, log the run summary and hand it back
    pub fn finish(&mut self) -> RunSummary {
        let mut feed_ids: Vec<FeedId> = self.feeds.keys().copied().collect();
        feed_ids.sort();

        let mut incomplete = Vec::new();
        let mut reassembly = ReassemblyCounters::default();
        for feed in feed_ids {
            if let Some(reassembler) = self.feeds.get_mut(&feed) {
                for leftover in reassembler.drain_incomplete() {
                    warn!(
                        feed = feed.0,
                        channel_id = leftover.channel_id,
                        sequence_id = leftover.sequence_id,
                        received = leftover.received,
                        total = leftover.total,
                        "unprocessed message"
                    );
                    incomplete.push((feed, leftover));
                }
                reassembly.merge(reassembler.counters());
            }
        }

        self.stats.log_summary();
        info!(
            fragments = reassembly.fragments,
            completed = reassembly.completed,
            stale = reassembly.stale,
            duplicate_fragments = reassembly.duplicate_fragments,
            evicted = reassembly.evicted,
            incomplete = incomplete.len(),
            "reassembly"
        );
        info!(
            gap_events = self.arbitrator.gap_events(),
            missing = self.arbitrator.total_missing(),
            "appl_seq_num gaps"
        );
        for (message_type, count) in self.decoder.unknown_message_types() {
            info!(message_type, count, "unknown message type");
        }

        RunSummary {
            stats: self.stats.clone(),
            reassembly,
            incomplete,
            unknown_message_types: self.decoder.unknown_message_types().clone(),
            gap_events: self.arbitrator.gap_events(),
            missing_appl_seq_nums: self.arbitrator.total_missing(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub fn arbitrator(&self) -> &FeedArbitrator {
        &self.arbitrator
    }

    pub fn unknown_message_types(&self) -> &BTreeMap<u32, u64> {
        self.decoder.unknown_message_types()
    }

    /// Messages still waiting for fragments, over all feeds
    pub fn pending_count(&self) -> usize {
        self.feeds.values().map(|r| r.pending_count()).sum()
    }

    /// Reassembly counters summed over all feeds
    pub fn reassembly_counters(&self) -> ReassemblyCounters {
        let mut total = ReassemblyCounters::default();
        for reassembler in self.feeds.values() {
            total.merge(reassembler.counters());
        }
        total
    }
}

impl Default for MdPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
