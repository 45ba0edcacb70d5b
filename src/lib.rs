//! Market Data Normalizer - Exchange Level-2 Feed Processor
//!
//! Turns raw UDP payloads from redundant multicast feeds into typed market-data
//! records. Features include:
//! - Fragment reassembly with stale-sequence dropping and eviction
//! - Envelope parsing and zlib decompression
//! - Big-endian record decoding (orders, trades, snapshots)
//! - Top-of-book reconstruction from snapshot entry lists
//! - Redundant-feed arbitration with appl_seq_num gap detection
//! - Run statistics and a synthetic feed encoder

pub mod protocol;
pub mod codec;
pub mod error;
pub mod records;
pub mod decompress;
pub mod reassembler;
pub mod gap_detector;
pub mod arbitrator;
pub mod decoder;
pub mod book_builder;
pub mod stats;
pub mod config;
pub mod pipeline;
pub mod encoder;

pub use protocol::{EntryType, MessageType, MessageTypeCodes};
pub use error::{DecompressionError, FeedError, FeedResult};
pub use records::{BookLevel, MarketRecord, Order, Side, Snapshot, Trade};
pub use decompress::{decompress, MessageEnvelope};
pub use reassembler::{FragmentReassembler, IncompleteMessage, ReassemblyCounters, UdpFragment};
pub use gap_detector::{Gap, GapDetector};
pub use arbitrator::FeedArbitrator;
pub use decoder::{DecodedRecord, PackedRecords, RawRecord, RecordDecoder};
pub use book_builder::{MdEntry, SnapshotBookBuilder};
pub use stats::{ErrorCounts, FeedStats, LatencyStats};
pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Arrival, FeedEvent, FeedId, MdPipeline, RunSummary};
