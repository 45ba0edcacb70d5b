//! UDP fragment reassembly
//!
//! A logical message larger than one datagram is split into fragments that
//! share a (channel_id, sequence_id) key. Fragments are buffered per key until
//! every slot is filled, then concatenated in slot order.
//!
//! Each channel also remembers the last sequence id it completed. Datagrams at
//! or below that watermark are stale (replays, or late fragments of a message
//! that was overtaken) and are dropped. Buffers below the watermark can never
//! complete and are evicted as soon as the watermark passes them.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::codec::FieldReader;
use crate::error::{FeedError, FeedResult};
use crate::protocol::{FRAGMENT_HEADER_SIZE, MAX_FRAGMENT_LEN};

/// One datagram's worth of a logical message, borrowed from the datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpFragment<'a> {
    pub sequence_id: i64,
    pub channel_id: u32,
    pub total_fragments: u16,
    pub initial_index: u16,
    pub current_index: u16,
    pub body: &'a [u8],
}

impl<'a> UdpFragment<'a> {
    /// Parse the fragment header of a raw UDP payload.
    ///
    /// Bytes after the declared body are ignored.
    pub fn parse(datagram: &'a [u8]) -> FeedResult<Self> {
        if datagram.len() < FRAGMENT_HEADER_SIZE {
            return Err(FeedError::TruncatedFragment {
                need: FRAGMENT_HEADER_SIZE,
                have: datagram.len(),
            });
        }

        let mut r = FieldReader::new(datagram);
        let sequence_id = r.read_u64()? as i64;
        let channel_id = r.read_u32()?;
        let total_fragments = r.read_u16()?;
        let initial_index = r.read_u16()?;
        let current_index = r.read_u16()?;
        let body_len = r.read_u32()? as usize;

        let need = FRAGMENT_HEADER_SIZE + body_len;
        if datagram.len() < need {
            return Err(FeedError::TruncatedFragment {
                need,
                have: datagram.len(),
            });
        }

        let fragment = UdpFragment {
            sequence_id,
            channel_id,
            total_fragments,
            initial_index,
            current_index,
            body: &datagram[FRAGMENT_HEADER_SIZE..need],
        };

        if total_fragments == 0 {
            return Err(FeedError::InvalidFragment(format!(
                "channel {} seq {}: zero total fragment count",
                channel_id, sequence_id
            )));
        }
        if fragment.index() >= total_fragments as usize {
            return Err(FeedError::InvalidFragment(format!(
                "channel {} seq {}: fragment index {} outside total {}",
                channel_id,
                sequence_id,
                fragment.index(),
                total_fragments
            )));
        }

        Ok(fragment)
    }

    /// Slot this fragment fills within its message
    pub fn index(&self) -> usize {
        self.initial_index as usize + self.current_index as usize
    }
}

/// Fragments received so far for one sequence id
#[derive(Debug, Clone)]
pub struct ReassemblyBuffer {
    slots: Vec<Option<Vec<u8>>>,
    filled: usize,
}

impl ReassemblyBuffer {
    pub fn new(total_fragments: u16) -> Self {
        ReassemblyBuffer {
            slots: vec![None; total_fragments as usize],
            filled: 0,
        }
    }

    /// Store a fragment body; the first writer of a slot wins.
    ///
    /// Each slot reserves `slot_capacity` bytes, or the body length if larger.
    /// Returns false if the slot was already filled.
    pub fn fill(&mut self, index: usize, body: &[u8], slot_capacity: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                let mut data = Vec::with_capacity(body.len().max(slot_capacity));
                data.extend_from_slice(body);
                *slot = Some(data);
                self.filled += 1;
                true
            }
            _ => false,
        }
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn received(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.filled == self.slots.len()
    }

    /// Concatenate every slot in index order
    pub fn into_message(self) -> Vec<u8> {
        let len = self.slots.iter().flatten().map(Vec::len).sum();
        let mut message = Vec::with_capacity(len);
        for slot in self.slots.into_iter().flatten() {
            message.extend_from_slice(&slot);
        }
        message
    }
}

/// A message that was still waiting for fragments when it was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteMessage {
    pub channel_id: u32,
    pub sequence_id: i64,
    pub received: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyCounters {
    pub fragments: u64,
    pub completed: u64,
    pub stale: u64,
    pub duplicate_fragments: u64,
    pub oversized: u64,
    pub evicted: u64,
    pub sequence_gaps: u64,
}

impl ReassemblyCounters {
    pub fn merge(&mut self, other: &ReassemblyCounters) {
        self.fragments += other.fragments;
        self.completed += other.completed;
        self.stale += other.stale;
        self.duplicate_fragments += other.duplicate_fragments;
        self.oversized += other.oversized;
        self.evicted += other.evicted;
        self.sequence_gaps += other.sequence_gaps;
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    last_completed: Option<i64>,
    pending: BTreeMap<i64, ReassemblyBuffer>,
}

/// Reassembles fragments of one physical feed
#[derive(Debug)]
pub struct FragmentReassembler {
    channels: HashMap<u32, ChannelState>,
    max_fragment_len: usize,
    counters: ReassemblyCounters,
}

impl FragmentReassembler {
    pub fn new(max_fragment_len: usize) -> Self {
        FragmentReassembler {
            channels: HashMap::new(),
            max_fragment_len,
            counters: ReassemblyCounters::default(),
        }
    }

    /// Feed one fragment; returns the complete message once its last fragment arrives.
    ///
    /// Single-fragment messages are returned as a view into the datagram.
    pub fn feed<'a>(&mut self, fragment: &UdpFragment<'a>) -> FeedResult<Option<Cow<'a, [u8]>>> {
        self.counters.fragments += 1;
        let max_fragment_len = self.max_fragment_len;
        let channel_id = fragment.channel_id;
        let sequence_id = fragment.sequence_id;
        let state = self.channels.entry(channel_id).or_default();

        if let Some(last) = state.last_completed {
            if sequence_id <= last {
                self.counters.stale += 1;
                debug!(channel_id, sequence_id, last, "dropped stale fragment");
                return Ok(None);
            }
            if sequence_id > last.saturating_add(1) && !state.pending.contains_key(&sequence_id) {
                self.counters.sequence_gaps += 1;
                warn!(channel_id, sequence_id, last, "fragment sequence gap");
            }
        }

        if fragment.body.len() > max_fragment_len {
            self.counters.oversized += 1;
            warn!(
                channel_id,
                sequence_id,
                body_len = fragment.body.len(),
                max = max_fragment_len,
                "fragment body exceeds maximum packet length"
            );
        }

        if let Some(buffer) = state.pending.get(&sequence_id) {
            if buffer.total() != fragment.total_fragments as usize {
                return Err(FeedError::InvalidFragment(format!(
                    "channel {} seq {}: total fragment count {} disagrees with earlier {}",
                    channel_id,
                    sequence_id,
                    fragment.total_fragments,
                    buffer.total()
                )));
            }
        }

        if fragment.total_fragments == 1 {
            Self::complete(state, &mut self.counters, channel_id, sequence_id);
            return Ok(Some(Cow::Borrowed(fragment.body)));
        }

        let buffer = state
            .pending
            .entry(sequence_id)
            .or_insert_with(|| ReassemblyBuffer::new(fragment.total_fragments));

        if !buffer.fill(fragment.index(), fragment.body, max_fragment_len) {
            self.counters.duplicate_fragments += 1;
            debug!(channel_id, sequence_id, index = fragment.index(), "ignored duplicate fragment");
            return Ok(None);
        }

        if !buffer.is_complete() {
            return Ok(None);
        }

        let message = state
            .pending
            .remove(&sequence_id)
            .map(ReassemblyBuffer::into_message);
        Self::complete(state, &mut self.counters, channel_id, sequence_id);
        Ok(message.map(Cow::Owned))
    }

    /// Advance the channel watermark and evict buffers at or below it
    fn complete(
        state: &mut ChannelState,
        counters: &mut ReassemblyCounters,
        channel_id: u32,
        sequence_id: i64,
    ) {
        counters.completed += 1;
        let watermark = state.last_completed.map_or(sequence_id, |l| l.max(sequence_id));
        state.last_completed = Some(watermark);

        // anything at or below the watermark would only ever see stale fragments
        let still_pending = state.pending.split_off(&watermark.saturating_add(1));
        let behind = std::mem::replace(&mut state.pending, still_pending);
        for (seq, buffer) in behind {
            counters.evicted += 1;
            warn!(
                channel_id,
                sequence_id = seq,
                received = buffer.received(),
                total = buffer.total(),
                "evicted incomplete message overtaken by newer sequence"
            );
        }
    }

    /// Number of messages still waiting for fragments
    pub fn pending_count(&self) -> usize {
        self.channels.values().map(|c| c.pending.len()).sum()
    }

    pub fn last_completed(&self, channel_id: u32) -> Option<i64> {
        self.channels.get(&channel_id).and_then(|c| c.last_completed)
    }

    /// Remove and report every message that never completed
    pub fn drain_incomplete(&mut self) -> Vec<IncompleteMessage> {
        let mut leftovers = Vec::new();
        for (&channel_id, state) in self.channels.iter_mut() {
            for (sequence_id, buffer) in std::mem::take(&mut state.pending) {
                leftovers.push(IncompleteMessage {
                    channel_id,
                    sequence_id,
                    received: buffer.received(),
                    total: buffer.total(),
                });
            }
        }
        leftovers.sort_by_key(|m| (m.channel_id, m.sequence_id));
        leftovers
    }

    pub fn counters(&self) -> &ReassemblyCounters {
        &self.counters
    }
}

impl Default for FragmentReassembler {
    fn default() -> Self {
        Self::new(MAX_FRAGMENT_LEN)
    }
}
