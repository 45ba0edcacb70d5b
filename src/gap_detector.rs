//! Sequence number gap detection
//!
//! Tracks admitted sequence numbers of one channel and records the ranges
//! that were never seen. Gaps are informational only: nothing is requested
//! again.

/// Inclusive range of missing sequence numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: u64,
    pub end: u64,
}

impl Gap {
    pub fn missing(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone)]
pub struct GapDetector {
    last_sequence: Option<u64>,
    gaps: Vec<Gap>,
    total_missing: u64,
}

impl GapDetector {
    pub fn new() -> Self {
        GapDetector {
            last_sequence: None,
            gaps: Vec::new(),
            total_missing: 0,
        }
    }

    /// Process a sequence number; returns the gap it closes over, if any.
    ///
    /// Only forward jumps count. A sequence at or below the last one seen is
    /// ignored here; rejecting it is the arbitrator's job.
    pub fn process(&mut self, seq_num: u64) -> Option<Gap> {
        let gap = match self.last_sequence {
            None => None,
            Some(last) if seq_num <= last => return None,
            Some(last) => {
                let expected_next = last + 1;
                if seq_num > expected_next {
                    let gap = Gap {
                        start: expected_next,
                        end: seq_num - 1,
                    };
                    self.gaps.push(gap);
                    self.total_missing += gap.missing();
                    Some(gap)
                } else {
                    None
                }
            }
        };
        self.last_sequence = Some(seq_num);
        gap
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Get all detected gaps (inclusive ranges)
    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    /// Get total number of missing sequence numbers
    pub fn total_missing(&self) -> u64 {
        self.total_missing
    }

    /// Get count of gap ranges detected
    pub fn gap_count(&self) -> usize {
        self.gaps.len()
    }

    /// Check if a specific sequence number is in a gap
    pub fn is_in_gap(&self, seq_num: u64) -> bool {
        self.gaps.iter().any(|g| seq_num >= g.start && seq_num <= g.end)
    }
}

impl Default for GapDetector {
    fn default() -> Self {
        Self::new()
    }
}
