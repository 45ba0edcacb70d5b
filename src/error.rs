//! Error types shared by every stage of the pipeline.
//!
//! All of these are local to one datagram or one record: the pipeline logs
//! and counts them, then moves on to the next datagram.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("truncated fragment: need {need} bytes, have {have}")]
    TruncatedFragment { need: usize, have: usize },

    #[error("invalid fragment header: {0}")]
    InvalidFragment(String),

    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("decompression failed: {0}")]
    Decompression(#[from] DecompressionError),

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressionError {
    #[error("compressed payload truncated: declared {declared} bytes, have {have}")]
    Truncated { declared: usize, have: usize },

    #[error("inflate failed: {0}")]
    Inflate(String),

    #[error("inflated size mismatch: declared {declared}, got {actual}")]
    SizeMismatch { declared: usize, actual: usize },
}

pub type FeedResult<T> = Result<T, FeedError>;
