//! Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{MessageTypeCodes, MAX_BOOK_LEVELS, MAX_FRAGMENT_LEN};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Book levels per side exposed on decoded snapshots (1..=10). Default: 5.
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
    /// Fragment body size above which a datagram is reported as anomalous.
    /// Default: 1358.
    #[serde(default = "default_max_fragment_len")]
    pub max_fragment_len: usize,
    /// Number of decode latency samples kept for percentiles. Default: 10,000.
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
    /// Message-type codes of the feed revision. Defaults to the current revision.
    #[serde(default)]
    pub message_types: MessageTypeCodes,
}

fn default_book_depth() -> usize {
    5
}

fn default_max_fragment_len() -> usize {
    MAX_FRAGMENT_LEN
}

fn default_latency_window() -> usize {
    10_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            book_depth: default_book_depth(),
            max_fragment_len: default_max_fragment_len(),
            latency_window: default_latency_window(),
            message_types: MessageTypeCodes::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.book_depth == 0 || self.book_depth > MAX_BOOK_LEVELS {
            return Err(ConfigError::Invalid(format!(
                "book_depth {} outside 1..={}",
                self.book_depth, MAX_BOOK_LEVELS
            )));
        }
        if self.max_fragment_len == 0 {
            return Err(ConfigError::Invalid("max_fragment_len must be positive".into()));
        }
        if self.latency_window == 0 {
            return Err(ConfigError::Invalid("latency_window must be positive".into()));
        }
        if !self.message_types.is_distinct() {
            return Err(ConfigError::Invalid(format!(
                "message type codes must be distinct: {:?}",
                self.message_types
            )));
        }
        Ok(())
    }
}
