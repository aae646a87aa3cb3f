//! Node configuration.
//!
//! Loading configuration from disk belongs to the embedding application;
//! `NodeConfig` derives serde so any format can be used.

use std::time::Duration;

use chainsync_core::{mainnet_checkpoints, Checkpoint};
use chainsync_session::{SessionConfig, DEFAULT_HEADERS_PER_SECOND, DEFAULT_QUORUM};
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};

/// Configuration for header synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Peers that must complete header sync.
    pub quorum: usize,
    /// Header request rate limit per channel.
    pub headers_per_second: u32,
    /// Pause after a failed connection attempt, in milliseconds.
    pub retry_delay_ms: u64,
    /// Trusted checkpoints, in any order.
    pub checkpoints: Vec<Checkpoint>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            quorum: DEFAULT_QUORUM,
            headers_per_second: DEFAULT_HEADERS_PER_SECOND,
            retry_delay_ms: 0,
            checkpoints: mainnet_checkpoints(),
        }
    }
}

impl NodeConfig {
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_headers_per_second(mut self, rate: u32) -> Self {
        self.headers_per_second = rate;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Vec<Checkpoint>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    /// Replace the checkpoints with ones parsed from `<hash>:<height>` text.
    pub fn with_checkpoint_strs(mut self, checkpoints: &[&str]) -> Result<Self> {
        self.checkpoints = checkpoints
            .iter()
            .map(|text| text.parse::<Checkpoint>())
            .collect::<std::result::Result<_, _>>()?;
        Ok(self)
    }

    /// Reject settings that would stall header sync.
    pub fn validate(&self) -> Result<()> {
        if self.headers_per_second == 0 {
            return Err(NodeError::Config("headers_per_second must be positive".into()));
        }
        Ok(())
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            quorum: self.quorum,
            headers_per_second: self.headers_per_second,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
