//! Local chain access.

use async_trait::async_trait;
use chainsync_core::Checkpoint;

use crate::error::{NodeError, Result};

/// Read access to the local header chain.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// The current top header as a checkpoint.
    async fn top_checkpoint(&self) -> Result<Checkpoint>;
}

/// A chain with a fixed top, or one that always fails.
#[derive(Debug, Clone)]
pub struct FixedChain {
    top: std::result::Result<Checkpoint, String>,
}

impl FixedChain {
    pub fn new(top: Checkpoint) -> Self {
        Self { top: Ok(top) }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            top: Err(reason.into()),
        }
    }
}

#[async_trait]
impl ChainSource for FixedChain {
    async fn top_checkpoint(&self) -> Result<Checkpoint> {
        self.top.clone().map_err(NodeError::Chain)
    }
}
