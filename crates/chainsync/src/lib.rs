//! # Chainsync
//!
//! Initial header synchronization for a peer-to-peer blockchain node.
//!
//! This crate wires the pieces together:
//!
//! - [`core`]: header hashes, checkpoints and the header list
//! - [`session`]: the quorum-driven header sync session
//! - [`HeaderSyncNode`]: reads the local chain top, runs a session and
//!   reports the headers gathered
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chainsync::{FixedChain, HeaderSyncNode, NodeConfig};
//! use chainsync::core::{Checkpoint, HeaderHash};
//! use chainsync::session::memory::{MemoryNetwork, ScriptedAttempt};
//!
//! async fn example() -> chainsync::Result<()> {
//!     let network = MemoryNetwork::new(vec![ScriptedAttempt::SyncSuccess { headers: 100 }]);
//!     let chain = FixedChain::new(Checkpoint::new(0, HeaderHash::ZERO));
//!     let config = NodeConfig::default().with_quorum(1).with_checkpoints(vec![]);
//!
//!     let node = HeaderSyncNode::new(chain, network.clone(), network, config)?;
//!     let report = node.synchronize().await?;
//!     println!("{} new headers", report.new_headers.len());
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod node;

pub use chain::{ChainSource, FixedChain};
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::{HeaderSyncNode, HeaderSyncReport};

pub use chainsync_core as core;
pub use chainsync_session as session;
