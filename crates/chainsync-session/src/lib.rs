//! # Chainsync Session
//!
//! The header-sync session of a peer-to-peer node's initial sync phase.
//!
//! ## Overview
//!
//! A [`SyncSession`] connects to candidate peers one at a time, attaches
//! keep-alive, address relay and header sync to each channel, and finishes
//! once a quorum of peers has completed header sync. Connection and sync
//! failures are retried indefinitely; only shutdown ends a session early.
//!
//! The transport, discovery and protocol implementations are supplied by the
//! surrounding node through the traits in [`network`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chainsync_core::{Checkpoint, HeaderHash};
//! use chainsync_session::memory::{MemoryNetwork, ScriptedAttempt};
//! use chainsync_session::{SessionConfig, SyncSession};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new(vec![ScriptedAttempt::SyncSuccess { headers: 10 }]);
//!     let top = Checkpoint::new(0, HeaderHash::ZERO);
//!     let config = SessionConfig { quorum: 1, ..SessionConfig::default() };
//!
//!     let mut session = SyncSession::new(network.clone(), network.clone(), top, vec![], config);
//!     network.bind_stop(session.stop_handle());
//!
//!     session.start().await.unwrap();
//!     println!("synced to height {}", session.headers().top_height());
//! }
//! ```
//!
//! ## Attempt Flow
//!
//! ```text
//! start
//!   |-> stopped? ---------------------------------> Err(ChannelStopped)
//!   |-> fetch_address -- fail --> retry
//!   |-> connect -------- fail --> retry
//!   |-> register_channel fail --> vote(fail) -----> retry
//!   |-> ping, address relay
//!   |-> sync_headers --> vote(result)
//!                          |-- service stopped --> Err(ServiceStopped)
//!                          |-- quorum reached ---> Ok(())
//!                          `-- otherwise -------> retry
//! ```

pub mod error;
pub mod events;
pub mod memory;
pub mod network;
pub mod session;
pub mod votes;

pub use error::{Result, SyncError};
pub use events::{EventSink, SessionEvent, TracingSink};
pub use network::{
    Channel, ChannelProtocols, ChannelStopReceiver, Connector, HeaderSyncRequest, Network,
};
pub use session::{
    Completion, SessionConfig, SessionState, StopHandle, SyncSession, DEFAULT_HEADERS_PER_SECOND,
    DEFAULT_QUORUM,
};
pub use votes::{QuorumVotes, VoteDecision};
