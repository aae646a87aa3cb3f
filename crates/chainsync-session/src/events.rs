//! Session observability.
//!
//! The session reports progress through an [`EventSink`] instead of logging
//! inline. [`TracingSink`] forwards events to `tracing`; tests use
//! [`crate::memory::RecordingSink`] to assert on them.

use chainsync_core::PeerAddress;

use crate::error::SyncError;

/// Progress points of a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A run began.
    Started { quorum: usize, start_height: u64 },
    /// A connection attempt began.
    AttemptStarted { attempt: u64 },
    /// Discovery produced no address.
    AddressFetchFailed { attempt: u64, error: SyncError },
    /// About to connect to a candidate.
    Contacting { attempt: u64, peer: PeerAddress },
    /// Connecting to a candidate failed.
    ConnectFailed {
        attempt: u64,
        peer: PeerAddress,
        error: SyncError,
    },
    /// A channel was established.
    Connected { attempt: u64, peer: PeerAddress },
    /// Channel registration failed.
    ChannelStartFailed { peer: PeerAddress, error: SyncError },
    /// Header sync with a peer succeeded.
    HeaderSyncCompleted { peer: PeerAddress, top_height: u64 },
    /// Header sync with a peer failed.
    HeaderSyncFailed { peer: PeerAddress, error: SyncError },
    /// A successful sync was counted.
    VoteRecorded { votes: usize, quorum: usize },
    /// A registered channel closed.
    ChannelStopped { peer: PeerAddress, reason: SyncError },
    /// The stop flag was seen at a re-entry point.
    Suspended,
    /// The service reported shutdown.
    ServiceStopped,
    /// Quorum reached.
    Completed { votes: usize, top_height: u64 },
}

/// Receives session events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &SessionEvent);
}

/// Emits session events as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { quorum, start_height } => {
                tracing::info!(
                    "Starting header sync from height {} (quorum {})",
                    start_height,
                    quorum
                );
            }
            SessionEvent::AttemptStarted { attempt } => {
                tracing::trace!("Header sync attempt {}", attempt);
            }
            SessionEvent::AddressFetchFailed { attempt, error } => {
                tracing::debug!("Failure fetching sync address (attempt {}): {}", attempt, error);
            }
            SessionEvent::Contacting { peer, .. } => {
                tracing::info!("Contacting sync [{}]", peer);
            }
            SessionEvent::ConnectFailed { peer, error, .. } => {
                tracing::debug!("Failure connecting [{}] sync: {}", peer, error);
            }
            SessionEvent::Connected { peer, .. } => {
                tracing::info!("Connected to sync [{}]", peer);
            }
            SessionEvent::ChannelStartFailed { peer, error } => {
                tracing::debug!("Failure starting sync channel [{}]: {}", peer, error);
            }
            SessionEvent::HeaderSyncCompleted { peer, top_height } => {
                tracing::info!("Synced headers from [{}] to height {}", peer, top_height);
            }
            SessionEvent::HeaderSyncFailed { peer, error } => {
                tracing::debug!("Failure syncing headers from [{}]: {}", peer, error);
            }
            SessionEvent::VoteRecorded { votes, quorum } => {
                tracing::debug!("Header sync vote {} of {}", votes, quorum);
            }
            SessionEvent::ChannelStopped { peer, reason } => {
                tracing::debug!("Sync channel [{}] stopped: {}", peer, reason);
            }
            SessionEvent::Suspended => {
                tracing::debug!("Suspending header sync session");
            }
            SessionEvent::ServiceStopped => {
                tracing::warn!("Header sync interrupted by service shutdown");
            }
            SessionEvent::Completed { votes, top_height } => {
                tracing::info!(
                    "Header sync complete at height {} with {} votes",
                    top_height,
                    votes
                );
            }
        }
    }
}
