//! Error types for the session module.

use chainsync_core::{CoreError, HeaderHash};
use thiserror::Error;

/// Result codes produced by the session and its collaborators.
///
/// Only [`SyncError::ServiceStopped`], [`SyncError::ChannelStopped`] and
/// [`SyncError::OperationFailed`] ever leave a session. Every other variant
/// describes a failed attempt and is absorbed into a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The surrounding service is shutting down.
    #[error("service stopped")]
    ServiceStopped,

    /// The session was stopped before it could finish.
    #[error("channel stopped")]
    ChannelStopped,

    /// The operation is not valid in the current state.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// Peer discovery could not supply an address.
    #[error("address unavailable: {0}")]
    AddressUnavailable(String),

    /// Outbound connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Channel registration or handshake failed.
    #[error("channel start failed: {0}")]
    ChannelStart(String),

    /// Header exchange with the peer failed.
    #[error("header sync failed: {0}")]
    HeaderSync(String),

    /// A peer served a header that contradicts a checkpoint.
    #[error("checkpoint mismatch at height {height}: got {got}")]
    CheckpointMismatch { height: u64, got: HeaderHash },

    /// Timeout waiting for a peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Core value error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Whether this code ends a session instead of triggering a retry.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, SyncError::ServiceStopped | SyncError::ChannelStopped)
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
