//! Error types for the node facade.

use chainsync_core::CoreError;
use chainsync_session::SyncError;
use thiserror::Error;

/// Errors that can occur while running header synchronization.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The sync session ended without reaching quorum.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The local chain could not supply its top header.
    #[error("chain error: {0}")]
    Chain(String),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The node is stopped or stopping.
    #[error("service stopped")]
    ServiceStopped,

    /// Core value error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
