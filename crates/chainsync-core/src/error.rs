//! Error types for Chainsync Core.

use thiserror::Error;

/// Errors raised while parsing or building core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid header hash: {0}")]
    InvalidHash(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("invalid peer address: {0}")]
    InvalidAddress(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
