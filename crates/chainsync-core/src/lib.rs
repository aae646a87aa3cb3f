//! # Chainsync Core
//!
//! Pure primitives for header synchronization: header hashes, checkpoints,
//! the accumulated header list and peer addresses.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`HeaderHash`] - A 32-byte block header digest
//! - [`Checkpoint`] - A trusted `(height, hash)` anchor
//! - [`CheckpointSet`] - Checkpoints kept in ascending height order
//! - [`HeaderList`] - Header hashes accumulated from a seed checkpoint
//! - [`PeerAddress`] - The authority of a remote peer

pub mod checkpoint;
pub mod error;
pub mod hash;
pub mod headers;
pub mod peer;

pub use checkpoint::{mainnet_checkpoints, Checkpoint, CheckpointSet};
pub use error::{CoreError, Result};
pub use hash::HeaderHash;
pub use headers::HeaderList;
pub use peer::PeerAddress;
