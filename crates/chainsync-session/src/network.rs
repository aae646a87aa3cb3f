//! Collaborator interfaces consumed by the sync session.
//!
//! The session never touches sockets or wire messages. Peer discovery,
//! connection establishment, channel registration and the per-channel
//! protocols are supplied by the surrounding node through these traits.
//! See [`crate::memory`] for scripted in-memory implementations.

use async_trait::async_trait;
use chainsync_core::{CheckpointSet, HeaderList, PeerAddress};
use tokio::sync::oneshot;

use crate::error::{Result, SyncError};

/// Resolves once when a registered channel closes, carrying the reason.
pub type ChannelStopReceiver = oneshot::Receiver<SyncError>;

/// An established connection to a peer.
pub trait Channel: Send + Sync {
    /// The remote peer's authority.
    fn authority(&self) -> PeerAddress;
}

/// Establishes outbound connections.
///
/// A session creates one connector per `start` and reuses it for every
/// retry of that run.
#[async_trait]
pub trait Connector: Send + Sync {
    type Channel: Channel;

    /// Connect to `address`.
    async fn connect(&self, address: &PeerAddress) -> Result<Self::Channel>;
}

/// The surrounding network layer.
#[async_trait]
pub trait Network: Send + Sync {
    type Channel: Channel;
    type Connector: Connector<Channel = Self::Channel>;

    /// Fetch one candidate peer address.
    async fn fetch_address(&self) -> Result<PeerAddress>;

    /// Create a connector for a new session run.
    fn create_connector(&self) -> Self::Connector;

    /// Register a connected channel.
    ///
    /// Resolves once the channel has started. The returned receiver fires
    /// when the channel later closes.
    async fn register_channel(&self, channel: &Self::Channel) -> Result<ChannelStopReceiver>;
}

/// Initial state handed to the header-sync protocol of one channel.
#[derive(Debug)]
pub struct HeaderSyncRequest<'a> {
    /// Maximum headers per second to request from the peer.
    pub rate_limit: u32,
    /// Height of `headers[0]`.
    pub start_height: u64,
    /// The session's accumulated headers; the protocol appends to it.
    pub headers: &'a mut HeaderList,
    /// Sorted checkpoints the received headers must agree with.
    pub checkpoints: &'a CheckpointSet,
}

/// Protocols attached to every sync channel.
#[async_trait]
pub trait ChannelProtocols<C: Channel>: Send + Sync {
    /// Start keep-alive pings. Fire and forget.
    fn start_ping(&self, channel: &C);

    /// Start address relay. Fire and forget.
    fn start_address(&self, channel: &C);

    /// Run header sync to completion.
    ///
    /// Returns `Ok(())` when the peer extended (or confirmed) the header
    /// chain, [`SyncError::ServiceStopped`] on shutdown, and any other error
    /// when this peer could not be synced.
    async fn sync_headers(&self, channel: &C, request: HeaderSyncRequest<'_>) -> Result<()>;
}
