//! In-memory collaborators for testing.
//!
//! [`MemoryNetwork`] plays every role the session consumes: discovery,
//! connector, channel registration and the per-channel protocols. Each
//! connection attempt follows the next entry of a script, so tests can
//! replay exact sequences of peer behaviour.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use chainsync_core::{HeaderHash, PeerAddress};
use rand::seq::SliceRandom;
use tokio::sync::{oneshot, RwLock};

use crate::error::{Result, SyncError};
use crate::events::{EventSink, SessionEvent};
use crate::network::{
    Channel, ChannelProtocols, ChannelStopReceiver, Connector, HeaderSyncRequest, Network,
};
use crate::session::StopHandle;

/// How one connection attempt plays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedAttempt {
    /// Discovery fails.
    AddressUnavailable,
    /// The peer refuses the connection.
    ConnectFailure,
    /// The channel connects but fails to start.
    RegistrationFailure,
    /// Header sync fails.
    SyncFailure,
    /// Header sync appends `headers` new headers and succeeds.
    SyncSuccess { headers: usize },
    /// Header sync reports service shutdown.
    ServiceStopped,
    /// The bound session is stopped while header sync runs, which then
    /// succeeds with `headers` new headers.
    StopDuringSync { headers: usize },
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub address_fetches: usize,
    pub connectors_created: usize,
    pub connects: usize,
    pub registrations: usize,
    pub pings_started: usize,
    pub address_relays_started: usize,
    pub header_syncs: usize,
}

/// What a header-sync run was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequestRecord {
    pub peer: PeerAddress,
    pub rate_limit: u32,
    pub start_height: u64,
    pub headers_before: usize,
    pub checkpoints: usize,
}

#[derive(Default)]
struct Counters {
    address_fetches: AtomicUsize,
    connectors_created: AtomicUsize,
    connects: AtomicUsize,
    registrations: AtomicUsize,
    pings_started: AtomicUsize,
    address_relays_started: AtomicUsize,
    header_syncs: AtomicUsize,
    active_channels: AtomicUsize,
    peak_channels: AtomicUsize,
}

struct Shared {
    script: RwLock<VecDeque<ScriptedAttempt>>,
    /// Plan chosen at address fetch, consumed by the next connect.
    pending: RwLock<Option<ScriptedAttempt>>,
    hosts: Vec<PeerAddress>,
    stop: OnceLock<StopHandle>,
    stop_after_fetches: OnceLock<usize>,
    counters: Counters,
    requests: RwLock<Vec<SyncRequestRecord>>,
}

impl Shared {
    fn stop_session(&self) {
        if let Some(stop) = self.stop.get() {
            stop.stop();
        }
    }
}

/// A scripted network.
///
/// Clones share state, so a test can keep one clone for inspection while
/// the session owns others. Once the script is exhausted, address fetches
/// fail and stop the bound session; always [`bind_stop`](Self::bind_stop)
/// before starting a session that might outlive its script.
#[derive(Clone)]
pub struct MemoryNetwork {
    shared: Arc<Shared>,
}

impl MemoryNetwork {
    /// Create a network that plays `script` in order.
    pub fn new(script: Vec<ScriptedAttempt>) -> Self {
        let hosts = (1..=8)
            .map(|i| PeerAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)), 8333))
            .collect();
        Self::with_hosts(script, hosts)
    }

    /// Create a network drawing candidate addresses from `hosts`.
    pub fn with_hosts(script: Vec<ScriptedAttempt>, hosts: Vec<PeerAddress>) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: RwLock::new(script.into()),
                pending: RwLock::new(None),
                hosts,
                stop: OnceLock::new(),
                stop_after_fetches: OnceLock::new(),
                counters: Counters::default(),
                requests: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Bind the session this network stops when its script runs out.
    pub fn bind_stop(&self, handle: StopHandle) {
        let _ = self.shared.stop.set(handle);
    }

    /// Stop the bound session during the `n`th address fetch.
    pub fn stop_after_fetches(&self, n: usize) {
        let _ = self.shared.stop_after_fetches.set(n);
    }

    pub fn stats(&self) -> NetworkStats {
        let c = &self.shared.counters;
        NetworkStats {
            address_fetches: c.address_fetches.load(Ordering::SeqCst),
            connectors_created: c.connectors_created.load(Ordering::SeqCst),
            connects: c.connects.load(Ordering::SeqCst),
            registrations: c.registrations.load(Ordering::SeqCst),
            pings_started: c.pings_started.load(Ordering::SeqCst),
            address_relays_started: c.address_relays_started.load(Ordering::SeqCst),
            header_syncs: c.header_syncs.load(Ordering::SeqCst),
        }
    }

    /// Channels currently open.
    pub fn active_channels(&self) -> usize {
        self.shared.counters.active_channels.load(Ordering::SeqCst)
    }

    /// Most channels ever open at once.
    pub fn peak_channels(&self) -> usize {
        self.shared.counters.peak_channels.load(Ordering::SeqCst)
    }

    /// Script entries not yet played.
    pub async fn remaining(&self) -> usize {
        self.shared.script.read().await.len()
    }

    /// Every header-sync request seen so far.
    pub async fn sync_requests(&self) -> Vec<SyncRequestRecord> {
        self.shared.requests.read().await.clone()
    }

    fn pick_host(&self) -> PeerAddress {
        self.shared
            .hosts
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_else(|| PeerAddress::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8333))
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    type Channel = MemoryChannel;
    type Connector = MemoryConnector;

    async fn fetch_address(&self) -> Result<PeerAddress> {
        let fetches = self
            .shared
            .counters
            .address_fetches
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        if self.shared.stop_after_fetches.get() == Some(&fetches) {
            self.shared.stop_session();
        }

        let plan = match self.shared.script.write().await.pop_front() {
            Some(plan) => plan,
            None => {
                self.shared.stop_session();
                return Err(SyncError::AddressUnavailable("script exhausted".into()));
            }
        };

        if plan == ScriptedAttempt::AddressUnavailable {
            return Err(SyncError::AddressUnavailable("host pool empty".into()));
        }

        *self.shared.pending.write().await = Some(plan);
        Ok(self.pick_host())
    }

    fn create_connector(&self) -> MemoryConnector {
        self.shared
            .counters
            .connectors_created
            .fetch_add(1, Ordering::SeqCst);
        MemoryConnector {
            shared: Arc::clone(&self.shared),
        }
    }

    async fn register_channel(&self, channel: &MemoryChannel) -> Result<ChannelStopReceiver> {
        self.shared
            .counters
            .registrations
            .fetch_add(1, Ordering::SeqCst);

        if channel.plan == ScriptedAttempt::RegistrationFailure {
            return Err(SyncError::ChannelStart("version handshake rejected".into()));
        }

        let (tx, rx) = oneshot::channel();
        *channel
            .stop_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(rx)
    }
}

#[async_trait]
impl ChannelProtocols<MemoryChannel> for MemoryNetwork {
    fn start_ping(&self, _channel: &MemoryChannel) {
        self.shared
            .counters
            .pings_started
            .fetch_add(1, Ordering::SeqCst);
    }

    fn start_address(&self, _channel: &MemoryChannel) {
        self.shared
            .counters
            .address_relays_started
            .fetch_add(1, Ordering::SeqCst);
    }

    async fn sync_headers(
        &self,
        channel: &MemoryChannel,
        request: HeaderSyncRequest<'_>,
    ) -> Result<()> {
        self.shared
            .counters
            .header_syncs
            .fetch_add(1, Ordering::SeqCst);
        self.shared.requests.write().await.push(SyncRequestRecord {
            peer: channel.authority,
            rate_limit: request.rate_limit,
            start_height: request.start_height,
            headers_before: request.headers.len(),
            checkpoints: request.checkpoints.len(),
        });

        match channel.plan {
            ScriptedAttempt::SyncSuccess { headers } => extend_chain(request, headers),
            ScriptedAttempt::StopDuringSync { headers } => {
                self.shared.stop_session();
                extend_chain(request, headers)
            }
            ScriptedAttempt::ServiceStopped => Err(SyncError::ServiceStopped),
            _ => Err(SyncError::HeaderSync("peer sent an unconnected batch".into())),
        }
    }
}

/// Append `count` synthetic headers, checking each against the checkpoints.
fn extend_chain(request: HeaderSyncRequest<'_>, count: usize) -> Result<()> {
    let HeaderSyncRequest {
        headers,
        checkpoints,
        ..
    } = request;

    for _ in 0..count {
        let height = headers.top_height() + 1;
        let hash = synthetic_hash(headers.top(), height);
        if !checkpoints.validate(height, &hash) {
            return Err(SyncError::CheckpointMismatch { height, got: hash });
        }
        headers.push(hash);
    }
    Ok(())
}

/// Deterministic stand-in for the hash of the header at `height`.
pub fn synthetic_hash(parent: &HeaderHash, height: u64) -> HeaderHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"chainsync-synthetic-v0:");
    hasher.update(parent.as_bytes());
    hasher.update(&height.to_le_bytes());
    HeaderHash::from_bytes(*hasher.finalize().as_bytes())
}

/// Connector handed out by [`MemoryNetwork`].
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Channel = MemoryChannel;

    async fn connect(&self, address: &PeerAddress) -> Result<MemoryChannel> {
        let counters = &self.shared.counters;
        counters.connects.fetch_add(1, Ordering::SeqCst);

        let plan = self
            .shared
            .pending
            .write()
            .await
            .take()
            .unwrap_or(ScriptedAttempt::ConnectFailure);
        if plan == ScriptedAttempt::ConnectFailure {
            return Err(SyncError::ConnectFailed(format!("{address} refused connection")));
        }

        let active = counters.active_channels.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_channels.fetch_max(active, Ordering::SeqCst);

        Ok(MemoryChannel {
            authority: *address,
            plan,
            stop_sender: Mutex::new(None),
            shared: Arc::clone(&self.shared),
        })
    }
}

/// An open in-memory channel. Dropping it closes the channel.
pub struct MemoryChannel {
    authority: PeerAddress,
    plan: ScriptedAttempt,
    stop_sender: Mutex<Option<oneshot::Sender<SyncError>>>,
    shared: Arc<Shared>,
}

impl Channel for MemoryChannel {
    fn authority(&self) -> PeerAddress {
        self.authority
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.shared
            .counters
            .active_channels
            .fetch_sub(1, Ordering::SeqCst);
        let sender = self
            .stop_sender
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(SyncError::ChannelStopped);
        }
    }
}

/// An event sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count<F: Fn(&SessionEvent) -> bool>(&self, predicate: F) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &SessionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_core::{Checkpoint, CheckpointSet, HeaderList};

    #[tokio::test]
    async fn test_script_drives_connect_results() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::ConnectFailure,
            ScriptedAttempt::SyncSuccess { headers: 1 },
        ]);
        let connector = network.create_connector();

        let first = network.fetch_address().await.unwrap();
        assert!(connector.connect(&first).await.is_err());

        let second = network.fetch_address().await.unwrap();
        let channel = connector.connect(&second).await.unwrap();
        assert_eq!(channel.authority(), second);
        assert_eq!(network.active_channels(), 1);

        drop(channel);
        assert_eq!(network.active_channels(), 0);
        assert_eq!(network.peak_channels(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_script_stops_bound_session() {
        let network = MemoryNetwork::new(vec![]);
        let mut session = crate::session::SyncSession::new(
            network.clone(),
            network.clone(),
            Checkpoint::new(0, HeaderHash::ZERO),
            vec![],
            Default::default(),
        );
        network.bind_stop(session.stop_handle());

        let err = session.start().await.unwrap_err();
        assert_eq!(err, SyncError::ChannelStopped);
        assert_eq!(network.stats().address_fetches, 1);
        assert_eq!(network.stats().connects, 0);
    }

    #[tokio::test]
    async fn test_dropping_registered_channel_signals_stop() {
        let network = MemoryNetwork::new(vec![ScriptedAttempt::SyncSuccess { headers: 1 }]);
        let connector = network.create_connector();
        let address = network.fetch_address().await.unwrap();
        let channel = connector.connect(&address).await.unwrap();

        let stopped = network.register_channel(&channel).await.unwrap();
        drop(channel);

        assert_eq!(stopped.await.unwrap(), SyncError::ChannelStopped);
    }

    #[tokio::test]
    async fn test_extend_chain_is_deterministic() {
        let seed = Checkpoint::new(10, HeaderHash::from_bytes([7; 32]));
        let checkpoints = CheckpointSet::default();

        let mut a = HeaderList::new(&seed);
        let mut b = HeaderList::new(&seed);
        for list in [&mut a, &mut b] {
            let request = HeaderSyncRequest {
                rate_limit: 1,
                start_height: 10,
                headers: list,
                checkpoints: &checkpoints,
            };
            extend_chain(request, 4).unwrap();
        }

        assert_eq!(a, b);
        assert_eq!(a.top_height(), 14);
        assert_eq!(a.get(11), Some(&synthetic_hash(seed.hash(), 11)));
    }

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();
        sink.record(&SessionEvent::Suspended);
        sink.record(&SessionEvent::ServiceStopped);
        sink.record(&SessionEvent::Suspended);

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.count(|e| *e == SessionEvent::Suspended), 2);
    }
}
