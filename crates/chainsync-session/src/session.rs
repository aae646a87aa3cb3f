//! The header-sync session.
//!
//! A session connects to one peer at a time, runs header sync on it and
//! counts the peers that succeed. It finishes once `quorum` peers have
//! synced, or when it is stopped. Connection and sync failures are retried
//! without limit; the surrounding node bounds the phase by stopping the
//! session.
//!
//! ```text
//! Idle -> Running -> RetryingConnection <-> AwaitingHeaderSync
//!                        |                        |
//!                        +--> Completed(Stopped)  +--> Completed(Synchronized)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chainsync_core::{Checkpoint, CheckpointSet, HeaderList, PeerAddress};

use crate::error::{Result, SyncError};
use crate::events::{EventSink, SessionEvent, TracingSink};
use crate::network::{
    Channel, ChannelProtocols, ChannelStopReceiver, Connector, HeaderSyncRequest, Network,
};
use crate::votes::{QuorumVotes, VoteDecision};

/// Default number of peers that must complete header sync.
pub const DEFAULT_QUORUM: usize = 8;

/// Default header request rate handed to the header-sync protocol.
pub const DEFAULT_HEADERS_PER_SECOND: u32 = 10_000;

/// Configuration for a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Successful peer syncs required to finish.
    pub quorum: usize,
    /// Header request rate limit passed to each header-sync run.
    pub headers_per_second: u32,
    /// Pause after a failed attempt. Zero retries immediately.
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quorum: DEFAULT_QUORUM,
            headers_per_second: DEFAULT_HEADERS_PER_SECOND,
            retry_delay: Duration::ZERO,
        }
    }
}

/// How a session run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Quorum reached.
    Synchronized,
    /// Stopped, either by the owner or by service shutdown.
    Stopped,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    RetryingConnection,
    AwaitingHeaderSync,
    Completed(Completion),
}

/// Shared stop flag for a session.
///
/// Handles are cheap to clone and may be used from any task while the
/// session runs. Stopping does not abort in-flight operations; the session
/// notices at its next re-entry point.
///
/// A session may also watch a service-wide shutdown signal. Starting the
/// session re-arms its own flag but never clears the shutdown signal.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(true)),
            shutdown: None,
        }
    }

    /// Request the session to stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True once the session or the service it belongs to is stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
            || self
                .shutdown
                .as_ref()
                .is_some_and(|shutdown| shutdown.load(Ordering::SeqCst))
    }

    fn is_armed(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    fn arm(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

/// Result of one pass through the connection loop.
enum Attempt {
    /// No channel was established.
    Unreachable,
    /// A channel ran to completion with this result.
    Finished(Result<()>),
}

/// Header-sync session state.
pub struct SyncSession<N, P>
where
    N: Network,
    P: ChannelProtocols<N::Channel>,
{
    /// Discovery, connection and registration.
    network: N,
    /// Per-channel protocols.
    protocols: P,
    /// Configuration.
    config: SessionConfig,
    /// Sorted checkpoints.
    checkpoints: CheckpointSet,
    /// Accumulated headers, seeded with the start checkpoint.
    headers: HeaderList,
    /// Vote counter.
    votes: QuorumVotes,
    /// Lifecycle state.
    state: SessionState,
    /// Connection attempts in the current run.
    attempts: u64,
    /// Stop flag shared with handles.
    stop: StopHandle,
    /// Observability sink.
    events: Arc<dyn EventSink>,
}

impl<N, P> SyncSession<N, P>
where
    N: Network,
    P: ChannelProtocols<N::Channel>,
{
    /// Create a session anchored at `start`.
    ///
    /// The checkpoint list is sorted here; configuration order is not
    /// trusted.
    pub fn new(
        network: N,
        protocols: P,
        start: Checkpoint,
        checkpoints: Vec<Checkpoint>,
        config: SessionConfig,
    ) -> Self {
        Self {
            network,
            protocols,
            votes: QuorumVotes::new(config.quorum),
            config,
            checkpoints: CheckpointSet::sorted(checkpoints),
            headers: HeaderList::new(&start),
            state: SessionState::Idle,
            attempts: 0,
            stop: StopHandle::new(),
            events: Arc::new(TracingSink),
        }
    }

    /// Route events to `sink` instead of `tracing`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Treat `signal` being set as a stop request.
    ///
    /// Handles taken before this call can still stop the session but do not
    /// report the signal from [`StopHandle::is_stopped`].
    pub fn with_shutdown_signal(mut self, signal: Arc<AtomicBool>) -> Self {
        self.stop.shutdown = Some(signal);
        self
    }

    /// A handle that can stop this session from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn votes(&self) -> usize {
        self.votes.votes()
    }

    pub fn quorum(&self) -> usize {
        self.votes.quorum()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn start_height(&self) -> u64 {
        self.headers.start_height()
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn checkpoints(&self) -> &CheckpointSet {
        &self.checkpoints
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the session until quorum is reached or it is stopped.
    ///
    /// Returns `Ok(())` on quorum, [`SyncError::ChannelStopped`] when
    /// stopped, and [`SyncError::ServiceStopped`] when the service shuts
    /// down. Fails with [`SyncError::OperationFailed`], changing nothing,
    /// while the session is running or completed; a completed session must
    /// be [`stop`](Self::stop)ped before it can start again.
    pub async fn start(&mut self) -> Result<()> {
        if self.stop.is_armed() || matches!(self.state, SessionState::Completed(_)) {
            return Err(SyncError::OperationFailed(
                "header sync session already started".into(),
            ));
        }

        self.votes.reset();
        self.attempts = 0;
        self.stop.arm();
        self.state = SessionState::Running;
        self.events.record(&SessionEvent::Started {
            quorum: self.votes.quorum(),
            start_height: self.headers.start_height(),
        });

        let connector = self.network.create_connector();
        let outcome = self.run(&connector).await;

        self.stop.stop();
        self.state = SessionState::Completed(match outcome {
            Ok(()) => Completion::Synchronized,
            Err(_) => Completion::Stopped,
        });
        outcome
    }

    /// Stop the session.
    ///
    /// A running session finishes its in-flight operation and then ends with
    /// [`SyncError::ChannelStopped`]. A completed session returns to idle.
    pub fn stop(&mut self) {
        self.stop.stop();
        if matches!(self.state, SessionState::Completed(_)) {
            self.state = SessionState::Idle;
        }
    }

    async fn run(&mut self, connector: &N::Connector) -> Result<()> {
        loop {
            let result = match self.attempt(connector).await? {
                Attempt::Unreachable => {
                    self.pause().await;
                    continue;
                }
                Attempt::Finished(result) => result,
            };

            match self.votes.record(&result) {
                VoteDecision::Shutdown => {
                    self.events.record(&SessionEvent::ServiceStopped);
                    return Err(SyncError::ServiceStopped);
                }
                VoteDecision::Complete => {
                    self.events.record(&SessionEvent::VoteRecorded {
                        votes: self.votes.votes(),
                        quorum: self.votes.quorum(),
                    });
                    self.events.record(&SessionEvent::Completed {
                        votes: self.votes.votes(),
                        top_height: self.headers.top_height(),
                    });
                    return Ok(());
                }
                VoteDecision::Retry if result.is_ok() => {
                    self.events.record(&SessionEvent::VoteRecorded {
                        votes: self.votes.votes(),
                        quorum: self.votes.quorum(),
                    });
                }
                VoteDecision::Retry => self.pause().await,
            }
        }
    }

    /// One connection attempt: fetch an address, connect, run the channel.
    ///
    /// The channel is dropped before this returns, so attempts never
    /// overlap.
    async fn attempt(&mut self, connector: &N::Connector) -> Result<Attempt> {
        self.check_stopped()?;

        self.attempts += 1;
        let attempt = self.attempts;
        self.state = SessionState::RetryingConnection;
        self.events.record(&SessionEvent::AttemptStarted { attempt });

        let address = match self.network.fetch_address().await {
            Ok(address) => address,
            Err(error) => {
                self.events
                    .record(&SessionEvent::AddressFetchFailed { attempt, error });
                return Ok(Attempt::Unreachable);
            }
        };

        self.check_stopped()?;
        self.events.record(&SessionEvent::Contacting {
            attempt,
            peer: address,
        });

        let channel = match connector.connect(&address).await {
            Ok(channel) => channel,
            Err(error) => {
                self.events.record(&SessionEvent::ConnectFailed {
                    attempt,
                    peer: address,
                    error,
                });
                return Ok(Attempt::Unreachable);
            }
        };

        self.events.record(&SessionEvent::Connected {
            attempt,
            peer: channel.authority(),
        });

        Ok(Attempt::Finished(self.bind_channel(&channel).await))
    }

    /// Register the channel, attach protocols and run header sync.
    ///
    /// A registration failure is reported like a failed sync.
    async fn bind_channel(&mut self, channel: &N::Channel) -> Result<()> {
        let peer = channel.authority();

        let stopped = match self.network.register_channel(channel).await {
            Ok(stopped) => stopped,
            Err(error) => {
                self.events.record(&SessionEvent::ChannelStartFailed {
                    peer,
                    error: error.clone(),
                });
                return Err(error);
            }
        };
        self.watch_channel(peer, stopped);

        self.protocols.start_ping(channel);
        self.protocols.start_address(channel);

        self.state = SessionState::AwaitingHeaderSync;
        let request = HeaderSyncRequest {
            rate_limit: self.config.headers_per_second,
            start_height: self.headers.start_height(),
            headers: &mut self.headers,
            checkpoints: &self.checkpoints,
        };
        let result = self.protocols.sync_headers(channel, request).await;

        match &result {
            Ok(()) => self.events.record(&SessionEvent::HeaderSyncCompleted {
                peer,
                top_height: self.headers.top_height(),
            }),
            Err(error) => self.events.record(&SessionEvent::HeaderSyncFailed {
                peer,
                error: error.clone(),
            }),
        }
        result
    }

    /// Report the channel's eventual close. Touches no session state.
    fn watch_channel(&self, peer: PeerAddress, stopped: ChannelStopReceiver) {
        let events = Arc::clone(&self.events);
        tokio::spawn(async move {
            let reason = stopped.await.unwrap_or(SyncError::ChannelStopped);
            events.record(&SessionEvent::ChannelStopped { peer, reason });
        });
    }

    fn check_stopped(&self) -> Result<()> {
        if self.stop.is_stopped() {
            self.events.record(&SessionEvent::Suspended);
            return Err(SyncError::ChannelStopped);
        }
        Ok(())
    }

    /// Suspend before the next attempt. Always yields to the scheduler, so
    /// collaborators that fail without suspending cannot starve stop
    /// requests from tasks on the same runtime.
    async fn pause(&self) {
        if self.config.retry_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        MemoryChannel, MemoryConnector, MemoryNetwork, RecordingSink, ScriptedAttempt,
    };
    use async_trait::async_trait;
    use chainsync_core::HeaderHash;

    /// Discovery that fails without ever suspending.
    struct EmptyPool(MemoryNetwork);

    #[async_trait]
    impl Network for EmptyPool {
        type Channel = MemoryChannel;
        type Connector = MemoryConnector;

        async fn fetch_address(&self) -> Result<PeerAddress> {
            Err(SyncError::AddressUnavailable("no hosts".into()))
        }

        fn create_connector(&self) -> MemoryConnector {
            self.0.create_connector()
        }

        async fn register_channel(&self, channel: &MemoryChannel) -> Result<ChannelStopReceiver> {
            self.0.register_channel(channel).await
        }
    }

    fn seed() -> Checkpoint {
        Checkpoint::new(1000, HeaderHash::from_bytes([0x5e; 32]))
    }

    fn session(
        network: &MemoryNetwork,
        quorum: usize,
    ) -> (SyncSession<MemoryNetwork, MemoryNetwork>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let config = SessionConfig {
            quorum,
            ..SessionConfig::default()
        };
        let session = SyncSession::new(network.clone(), network.clone(), seed(), vec![], config)
            .with_event_sink(sink.clone());
        network.bind_stop(session.stop_handle());
        (session, sink)
    }

    #[tokio::test]
    async fn test_quorum_after_mixed_results() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::SyncFailure,
            ScriptedAttempt::SyncSuccess { headers: 10 },
            ScriptedAttempt::SyncFailure,
            ScriptedAttempt::SyncSuccess { headers: 5 },
            ScriptedAttempt::SyncSuccess { headers: 0 },
        ]);
        let (mut session, sink) = session(&network, 3);

        session.start().await.unwrap();

        let stats = network.stats();
        assert_eq!(stats.connects, 5);
        assert_eq!(stats.header_syncs, 5);
        assert_eq!(session.attempts(), 5);
        assert_eq!(session.votes(), 3);
        assert_eq!(session.headers().len(), 16);
        assert_eq!(session.headers().as_slice()[0], *seed().hash());
        assert_eq!(session.state(), SessionState::Completed(Completion::Synchronized));
        assert!(session.is_stopped());
        assert_eq!(network.peak_channels(), 1);
        assert_eq!(sink.count(|e| matches!(e, SessionEvent::Completed { .. })), 1);
    }

    #[tokio::test]
    async fn test_quorum_zero_and_one_finish_on_first_success() {
        for quorum in [0, 1] {
            let network = MemoryNetwork::new(vec![
                ScriptedAttempt::ConnectFailure,
                ScriptedAttempt::SyncSuccess { headers: 3 },
                ScriptedAttempt::SyncSuccess { headers: 3 },
            ]);
            let (mut session, _) = session(&network, quorum);

            session.start().await.unwrap();
            assert_eq!(session.votes(), 1);
            assert_eq!(network.stats().header_syncs, 1);
            assert_eq!(network.remaining().await, 1);
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::AddressUnavailable,
            ScriptedAttempt::ConnectFailure,
            ScriptedAttempt::RegistrationFailure,
            ScriptedAttempt::SyncFailure,
            ScriptedAttempt::SyncSuccess { headers: 1 },
        ]);
        let (mut session, sink) = session(&network, 1);

        session.start().await.unwrap();

        let stats = network.stats();
        assert_eq!(stats.address_fetches, 5);
        assert_eq!(stats.connects, 4);
        assert_eq!(stats.registrations, 3);
        assert_eq!(stats.header_syncs, 2);
        assert_eq!(stats.connectors_created, 1);
        assert_eq!(session.attempts(), 5);
        assert_eq!(sink.count(|e| matches!(e, SessionEvent::AddressFetchFailed { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, SessionEvent::ConnectFailed { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, SessionEvent::ChannelStartFailed { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, SessionEvent::Connected { .. })), 3);
    }

    #[tokio::test]
    async fn test_registration_failure_does_not_start_protocols() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::RegistrationFailure,
            ScriptedAttempt::SyncSuccess { headers: 1 },
        ]);
        let (mut session, _) = session(&network, 1);

        session.start().await.unwrap();

        let stats = network.stats();
        assert_eq!(stats.pings_started, 1);
        assert_eq!(stats.address_relays_started, 1);
    }

    #[tokio::test]
    async fn test_service_stopped_ends_session() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::SyncSuccess { headers: 2 },
            ScriptedAttempt::ServiceStopped,
            ScriptedAttempt::SyncSuccess { headers: 2 },
        ]);
        let (mut session, sink) = session(&network, 3);

        let err = session.start().await.unwrap_err();
        assert_eq!(err, SyncError::ServiceStopped);
        assert_eq!(session.votes(), 1);
        assert_eq!(network.stats().connects, 2);
        assert_eq!(session.state(), SessionState::Completed(Completion::Stopped));
        assert!(session.is_stopped());
        assert_eq!(sink.count(|e| *e == SessionEvent::ServiceStopped), 1);
    }

    #[tokio::test]
    async fn test_stop_from_task_ends_immediate_retry_loop() {
        let network = MemoryNetwork::new(vec![]);
        let config = SessionConfig {
            quorum: 1,
            ..SessionConfig::default()
        };
        let mut session =
            SyncSession::new(EmptyPool(network.clone()), network, seed(), vec![], config);
        let handle = session.stop_handle();

        // Runs only once the session yields on this single-threaded runtime.
        let stopper = tokio::spawn(async move { handle.stop() });

        let err = session.start().await.unwrap_err();
        stopper.await.unwrap();

        assert_eq!(err, SyncError::ChannelStopped);
        assert!(session.attempts() >= 1);
        assert_eq!(session.votes(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal_survives_start() {
        let network = MemoryNetwork::new(vec![ScriptedAttempt::SyncSuccess { headers: 1 }]);
        let shutdown = Arc::new(AtomicBool::new(true));
        let (session, _) = session(&network, 1);
        let mut session = session.with_shutdown_signal(Arc::clone(&shutdown));

        let err = session.start().await.unwrap_err();

        assert_eq!(err, SyncError::ChannelStopped);
        assert_eq!(session.attempts(), 0);
        assert_eq!(network.stats().address_fetches, 0);
        assert_eq!(network.remaining().await, 1);
    }

    #[tokio::test]
    async fn test_stop_during_sync_suspends_at_next_attempt() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::StopDuringSync { headers: 4 },
            ScriptedAttempt::SyncSuccess { headers: 4 },
        ]);
        let (mut session, sink) = session(&network, 2);

        let err = session.start().await.unwrap_err();
        assert_eq!(err, SyncError::ChannelStopped);
        assert_eq!(session.votes(), 1);
        assert_eq!(network.stats().connects, 1);
        assert_eq!(network.remaining().await, 1);
        assert_eq!(sink.count(|e| *e == SessionEvent::Suspended), 1);
    }

    #[tokio::test]
    async fn test_stop_before_first_attempt_resolves() {
        let network = MemoryNetwork::new(vec![ScriptedAttempt::ConnectFailure; 3]);
        network.stop_after_fetches(1);
        let (mut session, _) = session(&network, 1);

        let err = session.start().await.unwrap_err();
        assert_eq!(err, SyncError::ChannelStopped);
        assert_eq!(network.stats().address_fetches, 1);
        assert_eq!(network.stats().connects, 0);
        assert_eq!(session.votes(), 0);
    }

    #[tokio::test]
    async fn test_start_while_completed_fails_without_reset() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::SyncSuccess { headers: 1 },
            ScriptedAttempt::SyncSuccess { headers: 1 },
        ]);
        let (mut session, _) = session(&network, 1);

        session.start().await.unwrap();
        assert_eq!(session.votes(), 1);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, SyncError::OperationFailed(_)));
        assert_eq!(session.votes(), 1);
        assert_eq!(network.stats().connects, 1);

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);

        session.start().await.unwrap();
        assert_eq!(session.votes(), 1);
        assert_eq!(session.headers().len(), 3);
        assert_eq!(network.stats().connectors_created, 2);
    }

    #[tokio::test]
    async fn test_header_sync_receives_session_state() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::SyncSuccess { headers: 2 },
            ScriptedAttempt::SyncSuccess { headers: 3 },
        ]);
        let checkpoints = vec![
            Checkpoint::new(2000, HeaderHash::from_bytes([2; 32])),
            Checkpoint::new(500, HeaderHash::from_bytes([1; 32])),
        ];
        let config = SessionConfig {
            quorum: 2,
            headers_per_second: 250,
            retry_delay: Duration::ZERO,
        };
        let mut session =
            SyncSession::new(network.clone(), network.clone(), seed(), checkpoints, config);
        network.bind_stop(session.stop_handle());

        assert!(session.checkpoints().is_sorted());
        session.start().await.unwrap();

        let requests = network.sync_requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.rate_limit == 250));
        assert!(requests.iter().all(|r| r.start_height == 1000));
        assert!(requests.iter().all(|r| r.checkpoints == 2));
        assert_eq!(requests[0].headers_before, 1);
        assert_eq!(requests[1].headers_before, 3);
        assert_eq!(session.headers().top_height(), 1005);
    }

    #[tokio::test]
    async fn test_checkpoint_conflict_is_a_failed_attempt() {
        let network = MemoryNetwork::new(vec![ScriptedAttempt::SyncSuccess { headers: 3 }]);
        let bogus = Checkpoint::new(1002, HeaderHash::from_bytes([0xee; 32]));
        let mut session = SyncSession::new(
            network.clone(),
            network.clone(),
            seed(),
            vec![bogus],
            SessionConfig {
                quorum: 1,
                ..SessionConfig::default()
            },
        );
        network.bind_stop(session.stop_handle());

        let err = session.start().await.unwrap_err();
        assert_eq!(err, SyncError::ChannelStopped);
        assert_eq!(session.votes(), 0);
        assert_eq!(session.headers().top_height(), 1001);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_applies_after_failures() {
        let network = MemoryNetwork::new(vec![
            ScriptedAttempt::ConnectFailure,
            ScriptedAttempt::SyncFailure,
            ScriptedAttempt::SyncSuccess { headers: 1 },
        ]);
        let config = SessionConfig {
            quorum: 1,
            retry_delay: Duration::from_secs(5),
            ..SessionConfig::default()
        };
        let mut session =
            SyncSession::new(network.clone(), network.clone(), seed(), vec![], config);
        network.bind_stop(session.stop_handle());

        let started = tokio::time::Instant::now();
        session.start().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_stop_handle_stops_idle_flag() {
        let network = MemoryNetwork::new(vec![]);
        let (session, _) = session(&network, 1);
        let handle = session.stop_handle();

        assert!(session.is_stopped());
        assert_eq!(session.state(), SessionState::Idle);
        handle.stop();
        assert!(handle.is_stopped());
    }
}
