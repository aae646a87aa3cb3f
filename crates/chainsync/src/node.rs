//! Header synchronization run sequence.
//!
//! [`HeaderSyncNode`] reads the local chain top, seeds a [`SyncSession`]
//! with it and reports what the session gathered. The node can be stopped
//! from any task; the node's stop flag is the session's shutdown signal, so
//! stopping also ends a session in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chainsync_core::{Checkpoint, HeaderHash};
use chainsync_session::{
    ChannelProtocols, EventSink, Network, StopHandle, SyncSession, TracingSink,
};

use crate::chain::ChainSource;
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};

type SessionHook = Box<dyn Fn(&StopHandle) + Send + Sync>;

/// Outcome of a completed header synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSyncReport {
    /// Height of the local top the run started from.
    pub start_height: u64,
    /// Hash of the local top the run started from.
    pub start_hash: HeaderHash,
    /// Height of the last accepted header.
    pub end_height: u64,
    /// Headers gathered above the start height, in height order.
    pub new_headers: Vec<HeaderHash>,
    /// Successful peer syncs counted.
    pub votes: usize,
    /// Connection attempts made.
    pub attempts: u64,
}

impl HeaderSyncReport {
    /// True if no peer had headers above the local top.
    pub fn is_empty(&self) -> bool {
        self.new_headers.is_empty()
    }

    /// The start checkpoint followed by the new headers, as checkpoints.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        std::iter::once(&self.start_hash)
            .chain(self.new_headers.iter())
            .zip(self.start_height..)
            .map(|(hash, height)| Checkpoint::new(height, *hash))
            .collect()
    }
}

/// Runs header sync sessions against the local chain.
pub struct HeaderSyncNode<C, N, P> {
    chain: C,
    network: N,
    protocols: P,
    config: NodeConfig,
    stopped: Arc<AtomicBool>,
    events: Arc<dyn EventSink>,
    on_session: Option<SessionHook>,
}

impl<C, N, P> HeaderSyncNode<C, N, P>
where
    C: ChainSource,
    N: Network + Clone,
    P: ChannelProtocols<N::Channel> + Clone,
{
    /// Create a node. Fails if `config` does not validate.
    pub fn new(chain: C, network: N, protocols: P, config: NodeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chain,
            network,
            protocols,
            config,
            stopped: Arc::new(AtomicBool::new(false)),
            events: Arc::new(TracingSink),
            on_session: None,
        })
    }

    /// Route session events to `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Call `hook` with the stop handle of every session this node creates.
    pub fn on_session_start(mut self, hook: impl Fn(&StopHandle) + Send + Sync + 'static) -> Self {
        self.on_session = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the node and any session it is running.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Synchronize headers from the local chain top up to a peer quorum.
    ///
    /// Returns [`NodeError::ServiceStopped`] if the node is stopped before,
    /// during or immediately after the run.
    pub async fn synchronize(&self) -> Result<HeaderSyncReport> {
        self.ensure_running()?;

        let top = self.chain.top_checkpoint().await.map_err(|error| {
            tracing::error!("Failure fetching blockchain start header: {}", error);
            error
        })?;

        self.ensure_running()?;

        let mut session = SyncSession::new(
            self.network.clone(),
            self.protocols.clone(),
            top,
            self.config.checkpoints.clone(),
            self.config.session_config(),
        )
        .with_event_sink(Arc::clone(&self.events))
        .with_shutdown_signal(Arc::clone(&self.stopped));

        if let Some(hook) = &self.on_session {
            hook(&session.stop_handle());
        }
        let outcome = session.start().await;

        self.ensure_running()?;

        if let Err(error) = outcome {
            if error.is_shutdown() {
                tracing::info!("Header synchronization stopped: {}", error);
            } else {
                tracing::error!("Failure synchronizing headers: {}", error);
            }
            return Err(error.into());
        }

        let headers = session.headers();
        let report = HeaderSyncReport {
            start_height: headers.start_height(),
            start_hash: *headers.seed(),
            end_height: headers.top_height(),
            new_headers: headers.new_headers().to_vec(),
            votes: session.votes(),
            attempts: session.attempts(),
        };

        tracing::info!(
            "Completed header synchronization [{}-{}]",
            report.start_height,
            report.end_height
        );
        Ok(report)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(NodeError::ServiceStopped);
        }
        Ok(())
    }
}
