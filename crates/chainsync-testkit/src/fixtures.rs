//! Test fixtures and helpers.
//!
//! Common setup code for session tests.

use std::sync::Arc;

use chainsync_core::{Checkpoint, HeaderHash};
use chainsync_session::memory::{MemoryNetwork, RecordingSink, ScriptedAttempt};
use chainsync_session::{Result, SessionConfig, SyncError, SyncSession};

/// A session wired to a scripted in-memory network.
pub struct SessionFixture {
    pub network: MemoryNetwork,
    pub sink: Arc<RecordingSink>,
    pub session: SyncSession<MemoryNetwork, MemoryNetwork>,
}

impl SessionFixture {
    /// Create a fixture seeded at genesis with no checkpoints.
    pub fn new(script: Vec<ScriptedAttempt>, quorum: usize) -> Self {
        Self::with_start(script, quorum, Checkpoint::new(0, HeaderHash::ZERO), vec![])
    }

    /// Create a fixture seeded at `start`.
    pub fn with_start(
        script: Vec<ScriptedAttempt>,
        quorum: usize,
        start: Checkpoint,
        checkpoints: Vec<Checkpoint>,
    ) -> Self {
        let network = MemoryNetwork::new(script);
        let sink = Arc::new(RecordingSink::new());
        let config = SessionConfig {
            quorum,
            ..SessionConfig::default()
        };
        let session = SyncSession::new(network.clone(), network.clone(), start, checkpoints, config)
            .with_event_sink(sink.clone());
        network.bind_stop(session.stop_handle());

        Self {
            network,
            sink,
            session,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.session.start().await
    }

    /// Run the session on a fresh current-thread runtime.
    pub fn run_blocking(&mut self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| SyncError::OperationFailed(e.to_string()))?;
        runtime.block_on(self.session.start())
    }
}

/// What a scripted session run must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedOutcome {
    pub result: Result<()>,
    pub votes: usize,
    pub new_headers: usize,
    pub attempts: u64,
}

/// Replay `script` against the session rules without running a session.
pub fn expected_outcome(script: &[ScriptedAttempt], quorum: usize) -> ExpectedOutcome {
    let quorum = quorum.max(1);
    let mut votes = 0;
    let mut new_headers = 0;
    let mut attempts = 0;

    let finish = |result, votes, new_headers, attempts| ExpectedOutcome {
        result,
        votes,
        new_headers,
        attempts,
    };

    for plan in script {
        attempts += 1;
        match *plan {
            ScriptedAttempt::AddressUnavailable
            | ScriptedAttempt::ConnectFailure
            | ScriptedAttempt::RegistrationFailure
            | ScriptedAttempt::SyncFailure => {}
            ScriptedAttempt::ServiceStopped => {
                return finish(Err(SyncError::ServiceStopped), votes, new_headers, attempts);
            }
            ScriptedAttempt::SyncSuccess { headers } => {
                votes += 1;
                new_headers += headers;
                if votes >= quorum {
                    return finish(Ok(()), votes, new_headers, attempts);
                }
            }
            ScriptedAttempt::StopDuringSync { headers } => {
                votes += 1;
                new_headers += headers;
                let result = if votes >= quorum {
                    Ok(())
                } else {
                    Err(SyncError::ChannelStopped)
                };
                return finish(result, votes, new_headers, attempts);
            }
        }
    }

    // The fetch that finds the script empty stops the session.
    finish(Err(SyncError::ChannelStopped), votes, new_headers, attempts + 1)
}
