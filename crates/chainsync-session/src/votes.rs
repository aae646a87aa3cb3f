//! Quorum vote accounting.

use crate::error::{Result, SyncError};

/// What the session does after an attempt completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    /// Connect to another peer.
    Retry,
    /// Quorum reached; header sync is complete.
    Complete,
    /// The service is stopping; end the session.
    Shutdown,
}

/// Counts successful header syncs against a quorum target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumVotes {
    votes: usize,
    quorum: usize,
}

impl QuorumVotes {
    pub fn new(quorum: usize) -> Self {
        Self { votes: 0, quorum }
    }

    pub fn votes(&self) -> usize {
        self.votes
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Clear the count for a new session run.
    pub fn reset(&mut self) {
        self.votes = 0;
    }

    /// Whether enough votes have been recorded.
    ///
    /// At least one vote is always required, so a quorum of zero behaves
    /// like a quorum of one.
    pub fn is_reached(&self) -> bool {
        self.votes > 0 && self.votes >= self.quorum
    }

    /// Interpret one attempt's terminal result.
    ///
    /// A success is counted before quorum is checked. Failures never
    /// remove votes.
    pub fn record(&mut self, result: &Result<()>) -> VoteDecision {
        match result {
            Err(SyncError::ServiceStopped) => VoteDecision::Shutdown,
            Err(_) => VoteDecision::Retry,
            Ok(()) => {
                self.votes += 1;
                if self.is_reached() {
                    VoteDecision::Complete
                } else {
                    VoteDecision::Retry
                }
            }
        }
    }
}
