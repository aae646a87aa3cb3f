//! # Chainsync Testkit
//!
//! Testing utilities for chainsync.
//!
//! - **Generators**: proptest strategies for hashes, checkpoints and
//!   scripted peer behavior
//! - **Fixtures**: a session wired to an in-memory network and a recording
//!   event sink
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use chainsync_testkit::generators::checkpoint_list;
//! use chainsync_core::CheckpointSet;
//!
//! proptest! {
//!     #[test]
//!     fn sorted_checkpoints_stay_sorted(list in checkpoint_list(32)) {
//!         prop_assert!(CheckpointSet::sorted(list).is_sorted());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use chainsync_session::memory::ScriptedAttempt;
//! use chainsync_testkit::SessionFixture;
//!
//! let mut fixture = SessionFixture::new(vec![ScriptedAttempt::SyncSuccess { headers: 3 }], 1);
//! let outcome = fixture.run_blocking();
//! assert!(outcome.is_ok());
//! assert_eq!(fixture.session.headers().len(), 4);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{expected_outcome, ExpectedOutcome, SessionFixture};
pub use generators::ScriptParams;
