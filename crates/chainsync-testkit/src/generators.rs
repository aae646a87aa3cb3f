//! Proptest generators for property-based testing.

use proptest::prelude::*;

use chainsync_core::{Checkpoint, HeaderHash};
use chainsync_session::memory::ScriptedAttempt;

/// Generate a random HeaderHash.
pub fn header_hash() -> impl Strategy<Value = HeaderHash> {
    any::<[u8; 32]>().prop_map(HeaderHash::from_bytes)
}

/// Generate a checkpoint below height one million.
pub fn checkpoint() -> impl Strategy<Value = Checkpoint> {
    (0u64..1_000_000, header_hash()).prop_map(|(height, hash)| Checkpoint::new(height, hash))
}

/// Generate an unordered checkpoint list, possibly with repeated heights.
pub fn checkpoint_list(max_len: usize) -> impl Strategy<Value = Vec<Checkpoint>> {
    let list = prop::collection::vec(checkpoint(), 0..=max_len);
    let dupes = prop::collection::vec(any::<prop::sample::Index>(), 0..=max_len);

    // Copy heights between entries so duplicate handling is exercised.
    (list, dupes).prop_map(|(mut list, dupes)| {
        if list.is_empty() {
            return list;
        }
        for (slot, index) in dupes.iter().enumerate() {
            let height = list[index.index(list.len())].height();
            let target = slot % list.len();
            list[target] = Checkpoint::new(height, *list[target].hash());
        }
        list
    })
}

/// A connection attempt that can fail or succeed but never shuts down.
pub fn transient_attempt() -> impl Strategy<Value = ScriptedAttempt> {
    prop_oneof![
        Just(ScriptedAttempt::AddressUnavailable),
        Just(ScriptedAttempt::ConnectFailure),
        Just(ScriptedAttempt::RegistrationFailure),
        Just(ScriptedAttempt::SyncFailure),
        (0usize..8).prop_map(|headers| ScriptedAttempt::SyncSuccess { headers }),
    ]
}

/// Any connection attempt, shutdown outcomes included.
pub fn scripted_attempt() -> impl Strategy<Value = ScriptedAttempt> {
    prop_oneof![
        8 => transient_attempt(),
        1 => Just(ScriptedAttempt::ServiceStopped),
        1 => (0usize..8).prop_map(|headers| ScriptedAttempt::StopDuringSync { headers }),
    ]
}

/// Generate a script of transient attempts.
pub fn script(max_len: usize) -> impl Strategy<Value = Vec<ScriptedAttempt>> {
    prop::collection::vec(transient_attempt(), 0..=max_len)
}

/// Parameters for a scripted session run.
#[derive(Debug, Clone)]
pub struct ScriptParams {
    pub quorum: usize,
    pub script: Vec<ScriptedAttempt>,
}

impl Arbitrary for ScriptParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (0usize..6, prop::collection::vec(scripted_attempt(), 0..24))
            .prop_map(|(quorum, script)| ScriptParams { quorum, script })
            .boxed()
    }
}
