//! Checkpoints: trusted `(height, hash)` anchors in the header chain.
//!
//! A checkpoint set pins the hash expected at selected heights. Header sync
//! implementations consult it to reject peers that serve a divergent chain
//! below the last checkpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::hash::HeaderHash;

/// A trusted anchor point in the chain.
///
/// The textual form is `<hash>:<height>`, the format used by node
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checkpoint {
    height: u64,
    hash: HeaderHash,
}

impl Checkpoint {
    /// Create a checkpoint.
    pub const fn new(height: u64, hash: HeaderHash) -> Self {
        Self { height, hash }
    }

    /// Height of the anchored header.
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Hash of the anchored header.
    pub const fn hash(&self) -> &HeaderHash {
        &self.hash
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.height)
    }
}

impl FromStr for Checkpoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, height) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidCheckpoint(format!("{s}: expected <hash>:<height>")))?;
        let hash = HeaderHash::from_hex(hash)?;
        let height = height
            .parse::<u64>()
            .map_err(|e| CoreError::InvalidCheckpoint(format!("{s}: {e}")))?;
        Ok(Self { height, hash })
    }
}

impl TryFrom<String> for Checkpoint {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Checkpoint> for String {
    fn from(checkpoint: Checkpoint) -> Self {
        checkpoint.to_string()
    }
}

/// An ordered collection of checkpoints.
///
/// Configuration may list checkpoints in any order, so owners call
/// [`CheckpointSet::sort`] once after construction. Lookups assume the set
/// is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointSet(Vec<Checkpoint>);

impl CheckpointSet {
    /// Wrap a caller-supplied list without reordering it.
    pub fn new(checkpoints: Vec<Checkpoint>) -> Self {
        Self(checkpoints)
    }

    /// Wrap and sort in one step.
    pub fn sorted(checkpoints: Vec<Checkpoint>) -> Self {
        let mut set = Self(checkpoints);
        set.sort();
        set
    }

    /// Establish ascending height order in place.
    ///
    /// When two entries share a height the first one supplied is kept.
    pub fn sort(&mut self) {
        self.0.sort_by_key(Checkpoint::height);
        self.0.dedup_by_key(|checkpoint| checkpoint.height());
    }

    /// Whether heights are strictly ascending.
    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|pair| pair[0].height() < pair[1].height())
    }

    /// The checkpoint at `height`, if any.
    pub fn get(&self, height: u64) -> Option<&Checkpoint> {
        self.0
            .binary_search_by_key(&height, Checkpoint::height)
            .ok()
            .map(|index| &self.0[index])
    }

    /// Whether any checkpoint anchors `hash`.
    pub fn contains_hash(&self, hash: &HeaderHash) -> bool {
        self.0.iter().any(|checkpoint| checkpoint.hash() == hash)
    }

    /// Check a header against the checkpoint at its height.
    ///
    /// Heights without a checkpoint always validate.
    pub fn validate(&self, height: u64, hash: &HeaderHash) -> bool {
        self.get(height).map_or(true, |checkpoint| checkpoint.hash() == hash)
    }

    /// The highest checkpoint.
    pub fn last(&self) -> Option<&Checkpoint> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Checkpoint> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Checkpoint] {
        &self.0
    }
}

impl From<Vec<Checkpoint>> for CheckpointSet {
    fn from(checkpoints: Vec<Checkpoint>) -> Self {
        Self::new(checkpoints)
    }
}

impl<'a> IntoIterator for &'a CheckpointSet {
    type Item = &'a Checkpoint;
    type IntoIter = std::slice::Iter<'a, Checkpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

const MAINNET: &[(u64, &str)] = &[
    (0, "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"),
    (11111, "0000000069e244f73d78e8fd29ba2fd2ed618bd6fa2ee92559f542fdb26e7c1d"),
    (33333, "000000002dd5588a74784eaa7ab0507a18ad16a236e7b1ce69f00d7ddfb5d0a6"),
    (74000, "0000000000573993a3c9e41ce34471c079dcf5f52a0e824a81e7f953b8661a20"),
    (105000, "00000000000291ce28027faea320c8d2b054b2e0fe44a773f3eefb151d6bdc97"),
    (134444, "00000000000005b12ffd4cd315cd34ffd4a594f430ac814c91184a0d42d2b0fe"),
    (168000, "000000000000099e61ea72015e79632f216fe6cb33d7899acb35b75c8303b763"),
    (193000, "000000000000059f452a5f7340de6682a977387c17010ff6e6c3bd83ca8b1317"),
    (210000, "000000000000048b95347e83192f69cf0366076336c639f9b7228e9ba171342e"),
    (216116, "00000000000001b4f4b433e81ee46494af945cf96014816a4e2370f11b23df4e"),
    (225430, "00000000000001c108384350f74090433e7fcf79a606b8e797f065b130575932"),
    (250000, "000000000000003887df1f29024b06fc2200b55f8af8f35453d7be294df2d214"),
    (279000, "0000000000000001ae8c72a0b0c301f67e3afca10e819efa9041e458e9bd7e40"),
    (295000, "00000000000000004d9b4ef50f0f9d686fd69db2e03af35a100370c64632a983"),
];

/// Built-in Bitcoin mainnet checkpoints, genesis first.
pub fn mainnet_checkpoints() -> Vec<Checkpoint> {
    MAINNET
        .iter()
        .filter_map(|(height, hash)| {
            HeaderHash::from_hex(hash)
                .ok()
                .map(|hash| Checkpoint::new(*height, hash))
        })
        .collect()
}
