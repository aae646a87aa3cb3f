//! The accumulated header list.
//!
//! A `HeaderList` starts from a trusted seed (the chain top when sync begins)
//! and only ever grows. Header sync implementations extend it; nothing can
//! remove entries, so the seed stays at index 0 for the list's lifetime.

use crate::checkpoint::Checkpoint;
use crate::hash::HeaderHash;

/// Header hashes accumulated from a seed checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderList {
    start_height: u64,
    hashes: Vec<HeaderHash>,
}

impl HeaderList {
    /// Seed a list with the start checkpoint.
    pub fn new(start: &Checkpoint) -> Self {
        Self {
            start_height: start.height(),
            hashes: vec![*start.hash()],
        }
    }

    /// Height of the seed entry.
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Height of the last entry.
    pub fn top_height(&self) -> u64 {
        self.start_height + (self.hashes.len() as u64 - 1)
    }

    /// The seed hash.
    pub fn seed(&self) -> &HeaderHash {
        &self.hashes[0]
    }

    /// The most recently appended hash (the seed if nothing was appended).
    pub fn top(&self) -> &HeaderHash {
        // The seed is never removed, so the list is never empty.
        &self.hashes[self.hashes.len() - 1]
    }

    /// Append the hash of the header at `top_height() + 1`.
    pub fn push(&mut self, hash: HeaderHash) {
        self.hashes.push(hash);
    }

    pub fn extend<I: IntoIterator<Item = HeaderHash>>(&mut self, hashes: I) {
        self.hashes.extend(hashes);
    }

    /// Hash at an absolute chain height.
    pub fn get(&self, height: u64) -> Option<&HeaderHash> {
        let offset = height.checked_sub(self.start_height)?;
        self.hashes.get(usize::try_from(offset).ok()?)
    }

    /// Total entries including the seed.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Always false: the seed is always present.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Every entry, seed first.
    pub fn as_slice(&self) -> &[HeaderHash] {
        &self.hashes
    }

    /// Entries appended after the seed.
    pub fn new_headers(&self) -> &[HeaderHash] {
        &self.hashes[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Checkpoint {
        Checkpoint::new(100, HeaderHash::from_bytes([0x11; 32]))
    }

    #[test]
    fn test_seeded_with_start_checkpoint() {
        let list = HeaderList::new(&seed());
        assert_eq!(list.len(), 1);
        assert_eq!(list.start_height(), 100);
        assert_eq!(list.top_height(), 100);
        assert_eq!(list.seed(), seed().hash());
        assert_eq!(list.top(), seed().hash());
        assert!(list.new_headers().is_empty());
        assert!(!list.is_empty());
    }

    #[test]
    fn test_append_keeps_seed_first() {
        let mut list = HeaderList::new(&seed());
        list.push(HeaderHash::from_bytes([0x22; 32]));
        list.extend(vec![HeaderHash::from_bytes([0x33; 32])]);

        assert_eq!(list.len(), 3);
        assert_eq!(list.top_height(), 102);
        assert_eq!(list.as_slice()[0], *seed().hash());
        assert_eq!(list.new_headers().len(), 2);
        assert_eq!(list.top(), &HeaderHash::from_bytes([0x33; 32]));
    }

    #[test]
    fn test_get_by_height() {
        let mut list = HeaderList::new(&seed());
        list.push(HeaderHash::from_bytes([0x22; 32]));

        assert_eq!(list.get(100), Some(seed().hash()));
        assert_eq!(list.get(101), Some(&HeaderHash::from_bytes([0x22; 32])));
        assert_eq!(list.get(99), None);
        assert_eq!(list.get(102), None);
    }
}
