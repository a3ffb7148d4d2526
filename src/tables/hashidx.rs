//! Open-chaining hash index over table rows.
//!
//! Large scopes make linear duplicate/name scans expensive, so the merge
//! engine builds hash indices on demand once a table crosses a size
//! threshold. The index maps caller-computed key hashes to RID chains; the
//! caller re-verifies every candidate, so a missing or stale-free index can
//! only cost time, never correctness. Buckets grow to `2n - 1` whenever the
//! load factor exceeds 3.

/// Hash index mapping key hashes to chains of RIDs.
#[derive(Debug, Clone)]
pub struct HashIndex {
    buckets: Vec<u32>,
    // Entry storage; buckets and `next` hold entry index + 1, 0 = end
    hashes: Vec<u32>,
    rids: Vec<u32>,
    next: Vec<u32>,
}

impl HashIndex {
    const INITIAL_BUCKETS: usize = 23;
    const MAX_LOAD: usize = 3;

    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        HashIndex {
            buckets: vec![0; Self::INITIAL_BUCKETS],
            hashes: Vec::new(),
            rids: Vec::new(),
            next: Vec::new(),
        }
    }

    /// Number of entries in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rids.len()
    }

    /// True when no entries have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rids.is_empty()
    }

    /// Adds `rid` under `hash`. Duplicate hashes chain; duplicate
    /// (hash, rid) pairs are the caller's business.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, hash: u32, rid: u32) {
        if self.rids.len() + 1 > self.buckets.len() * Self::MAX_LOAD {
            self.rehash();
        }

        let bucket = hash as usize % self.buckets.len();
        self.hashes.push(hash);
        self.rids.push(rid);
        self.next.push(self.buckets[bucket]);
        self.buckets[bucket] = self.rids.len() as u32;
    }

    /// Iterates every RID stored under `hash`, most recent first. The
    /// caller must verify each candidate against the real key.
    pub fn find(&self, hash: u32) -> impl Iterator<Item = u32> + '_ {
        let mut cursor = self.buckets[hash as usize % self.buckets.len()];
        std::iter::from_fn(move || {
            while cursor != 0 {
                let entry = cursor as usize - 1;
                cursor = self.next[entry];
                if self.hashes[entry] == hash {
                    return Some(self.rids[entry]);
                }
            }
            None
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn rehash(&mut self) {
        let new_len = self.buckets.len() * 2 - 1;
        self.buckets = vec![0; new_len];
        for entry in 0..self.rids.len() {
            let bucket = self.hashes[entry] as usize % new_len;
            self.next[entry] = self.buckets[bucket];
            self.buckets[bucket] = entry as u32 + 1;
        }
    }
}

impl Default for HashIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a over a byte string; the common key hash for name-based indices.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C_9DC5u32;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Key hash for (parent token, name) pairs, e.g. member lookups.
#[must_use]
pub fn hash_parent_name(parent: u32, name: &str) -> u32 {
    hash_bytes(name.as_bytes()) ^ parent.rotate_left(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_find() {
        let mut index = HashIndex::new();
        index.add(10, 1);
        index.add(20, 2);
        index.add(10, 3);

        let mut under_ten: Vec<u32> = index.find(10).collect();
        under_ten.sort_unstable();
        assert_eq!(under_ten, [1, 3]);
        assert_eq!(index.find(20).collect::<Vec<_>>(), [2]);
        assert_eq!(index.find(30).count(), 0);
    }

    #[test]
    fn colliding_hashes_stay_separate() {
        let mut index = HashIndex::new();
        // 23 buckets: 5 and 28 share a bucket but differ in hash
        index.add(5, 1);
        index.add(28, 2);

        assert_eq!(index.find(5).collect::<Vec<_>>(), [1]);
        assert_eq!(index.find(28).collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn rehash_preserves_entries() {
        let mut index = HashIndex::new();
        // Push well past the initial 23 * 3 load limit
        for rid in 1..=500u32 {
            index.add(rid % 17, rid);
        }
        assert_eq!(index.len(), 500);

        for hash in 0..17u32 {
            let found: Vec<u32> = index.find(hash).collect();
            let expected = (1..=500u32).filter(|rid| rid % 17 == hash).count();
            assert_eq!(found.len(), expected, "hash {hash}");
        }
    }

    #[test]
    fn hash_functions_are_stable() {
        assert_eq!(hash_bytes(b"Foo"), hash_bytes(b"Foo"));
        assert_ne!(hash_bytes(b"Foo"), hash_bytes(b"Bar"));
        assert_ne!(
            hash_parent_name(1, "Method"),
            hash_parent_name(2, "Method")
        );
    }
}
