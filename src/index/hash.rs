//! # Extendible Hash Table Index
//!
//! Directory-based extendible hashing: the directory holds `2^global_depth`
//! slots pointing at buckets, each bucket carries a `local_depth`. An
//! overflowing bucket splits; when its local depth already equals the
//! global depth the directory doubles first. Entries whose hashes collide
//! entirely stop splitting at `MAX_DEPTH` and overflow in place.
//!
//! ```text
//! global_depth = 2
//! directory:  00 -> B0   01 -> B1   10 -> B0   11 -> B2
//!                  (B0 local_depth = 1, shared by 00 and 10)
//! ```

use super::IndexKey;
use crate::storage::Rid;
use parking_lot::RwLock;
use std::hash::{Hash, Hasher};

const BUCKET_CAPACITY: usize = 8;
const MAX_DEPTH: u32 = 16;

#[derive(Debug)]
struct Bucket {
    local_depth: u32,
    entries: Vec<(IndexKey, Rid)>,
}

#[derive(Debug)]
struct HashState {
    global_depth: u32,
    /// Directory slot -> bucket index into `buckets`.
    directory: Vec<usize>,
    buckets: Vec<Bucket>,
}


#[derive(Debug)]
pub struct HashTableIndex {
    state: RwLock<HashState>,
}

impl HashTableIndex {
    pub fn new() -> HashTableIndex {
        HashTableIndex {
            state: RwLock::new(HashState {
                global_depth: 0,
                directory: vec![0],
                buckets: vec![Bucket {
                    local_depth: 0,
                    entries: Vec::new(),
                }],
            }),
        }
    }

    pub fn insert(&self, key: &IndexKey, rid: Rid) -> bool {
        let mut state = self.state.write();
        let hash = hash_key(key);

        let slot = state.slot_of(hash);
        let bucket_idx = state.directory[slot];
        if state.buckets[bucket_idx]
            .entries
            .iter()
            .any(|(k, r)| k == key && *r == rid)
        {
            return false;
        }

        state.buckets[bucket_idx].entries.push((key.clone(), rid));

        // Split until the overflowing bucket fits or depth maxes out.
        let mut overfull = bucket_idx;
        while state.buckets[overfull].entries.len() > BUCKET_CAPACITY
            && state.buckets[overfull].local_depth < MAX_DEPTH
        {
            overfull = state.split_bucket(overfull, hash);
        }
        true
    }

    pub fn delete(&self, key: &IndexKey, rid: Rid) {
        let mut state = self.state.write();
        let hash = hash_key(key);
        let slot = state.slot_of(hash);
        let bucket_idx = state.directory[slot];
        state.buckets[bucket_idx]
            .entries
            .retain(|(k, r)| !(k == key && *r == rid));
    }

    pub fn scan_key(&self, key: &IndexKey) -> Vec<Rid> {
        let state = self.state.read();
        let slot = state.slot_of(hash_key(key));
        let bucket_idx = state.directory[slot];
        state.buckets[bucket_idx]
            .entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, r)| *r)
            .collect()
    }

    #[cfg(test)]
    fn global_depth(&self) -> u32 {
        self.state.read().global_depth
    }
}

impl Default for HashTableIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl HashState {
    fn slot_of(&self, hash: u64) -> usize {
        (hash & ((1u64 << self.global_depth) - 1)) as usize
    }

    /// Splits the bucket at `bucket_idx`, doubling the directory first if
    /// its local depth has caught up with the global depth. Returns the
    /// bucket that now holds the hash the caller is inserting toward.
    fn split_bucket(&mut self, bucket_idx: usize, toward: u64) -> usize {
        if self.buckets[bucket_idx].local_depth == self.global_depth {
            // Double the directory: the upper half mirrors the lower.
            let len = self.directory.len();
            for i in 0..len {
                let target = self.directory[i];
                self.directory.push(target);
            }
            self.global_depth += 1;
        }

        let old_depth = self.buckets[bucket_idx].local_depth;
        let new_depth = old_depth + 1;
        let split_bit = 1u64 << old_depth;

        let entries = std::mem::take(&mut self.buckets[bucket_idx].entries);
        self.buckets[bucket_idx].local_depth = new_depth;
        let sibling_idx = self.buckets.len();
        self.buckets.push(Bucket {
            local_depth: new_depth,
            entries: Vec::new(),
        });

        // Redistribute on the newly significant bit.
        for (key, rid) in entries {
            let hash = hash_key(&key);
            if hash & split_bit != 0 {
                self.buckets[sibling_idx].entries.push((key, rid));
            } else {
                self.buckets[bucket_idx].entries.push((key, rid));
            }
        }

        // Repoint directory slots that referenced the old bucket and have
        // the split bit set.
        for slot in 0..self.directory.len() {
            if self.directory[slot] == bucket_idx && (slot as u64) & split_bit != 0 {
                self.directory[slot] = sibling_idx;
            }
        }

        if toward & split_bit != 0 {
            sibling_idx
        } else {
            bucket_idx
        }
    }
}

fn hash_key(key: &IndexKey) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn key(v: i64) -> IndexKey {
        IndexKey::new(vec![Value::BigInt(v)])
    }

    fn rid(n: u16) -> Rid {
        Rid::new(0, n)
    }

    #[test]
    fn insert_and_lookup() {
        let index = HashTableIndex::new();
        assert!(index.insert(&key(1), rid(1)));
        assert!(index.insert(&key(2), rid(2)));
        assert_eq!(index.scan_key(&key(1)), vec![rid(1)]);
        assert_eq!(index.scan_key(&key(2)), vec![rid(2)]);
        assert!(index.scan_key(&key(3)).is_empty());
    }

    #[test]
    fn duplicate_pair_is_swallowed() {
        let index = HashTableIndex::new();
        assert!(index.insert(&key(1), rid(1)));
        assert!(!index.insert(&key(1), rid(1)));
        assert_eq!(index.scan_key(&key(1)).len(), 1);
    }

    #[test]
    fn directory_grows_under_load() {
        let index = HashTableIndex::new();
        for v in 0..1000i64 {
            assert!(index.insert(&key(v), rid((v % u16::MAX as i64) as u16)));
        }
        assert!(index.global_depth() > 0);
        for v in 0..1000i64 {
            assert_eq!(
                index.scan_key(&key(v)),
                vec![rid((v % u16::MAX as i64) as u16)],
                "key {}",
                v
            );
        }
    }

    #[test]
    fn delete_leaves_other_entries_alone() {
        let index = HashTableIndex::new();
        for v in 0..64i64 {
            index.insert(&key(v), rid(v as u16));
        }
        index.delete(&key(10), rid(10));
        assert!(index.scan_key(&key(10)).is_empty());
        assert_eq!(index.scan_key(&key(11)), vec![rid(11)]);
    }

    #[test]
    fn same_key_holds_multiple_rids() {
        let index = HashTableIndex::new();
        index.insert(&key(5), rid(1));
        index.insert(&key(5), rid(2));
        let mut rids = index.scan_key(&key(5));
        rids.sort_by_key(|r| r.slot);
        assert_eq!(rids, vec![rid(1), rid(2)]);
    }
}
