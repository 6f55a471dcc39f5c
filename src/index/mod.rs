//! # Index Family
//!
//! Six index variants behind one tagged dispatch type, [`AnyIndex`]:
//!
//! | Variant | Structure | Lookup | Ordered scan | Vector search |
//! |---------|-----------|--------|--------------|---------------|
//! | BPlusTree | in-memory B+Tree | yes | yes | - |
//! | Hash | extendible hash table | yes | - | - |
//! | Ordered | `BTreeMap` | yes | yes | - |
//! | Unordered | `HashMap` | yes | - | - |
//! | IvfFlat | centroid partitions | - | - | yes |
//! | Hnsw | navigable small-world graph | - | - | yes |
//!
//! Every variant speaks the uniform interface `insert(key, rid) → bool`,
//! `delete(key, rid)`, `scan_key(key) → Vec<Rid>`; the vector variants
//! additionally expose `build(points)` and `scan_vector(query, k)`.
//! Inserting a `(key, rid)` pair that is already present is swallowed
//! (`insert` returns `false`) rather than failing the statement.
//!
//! Each index serializes its internal structure behind its own lock, so
//! the catalog can hand out shared references and executors mutate through
//! them.

mod btree;
mod hash;
mod hnsw;
mod ivfflat;
mod memory;

pub use btree::BPlusTreeIndex;
pub use hash::HashTableIndex;
pub use hnsw::HnswIndex;
pub use ivfflat::IvfFlatIndex;
pub use memory::{OrderedIndex, UnorderedIndex};

use crate::engine_bail;
use crate::error::ErrorKind;
use crate::storage::Rid;
use crate::types::Value;
use crate::vector::VectorMetric;
use eyre::Result;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Composite key extracted from a tuple by an index's `key_attrs`.
///
/// Wraps the value vector with the total ordering and hashing the index
/// structures need (`Value` alone is only partially ordered because of
/// NULL and NaN).
#[derive(Debug, Clone)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    pub fn new(values: Vec<Value>) -> IndexKey {
        IndexKey(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// The single vector column of a vector-index key.
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self.0.as_slice() {
            [Value::Vector(v)] => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.compare_for_sort(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl Hash for IndexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            value.hash_to(state);
        }
    }
}

/// Which structure backs an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    BPlusTree,
    Hash,
    Ordered,
    Unordered,
    IvfFlat,
    Hnsw,
}

impl IndexKind {
    pub fn is_vector(&self) -> bool {
        matches!(self, IndexKind::IvfFlat | IndexKind::Hnsw)
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, IndexKind::BPlusTree | IndexKind::Ordered)
    }
}

/// Build/query knobs from the `WITH (...)` clause of `CREATE INDEX`.
/// Unrecognized keys are rejected at catalog level; missing keys fall back
/// to the defaults below.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// IVFFlat: number of build-time partitions.
    pub lists: usize,
    /// IVFFlat: partitions probed per query.
    pub probe_lists: usize,
    /// HNSW: neighbors per node above level 0 (level 0 holds `2 * m`).
    pub m: usize,
    /// HNSW: candidate list width during build.
    pub ef_construction: usize,
    /// HNSW: candidate list width during query.
    pub ef_search: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            lists: 16,
            probe_lists: 1,
            m: 16,
            ef_construction: 100,
            ef_search: 32,
        }
    }
}

impl IndexOptions {
    pub fn from_pairs(pairs: &[(String, i64)]) -> Result<IndexOptions> {
        let mut options = IndexOptions::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "lists" => &mut options.lists,
                "probe_lists" => &mut options.probe_lists,
                "m" => &mut options.m,
                "ef_construction" => &mut options.ef_construction,
                "ef_search" => &mut options.ef_search,
                other => engine_bail!(
                    ErrorKind::NotImplemented,
                    "unrecognized index option '{}'",
                    other
                ),
            };
            if *value <= 0 {
                engine_bail!(
                    ErrorKind::Invariant,
                    "index option '{}' must be positive, got {}",
                    key,
                    value
                );
            }
            *slot = *value as usize;
        }
        Ok(options)
    }
}

/// Tagged dispatch over the index variants.

#[derive(Debug)]
pub enum AnyIndex {
    BPlusTree(BPlusTreeIndex),
    Hash(HashTableIndex),
    Ordered(OrderedIndex),
    Unordered(UnorderedIndex),
    IvfFlat(IvfFlatIndex),
    Hnsw(HnswIndex),
}

impl AnyIndex {
    pub fn kind(&self) -> IndexKind {
        match self {
            AnyIndex::BPlusTree(_) => IndexKind::BPlusTree,
            AnyIndex::Hash(_) => IndexKind::Hash,
            AnyIndex::Ordered(_) => IndexKind::Ordered,
            AnyIndex::Unordered(_) => IndexKind::Unordered,
            AnyIndex::IvfFlat(_) => IndexKind::IvfFlat,
            AnyIndex::Hnsw(_) => IndexKind::Hnsw,
        }
    }

    /// Inserts an entry; duplicates are swallowed and report `false`.
    pub fn insert(&self, key: &IndexKey, rid: Rid) -> bool {
        match self {
            AnyIndex::BPlusTree(index) => index.insert(key, rid),
            AnyIndex::Hash(index) => index.insert(key, rid),
            AnyIndex::Ordered(index) => index.insert(key, rid),
            AnyIndex::Unordered(index) => index.insert(key, rid),
            AnyIndex::IvfFlat(index) => match key.as_vector() {
                Some(v) => index.insert(v, rid),
                None => false,
            },
            AnyIndex::Hnsw(index) => match key.as_vector() {
                Some(v) => index.insert(v, rid),
                None => false,
            },
        }
    }

    pub fn delete(&self, key: &IndexKey, rid: Rid) {
        match self {
            AnyIndex::BPlusTree(index) => index.delete(key, rid),
            AnyIndex::Hash(index) => index.delete(key, rid),
            AnyIndex::Ordered(index) => index.delete(key, rid),
            AnyIndex::Unordered(index) => index.delete(key, rid),
            AnyIndex::IvfFlat(index) => index.delete(rid),
            AnyIndex::Hnsw(index) => index.delete(rid),
        }
    }

    pub fn scan_key(&self, key: &IndexKey) -> Vec<Rid> {
        match self {
            AnyIndex::BPlusTree(index) => index.scan_key(key),
            AnyIndex::Hash(index) => index.scan_key(key),
            AnyIndex::Ordered(index) => index.scan_key(key),
            AnyIndex::Unordered(index) => index.scan_key(key),
            // Exact-match lookup on a vector index degenerates to a k=1
            // search followed by an equality check at the caller.
            AnyIndex::IvfFlat(_) | AnyIndex::Hnsw(_) => Vec::new(),
        }
    }

    /// Every RID in key order; `None` for unordered variants.
    pub fn scan_all(&self) -> Option<Vec<Rid>> {
        match self {
            AnyIndex::BPlusTree(index) => Some(index.scan_all()),
            AnyIndex::Ordered(index) => Some(index.scan_all()),
            _ => None,
        }
    }

    pub fn metric(&self) -> Option<VectorMetric> {
        match self {
            AnyIndex::IvfFlat(index) => Some(index.metric()),
            AnyIndex::Hnsw(index) => Some(index.metric()),
            _ => None,
        }
    }

    /// Bulk-loads a vector index from `(vector, rid)` points.
    pub fn build(&self, points: &[(Vec<f64>, Rid)]) -> Result<()> {
        match self {
            AnyIndex::IvfFlat(index) => {
                index.build(points);
                Ok(())
            }
            AnyIndex::Hnsw(index) => {
                index.build(points);
                Ok(())
            }
            other => engine_bail!(
                ErrorKind::Invariant,
                "build() called on non-vector index {:?}",
                other.kind()
            ),
        }
    }

    /// Top-k RIDs by the configured distance, best first.
    pub fn scan_vector(&self, query: &[f64], k: usize) -> Result<Vec<Rid>> {
        match self {
            AnyIndex::IvfFlat(index) => Ok(index.scan_vector(query, k)),
            AnyIndex::Hnsw(index) => Ok(index.scan_vector(query, k)),
            other => engine_bail!(
                ErrorKind::Invariant,
                "scan_vector() called on non-vector index {:?}",
                other.kind()
            ),
        }
    }
}

/// xorshift64* generator for HNSW level selection and IVFFlat seeding.
/// Seeded, so index builds are deterministic under test.
#[derive(Debug)]
pub(crate) struct XorShift {
    state: u64,
}

impl XorShift {
    pub(crate) fn new(seed: u64) -> XorShift {
        XorShift {
            state: seed.max(1),
        }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut state = self.state;
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        self.state = state;
        state.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform sample in [0, 1).
    pub(crate) fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub(crate) fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound.max(1) as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_key_ordering_is_total() {
        let null_key = IndexKey::new(vec![Value::Null]);
        let one = IndexKey::new(vec![Value::Integer(1)]);
        let two = IndexKey::new(vec![Value::Integer(2)]);

        assert!(null_key < one);
        assert!(one < two);
        assert_eq!(one.cmp(&one.clone()), Ordering::Equal);
    }

    #[test]
    fn index_key_composite_compares_lexicographically() {
        let a = IndexKey::new(vec![Value::Integer(1), Value::Varchar("b".into())]);
        let b = IndexKey::new(vec![Value::Integer(1), Value::Varchar("c".into())]);
        assert!(a < b);
    }

    #[test]
    fn index_key_hash_matches_equality_across_widths() {
        use std::collections::hash_map::DefaultHasher;

        let a = IndexKey::new(vec![Value::Integer(5)]);
        let b = IndexKey::new(vec![Value::BigInt(5)]);
        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn options_parse_and_validate() {
        let options = IndexOptions::from_pairs(&[
            ("lists".to_string(), 4),
            ("probe_lists".to_string(), 2),
        ])
        .unwrap();
        assert_eq!(options.lists, 4);
        assert_eq!(options.probe_lists, 2);
        assert_eq!(options.m, 16);

        let err = IndexOptions::from_pairs(&[("fanout".to_string(), 4)]).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(ErrorKind::NotImplemented)
        );

        let err = IndexOptions::from_pairs(&[("m".to_string(), 0)]).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::Invariant));
    }

    #[test]
    fn xorshift_is_deterministic_and_in_range() {
        let mut a = XorShift::new(42);
        let mut b = XorShift::new(42);
        for _ in 0..100 {
            let x = a.next_f64();
            assert_eq!(x, b.next_f64());
            assert!((0.0..1.0).contains(&x));
        }
    }
}
