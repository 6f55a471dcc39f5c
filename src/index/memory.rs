//! # In-Memory Ordered and Unordered Indexes
//!
//! The simplest members of the index family: a `BTreeMap` and a `HashMap`
//! from composite key to RID list, each behind its own lock. They share
//! the exact interface of the paged structures, so the catalog and the
//! executors treat all variants alike.

use super::IndexKey;
use crate::storage::Rid;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Key-ordered index backed by a `BTreeMap`. Supports full in-order
/// traversal for the order-by rewrite.
#[derive(Debug, Default)]
pub struct OrderedIndex {
    entries: RwLock<BTreeMap<IndexKey, Vec<Rid>>>,
}

impl OrderedIndex {
    pub fn new() -> OrderedIndex {
        OrderedIndex::default()
    }

    pub fn insert(&self, key: &IndexKey, rid: Rid) -> bool {
        let mut entries = self.entries.write();
        let rids = entries.entry(key.clone()).or_default();
        if rids.contains(&rid) {
            return false;
        }
        rids.push(rid);
        true
    }

    pub fn delete(&self, key: &IndexKey, rid: Rid) {
        let mut entries = self.entries.write();
        if let Some(rids) = entries.get_mut(key) {
            rids.retain(|r| *r != rid);
            if rids.is_empty() {
                entries.remove(key);
            }
        }
    }

    pub fn scan_key(&self, key: &IndexKey) -> Vec<Rid> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    pub fn scan_all(&self) -> Vec<Rid> {
        self.entries
            .read()
            .values()
            .flat_map(|rids| rids.iter().copied())
            .collect()
    }
}

/// Hash-lookup index backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct UnorderedIndex {
    entries: RwLock<HashMap<IndexKey, Vec<Rid>>>,
}

impl UnorderedIndex {
    pub fn new() -> UnorderedIndex {
        UnorderedIndex::default()
    }

    pub fn insert(&self, key: &IndexKey, rid: Rid) -> bool {
        let mut entries = self.entries.write();
        let rids = entries.entry(key.clone()).or_default();
        if rids.contains(&rid) {
            return false;
        }
        rids.push(rid);
        true
    }

    pub fn delete(&self, key: &IndexKey, rid: Rid) {
        let mut entries = self.entries.write();
        if let Some(rids) = entries.get_mut(key) {
            rids.retain(|r| *r != rid);
            if rids.is_empty() {
                entries.remove(key);
            }
        }
    }

    pub fn scan_key(&self, key: &IndexKey) -> Vec<Rid> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn key(v: i32) -> IndexKey {
        IndexKey::new(vec![Value::Integer(v)])
    }

    #[test]
    fn ordered_insert_scan_delete() {
        let index = OrderedIndex::new();
        assert!(index.insert(&key(1), Rid::new(0, 0)));
        assert!(index.insert(&key(1), Rid::new(0, 1)));
        assert!(!index.insert(&key(1), Rid::new(0, 0)));

        assert_eq!(
            index.scan_key(&key(1)),
            vec![Rid::new(0, 0), Rid::new(0, 1)]
        );
        assert!(index.scan_key(&key(2)).is_empty());

        index.delete(&key(1), Rid::new(0, 0));
        assert_eq!(index.scan_key(&key(1)), vec![Rid::new(0, 1)]);
    }

    #[test]
    fn ordered_scan_all_is_key_ordered() {
        let index = OrderedIndex::new();
        index.insert(&key(3), Rid::new(0, 3));
        index.insert(&key(1), Rid::new(0, 1));
        index.insert(&key(2), Rid::new(0, 2));

        assert_eq!(
            index.scan_all(),
            vec![Rid::new(0, 1), Rid::new(0, 2), Rid::new(0, 3)]
        );
    }

    #[test]
    fn unordered_insert_scan_delete() {
        let index = UnorderedIndex::new();
        assert!(index.insert(&key(9), Rid::new(1, 0)));
        assert!(!index.insert(&key(9), Rid::new(1, 0)));
        assert_eq!(index.scan_key(&key(9)), vec![Rid::new(1, 0)]);

        index.delete(&key(9), Rid::new(1, 0));
        assert!(index.scan_key(&key(9)).is_empty());
    }
}
