//! # In-Memory B+Tree Index
//!
//! Classic B+Tree shape: separator keys in internal nodes, all entries in
//! the leaves, split-on-overflow. Deletion is lazy: an emptied key is
//! removed from its leaf but nodes are not rebalanced and stale separators
//! are left in place (they still partition the key space correctly, they
//! just stop corresponding to a live entry).
//!
//! ## Node Invariants
//!
//! - Internal node with `k` separator keys has `k + 1` children
//! - `keys[i]` is the smallest key reachable through `children[i + 1]`
//! - A node holds at most `MAX_KEYS` keys; overflow splits at the midpoint
//!
//! The whole tree sits behind one RwLock; readers share, writers
//! serialize. Fine-grained latching belongs to the paged variant this
//! in-memory tree stands in for.

use super::IndexKey;
use crate::storage::Rid;
use parking_lot::RwLock;

const MAX_KEYS: usize = 16;

#[derive(Debug)]
enum Node {
    Leaf {
        keys: Vec<IndexKey>,
        rids: Vec<Vec<Rid>>,
    },
    Internal {
        keys: Vec<IndexKey>,
        children: Vec<Node>,
    },
}

impl Node {
    fn empty_leaf() -> Node {
        Node::Leaf {
            keys: Vec::new(),
            rids: Vec::new(),
        }
    }

    fn key_count(&self) -> usize {
        match self {
            Node::Leaf { keys, .. } => keys.len(),
            Node::Internal { keys, .. } => keys.len(),
        }
    }
}

/// Outcome of a recursive insert: whether a new entry landed, plus the
/// separator and right sibling when the child split.
struct InsertOutcome {
    inserted: bool,
    split: Option<(IndexKey, Node)>,
}


#[derive(Debug)]
pub struct BPlusTreeIndex {
    root: RwLock<Node>,
}

impl BPlusTreeIndex {
    pub fn new() -> BPlusTreeIndex {
        BPlusTreeIndex {
            root: RwLock::new(Node::empty_leaf()),
        }
    }

    pub fn insert(&self, key: &IndexKey, rid: Rid) -> bool {
        let mut root = self.root.write();
        let outcome = insert_rec(&mut root, key, rid);
        if let Some((sep, right)) = outcome.split {
            let old_root = std::mem::replace(&mut *root, Node::empty_leaf());
            *root = Node::Internal {
                keys: vec![sep],
                children: vec![old_root, right],
            };
        }
        outcome.inserted
    }

    pub fn delete(&self, key: &IndexKey, rid: Rid) {
        let mut root = self.root.write();
        delete_rec(&mut root, key, rid);
    }

    pub fn scan_key(&self, key: &IndexKey) -> Vec<Rid> {
        let root = self.root.read();
        let mut node = &*root;
        loop {
            match node {
                Node::Leaf { keys, rids } => {
                    return match keys.binary_search(key) {
                        Ok(i) => rids[i].clone(),
                        Err(_) => Vec::new(),
                    };
                }
                Node::Internal { keys, children } => {
                    node = &children[child_index(keys, key)];
                }
            }
        }
    }

    /// All RIDs in key order.
    pub fn scan_all(&self) -> Vec<Rid> {
        let root = self.root.read();
        let mut out = Vec::new();
        collect_in_order(&root, &mut out);
        out
    }
}

impl Default for BPlusTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the child subtree that may contain `key`.
fn child_index(keys: &[IndexKey], key: &IndexKey) -> usize {
    keys.partition_point(|sep| sep <= key)
}

fn insert_rec(node: &mut Node, key: &IndexKey, rid: Rid) -> InsertOutcome {
    let inserted = match node {
        Node::Leaf { keys, rids } => match keys.binary_search(key) {
            Ok(i) => {
                if rids[i].contains(&rid) {
                    false
                } else {
                    rids[i].push(rid);
                    true
                }
            }
            Err(i) => {
                keys.insert(i, key.clone());
                rids.insert(i, vec![rid]);
                true
            }
        },
        Node::Internal { keys, children } => {
            let idx = child_index(keys, key);
            let outcome = insert_rec(&mut children[idx], key, rid);
            if let Some((sep, right)) = outcome.split {
                keys.insert(idx, sep);
                children.insert(idx + 1, right);
            }
            outcome.inserted
        }
    };
    InsertOutcome {
        inserted,
        split: split_if_overfull(node),
    }
}

fn split_if_overfull(node: &mut Node) -> Option<(IndexKey, Node)> {
    if node.key_count() <= MAX_KEYS {
        return None;
    }
    match node {
        Node::Leaf { keys, rids } => {
            let mid = keys.len() / 2;
            let right_keys = keys.split_off(mid);
            let right_rids = rids.split_off(mid);
            let sep = right_keys[0].clone();
            Some((
                sep,
                Node::Leaf {
                    keys: right_keys,
                    rids: right_rids,
                },
            ))
        }
        Node::Internal { keys, children } => {
            // The midpoint separator moves up instead of staying in a side.
            let mid = keys.len() / 2;
            let mut right_keys = keys.split_off(mid);
            let sep = right_keys.remove(0);
            let right_children = children.split_off(mid + 1);
            Some((
                sep,
                Node::Internal {
                    keys: right_keys,
                    children: right_children,
                },
            ))
        }
    }
}

fn delete_rec(node: &mut Node, key: &IndexKey, rid: Rid) {
    match node {
        Node::Leaf { keys, rids } => {
            if let Ok(i) = keys.binary_search(key) {
                rids[i].retain(|r| *r != rid);
                if rids[i].is_empty() {
                    keys.remove(i);
                    rids.remove(i);
                }
            }
        }
        Node::Internal { keys, children } => {
            delete_rec(&mut children[child_index(keys, key)], key, rid);
        }
    }
}

fn collect_in_order(node: &Node, out: &mut Vec<Rid>) {
    match node {
        Node::Leaf { rids, .. } => {
            for group in rids {
                out.extend(group.iter().copied());
            }
        }
        Node::Internal { children, .. } => {
            for child in children {
                collect_in_order(child, out);
            }
        }
    }
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
    fn insert_and_point_lookup() {
        let tree = BPlusTreeIndex::new();
        assert!(tree.insert(&key(10), rid(1)));
        assert!(tree.insert(&key(20), rid(2)));
        assert_eq!(tree.scan_key(&key(10)), vec![rid(1)]);
        assert_eq!(tree.scan_key(&key(20)), vec![rid(2)]);
        assert!(tree.scan_key(&key(30)).is_empty());
    }

    #[test]
    fn duplicate_entry_is_swallowed() {
        let tree = BPlusTreeIndex::new();
        assert!(tree.insert(&key(1), rid(1)));
        assert!(!tree.insert(&key(1), rid(1)));
        assert!(tree.insert(&key(1), rid(2)));
        assert_eq!(tree.scan_key(&key(1)), vec![rid(1), rid(2)]);
    }

    #[test]
    fn splits_keep_every_key_findable() {
        let tree = BPlusTreeIndex::new();
        // Enough keys to force several levels of splits.
        for v in 0..500i64 {
            let shuffled = (v * 197) % 500;
            assert!(tree.insert(&key(shuffled), rid(shuffled as u16)));
        }
        for v in 0..500i64 {
            assert_eq!(tree.scan_key(&key(v)), vec![rid(v as u16)], "key {}", v);
        }
    }

    #[test]
    fn scan_all_is_sorted_after_random_inserts() {
        let tree = BPlusTreeIndex::new();
        for v in 0..200i64 {
            let shuffled = (v * 73) % 200;
            tree.insert(&key(shuffled), rid(shuffled as u16));
        }
        let rids = tree.scan_all();
        assert_eq!(rids.len(), 200);
        let slots: Vec<u16> = rids.iter().map(|r| r.slot).collect();
        let mut sorted = slots.clone();
        sorted.sort_unstable();
        assert_eq!(slots, sorted);
    }

    #[test]
    fn delete_removes_entry_and_key() {
        let tree = BPlusTreeIndex::new();
        for v in 0..100i64 {
            tree.insert(&key(v), rid(v as u16));
        }
        for v in (0..100i64).step_by(2) {
            tree.delete(&key(v), rid(v as u16));
        }
        for v in 0..100i64 {
            let hits = tree.scan_key(&key(v));
            if v % 2 == 0 {
                assert!(hits.is_empty(), "key {} should be gone", v);
            } else {
                assert_eq!(hits, vec![rid(v as u16)]);
            }
        }
        assert_eq!(tree.scan_all().len(), 50);
    }

    #[test]
    fn delete_of_missing_key_is_a_no_op() {
        let tree = BPlusTreeIndex::new();
        tree.insert(&key(1), rid(1));
        tree.delete(&key(2), rid(2));
        assert_eq!(tree.scan_key(&key(1)), vec![rid(1)]);
    }
}
