//! # Transaction Handle
//!
//! Opaque handle issued by the MVCC collaborator. The executor core reads
//! `(read_ts, txn_id)` and stamps mutations with the transaction's
//! timestamp; visibility rules, the watermark, and conflict detection live
//! outside this crate. A `None` handle is permitted for read-only testing
//! and stamps timestamp 0.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    txn_id: u64,
    read_ts: u64,
}

impl Transaction {
    pub fn new(txn_id: u64, read_ts: u64) -> Transaction {
        Transaction { txn_id, read_ts }
    }

    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }
}

/// Timestamp to stamp a mutation with under an optional handle.
pub fn commit_ts(txn: Option<&Transaction>) -> u64 {
    txn.map(|t| t.read_ts()).unwrap_or(0)
}
