//! # Table Heap
//!
//! Append-oriented row store: a singly linked list of slotted pages.
//! `first_page_id` is fixed at construction and always reachable by
//! following `next_page_id` pointers; `last_page_id` is mutated only under
//! the heap mutex. Deletion flips the tombstone in the slot's metadata,
//! slots are never reused.
//!
//! ## Concurrency
//!
//! The heap-level mutex protects only `last_page_id`; per-page access goes
//! through the buffer pool's reader/writer latches. During insert the latch
//! order is page-before-next-page, never the reverse, so chained allocation
//! cannot deadlock against readers. Iterators hold no latches between
//! steps: each `next` re-acquires a short-lived read latch.
//!
//! ## Snapshot Iteration
//!
//! [`TableHeap::iter`] records a snapshot end, the `(last_page_id,
//! tuple_count)` pair observed at creation. Advancing past it terminates
//! the scan even if newer tuples exist, which keeps scans that feed
//! mutating operators from re-visiting their own output (the Halloween
//! problem). [`TableHeap::eager_iter`] instead runs until the page chain
//! ends.

use super::page::{TablePage, TablePageMut};
use super::tuple::{Rid, Tuple, TupleMeta};
use super::{BufferPool, PageId, INVALID_PAGE_ID};
use crate::engine_bail;
use crate::error::ErrorKind;
use eyre::Result;
use parking_lot::Mutex;
use std::sync::Arc;


#[derive(Debug)]pub struct TableHeap {
    pool: Arc<BufferPool>,
    first_page_id: PageId,
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates a heap with one empty page.
    pub fn new(pool: Arc<BufferPool>) -> TableHeap {
        let (first_page_id, mut guard) = pool.new_page();
        TablePageMut::new(guard.data_mut()).init();
        drop(guard);
        TableHeap {
            pool,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple, chaining a fresh page when the current last page is
    /// full. Fails with an `Invariant` error when the tuple cannot fit even
    /// in an empty page.
    pub fn insert(&self, meta: &TupleMeta, tuple: &Tuple) -> Result<Rid> {
        let mut last = self.last_page_id.lock();
        let mut page_id = *last;
        let mut guard = self.pool.fetch_page_write(page_id)?;

        loop {
            let mut page = TablePageMut::new(guard.data_mut());
            if let Some(slot) = page.insert_tuple(meta, tuple.data()) {
                return Ok(Rid::new(page_id, slot));
            }
            if page.as_page().tuple_count() == 0 {
                engine_bail!(
                    ErrorKind::Invariant,
                    "tuple of {} bytes is too large for an empty page",
                    tuple.data().len()
                );
            }

            // Chain a successor and move the write latch over to it.
            let (next_page_id, mut next_guard) = self.pool.new_page();
            TablePageMut::new(next_guard.data_mut()).init();
            page.set_next_page_id(next_page_id);

            *last = next_page_id;
            page_id = next_page_id;
            guard = next_guard;
        }
    }

    /// Rewrites the metadata of the slot at `rid`, latching only its page.
    pub fn update_meta(&self, meta: &TupleMeta, rid: Rid) -> Result<()> {
        let mut guard = self.pool.fetch_page_write(rid.page_id)?;
        TablePageMut::new(guard.data_mut()).update_tuple_meta(meta, rid.slot)
    }

    pub fn get_tuple(&self, rid: Rid) -> Result<(TupleMeta, Tuple)> {
        let guard = self.pool.fetch_page_read(rid.page_id)?;
        let page = TablePage::new(guard.data());
        let (meta, payload) = page.tuple(rid.slot)?;
        let mut tuple = Tuple::from_bytes(payload.to_vec());
        tuple.set_rid(rid);
        Ok((meta, tuple))
    }

    pub fn get_tuple_meta(&self, rid: Rid) -> Result<TupleMeta> {
        let guard = self.pool.fetch_page_read(rid.page_id)?;
        TablePage::new(guard.data()).tuple_meta(rid.slot)
    }

    /// Reads the current `(meta, tuple)` under the page latch, consults
    /// `guard_fn`, and applies the write only if accepted. The MVCC
    /// collaborator uses the guard to detect write-write conflicts.
    pub fn update_in_place<F>(
        &self,
        meta: &TupleMeta,
        tuple: &Tuple,
        rid: Rid,
        guard_fn: F,
    ) -> Result<bool>
    where
        F: FnOnce(&TupleMeta, &Tuple, Rid) -> bool,
    {
        let mut guard = self.pool.fetch_page_write(rid.page_id)?;
        let mut page = TablePageMut::new(guard.data_mut());
        let (old_meta, old_payload) = page.as_page().tuple(rid.slot)?;
        let old_tuple = Tuple::from_bytes(old_payload.to_vec());
        if !guard_fn(&old_meta, &old_tuple, rid) {
            return Ok(false);
        }
        page.update_tuple_in_place(meta, tuple.data(), rid.slot)?;
        Ok(true)
    }

    /// Forward iterator that stops at the rows present right now.
    pub fn iter(self: &Arc<Self>) -> Result<TableIter> {
        let last = *self.last_page_id.lock();
        let guard = self.pool.fetch_page_read(last)?;
        let stop_slot = TablePage::new(guard.data()).tuple_count();
        drop(guard);
        TableIter::new(Arc::clone(self), Rid::new(last, stop_slot))
    }

    /// Forward iterator that only terminates at the end of the page chain.
    pub fn eager_iter(self: &Arc<Self>) -> Result<TableIter> {
        TableIter::new(Arc::clone(self), Rid::INVALID)
    }

    fn page_state(&self, page_id: PageId) -> Result<(u16, PageId)> {
        let guard = self.pool.fetch_page_read(page_id)?;
        let page = TablePage::new(guard.data());
        Ok((page.tuple_count(), page.next_page_id()))
    }
}

/// Forward scan over a table heap. Yields tombstoned rows too; filtering
/// them is the scan executor's job.
pub struct TableIter {
    heap: Arc<TableHeap>,
    rid: Rid,
    stop_at: Rid,
}

impl TableIter {
    fn new(heap: Arc<TableHeap>, stop_at: Rid) -> Result<TableIter> {
        let mut rid = Rid::new(heap.first_page_id(), 0);
        // A freshly created table has an empty first page; pages later in
        // the chain are only allocated once their predecessor holds rows,
        // so an empty first page means an empty heap.
        let (count, _) = heap.page_state(rid.page_id)?;
        if rid.slot >= count || rid == stop_at {
            rid = Rid::INVALID;
        }
        Ok(TableIter { heap, rid, stop_at })
    }

    pub fn is_end(&self) -> bool {
        !self.rid.is_valid()
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    /// Advances to the next slot, crossing page boundaries and honoring the
    /// snapshot end.
    fn advance(&mut self) -> Result<()> {
        let (count, next_page_id) = self.heap.page_state(self.rid.page_id)?;
        let next_slot = self.rid.slot + 1;
        self.rid = Rid::new(self.rid.page_id, next_slot);

        if self.rid == self.stop_at {
            self.rid = Rid::INVALID;
        } else if next_slot < count {
            // Still inside the current page.
        } else {
            self.rid = Rid::new(next_page_id, 0);
            if self.rid == self.stop_at {
                self.rid = Rid::INVALID;
            }
        }
        Ok(())
    }
}

impl Iterator for TableIter {
    type Item = Result<(TupleMeta, Tuple)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let item = self.heap.get_tuple(self.rid);
        if item.is_err() {
            self.rid = Rid::INVALID;
            return Some(item);
        }
        if let Err(e) = self.advance() {
            self.rid = Rid::INVALID;
            return Some(Err(e));
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Schema, Value};

    fn int_schema() -> Schema {
        Schema::new(vec![Column::new("a", DataType::Integer)])
    }

    fn int_tuple(v: i32) -> Tuple {
        Tuple::from_values(&[Value::Integer(v)], &int_schema()).unwrap()
    }

    fn heap() -> Arc<TableHeap> {
        Arc::new(TableHeap::new(Arc::new(BufferPool::new())))
    }

    #[test]
    fn first_insert_lands_on_page_zero_slot_zero() {
        let heap = heap();
        let rid = heap.insert(&TupleMeta::default(), &int_tuple(1)).unwrap();
        assert_eq!(rid, Rid::new(0, 0));
    }

    #[test]
    fn rid_round_trips_through_get_tuple() {
        let heap = heap();
        let rid = heap.insert(&TupleMeta::default(), &int_tuple(7)).unwrap();
        let (meta, tuple) = heap.get_tuple(rid).unwrap();
        assert!(!meta.is_deleted);
        assert_eq!(tuple.rid(), Some(rid));
        assert_eq!(tuple.value_at(&int_schema(), 0).unwrap(), Value::Integer(7));
    }

    #[test]
    fn inserts_chain_onto_new_pages() {
        let heap = heap();
        let schema = Schema::new(vec![Column::with_length("s", DataType::Varchar, 2000)]);
        let wide = Tuple::from_values(&[Value::Varchar("x".repeat(1500))], &schema).unwrap();

        let mut pages = std::collections::HashSet::new();
        for _ in 0..8 {
            let rid = heap.insert(&TupleMeta::default(), &wide).unwrap();
            pages.insert(rid.page_id);
        }
        assert!(pages.len() > 1);

        // Every page stays reachable from the first.
        let rows: Vec<_> = heap.eager_iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn oversized_tuple_is_rejected() {
        let heap = heap();
        let schema = Schema::new(vec![Column::with_length("s", DataType::Varchar, 8000)]);
        let huge = Tuple::from_values(&[Value::Varchar("x".repeat(6000))], &schema).unwrap();
        let err = heap.insert(&TupleMeta::default(), &huge).unwrap_err();
        assert_eq!(crate::error::kind_of(&err), Some(ErrorKind::Invariant));
    }

    #[test]
    fn iterator_sees_snapshot_not_later_inserts() {
        let heap = heap();
        for v in 0..3 {
            heap.insert(&TupleMeta::default(), &int_tuple(v)).unwrap();
        }

        let mut iter = heap.iter().unwrap();
        // Rows inserted after the iterator was created are invisible.
        heap.insert(&TupleMeta::default(), &int_tuple(99)).unwrap();

        let mut seen = Vec::new();
        while let Some(item) = iter.next() {
            let (_, tuple) = item.unwrap();
            seen.push(tuple.value_at(&int_schema(), 0).unwrap());
        }
        assert_eq!(
            seen,
            vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)]
        );
    }

    #[test]
    fn eager_iterator_sees_everything() {
        let heap = heap();
        for v in 0..3 {
            heap.insert(&TupleMeta::default(), &int_tuple(v)).unwrap();
        }
        let rows: Vec<_> = heap.eager_iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn iterator_on_empty_heap_is_exhausted() {
        let heap = heap();
        assert!(heap.iter().unwrap().next().is_none());
        assert!(heap.eager_iter().unwrap().next().is_none());
    }

    #[test]
    fn iterator_yields_tombstones() {
        let heap = heap();
        let rid = heap.insert(&TupleMeta::default(), &int_tuple(1)).unwrap();
        heap.update_meta(
            &TupleMeta {
                ts: 1,
                is_deleted: true,
            },
            rid,
        )
        .unwrap();

        let rows: Vec<_> = heap.iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].0.is_deleted);
    }

    #[test]
    fn update_in_place_honors_guard() {
        let heap = heap();
        let rid = heap.insert(&TupleMeta::default(), &int_tuple(1)).unwrap();

        let rejected = heap
            .update_in_place(&TupleMeta::default(), &int_tuple(2), rid, |_, _, _| false)
            .unwrap();
        assert!(!rejected);
        let (_, tuple) = heap.get_tuple(rid).unwrap();
        assert_eq!(tuple.value_at(&int_schema(), 0).unwrap(), Value::Integer(1));

        let applied = heap
            .update_in_place(&TupleMeta::default(), &int_tuple(2), rid, |_, _, _| true)
            .unwrap();
        assert!(applied);
        let (_, tuple) = heap.get_tuple(rid).unwrap();
        assert_eq!(tuple.value_at(&int_schema(), 0).unwrap(), Value::Integer(2));
    }
}
