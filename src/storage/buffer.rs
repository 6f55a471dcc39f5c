//! # In-Memory Buffer Pool
//!
//! The stand-in for the storage collaborator. Pages live in memory for the
//! lifetime of the pool; fetching a page returns an owned reader/writer
//! guard that releases the pin (the latch) on drop, matching the guard
//! contract the table heap and indexes are written against:
//!
//! - `new_page() → (PageId, WriteGuard)`
//! - `fetch_page_read(id) → ReadGuard`
//! - `fetch_page_write(id) → WriteGuard`
//!
//! Guards are `parking_lot` arc-locks so they can outlive the borrow of the
//! pool that produced them (iterators re-acquire short-lived read latches
//! between steps without holding any pool-wide lock).
//!
//! ## Latch Discipline
//!
//! At most one writer per page; readers and writers serialize through the
//! page's RwLock. The pool-wide frame table is itself behind a RwLock that
//! is held only long enough to clone the frame's Arc, never across a page
//! latch acquisition, so pool growth cannot deadlock against page access.

use super::{PageId, PAGE_SIZE};
use crate::engine_bail;
use crate::error::ErrorKind;
use eyre::Result;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::sync::Arc;

/// One page frame worth of bytes.
#[derive(Debug)]
pub struct PageBuf {
    data: Box<[u8]>,
}

impl PageBuf {
    fn zeroed() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE].into_boxed_slice(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Pinned page frame without a latch.
pub type PageFrame = Arc<RwLock<PageBuf>>;

/// Owned read latch on a page; unpins on drop.
pub type PageReadGuard = ArcRwLockReadGuard<RawRwLock, PageBuf>;

/// Owned write latch on a page; unpins on drop.
pub type PageWriteGuard = ArcRwLockWriteGuard<RawRwLock, PageBuf>;

/// In-memory page store. Page ids are dense indices into the frame table.

#[derive(Debug)]
pub struct BufferPool {
    frames: RwLock<Vec<Arc<RwLock<PageBuf>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            frames: RwLock::new(Vec::new()),
        }
    }

    /// Allocates a zeroed page and returns it write-latched.
    pub fn new_page(&self) -> (PageId, PageWriteGuard) {
        let frame = Arc::new(RwLock::new(PageBuf::zeroed()));
        let guard = RwLock::write_arc(&frame);
        let mut frames = self.frames.write();
        let id = frames.len() as PageId;
        frames.push(frame);
        (id, guard)
    }

    /// Unlatched pin on a page frame; the caller decides when and how to
    /// latch. The heap and indexes use the latched variants below.
    pub fn fetch_page(&self, id: PageId) -> Result<PageFrame> {
        self.frame(id)
    }

    pub fn fetch_page_read(&self, id: PageId) -> Result<PageReadGuard> {
        let frame = self.frame(id)?;
        Ok(RwLock::read_arc(&frame))
    }

    pub fn fetch_page_write(&self, id: PageId) -> Result<PageWriteGuard> {
        let frame = self.frame(id)?;
        Ok(RwLock::write_arc(&frame))
    }

    pub fn num_pages(&self) -> usize {
        self.frames.read().len()
    }

    fn frame(&self, id: PageId) -> Result<Arc<RwLock<PageBuf>>> {
        let frames = self.frames.read();
        match frames.get(id as usize) {
            Some(frame) => Ok(Arc::clone(frame)),
            None => engine_bail!(ErrorKind::Invariant, "page {} was never allocated", id),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
