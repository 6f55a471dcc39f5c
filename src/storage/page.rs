//! # Slotted Table Page
//!
//! Every table page begins with an 8-byte header followed by the slot
//! directory. Tuple payloads grow backward from the page tail; the space
//! between the last slot entry and the lowest payload offset is free.
//!
//! ## Header Layout (8 bytes)
//!
//! ```text
//! Offset  Size  Field          Description
//! ------  ----  -------------  -------------------------------------
//! 0       4     next_page_id   Successor page (INVALID_PAGE_ID if last)
//! 4       2     tuple_count    Number of slots, never decreases
//! 6       2     deleted_count  Number of tombstoned slots
//! ```
//!
//! ## Slot Layout (20 bytes)
//!
//! ```text
//! Offset  Size  Field     Description
//! ------  ----  --------  ------------------------------------
//! 0       2     offset    Payload offset within the page
//! 2       2     len       Payload length in bytes
//! 4       8     ts        Tuple timestamp (MVCC collaborator)
//! 12      8     flags     Bit 0: tombstone
//! ```
//!
//! The slot carries the 16-byte tuple metadata (`ts` + `flags`) inline,
//! so flipping a tombstone touches only the directory, never the payload
//! area. Headers and slots transmute from page bytes via `zerocopy`; all
//! multi-byte fields are little-endian.

use super::tuple::TupleMeta;
use super::{INVALID_PAGE_ID, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_SIZE};
use crate::engine_bail;
use crate::error::ErrorKind;
use crate::zerocopy_accessors;
use eyre::Result;
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const FLAG_DELETED: u64 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TablePageHeader {
    next_page_id: U32,
    tuple_count: U16,
    deleted_count: U16,
}

impl TablePageHeader {
    zerocopy_accessors! {
        next_page_id: u32,
        tuple_count: u16,
        deleted_count: u16,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TupleSlot {
    offset: U16,
    len: U16,
    ts: U64,
    flags: U64,
}

impl TupleSlot {
    zerocopy_accessors! {
        offset: u16,
        len: u16,
        ts: u64,
        flags: u64,
    }

    pub fn meta(&self) -> TupleMeta {
        TupleMeta {
            ts: self.ts(),
            is_deleted: self.flags() & FLAG_DELETED != 0,
        }
    }

    fn set_meta(&mut self, meta: &TupleMeta) {
        self.set_ts(meta.ts);
        let mut flags = self.flags() & !FLAG_DELETED;
        if meta.is_deleted {
            flags |= FLAG_DELETED;
        }
        self.set_flags(flags);
    }
}

/// Read-only view over one page frame.
pub struct TablePage<'a> {
    data: &'a [u8],
}

impl<'a> TablePage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    fn header(&self) -> &TablePageHeader {
        TablePageHeader::ref_from_bytes(&self.data[..PAGE_HEADER_SIZE])
            .expect("page header layout")
    }

    pub fn next_page_id(&self) -> u32 {
        self.header().next_page_id()
    }

    pub fn tuple_count(&self) -> u16 {
        self.header().tuple_count()
    }

    pub fn deleted_count(&self) -> u16 {
        self.header().deleted_count()
    }

    fn slot(&self, idx: u16) -> Result<&TupleSlot> {
        if idx >= self.tuple_count() {
            engine_bail!(
                ErrorKind::Invariant,
                "slot {} out of range (page holds {})",
                idx,
                self.tuple_count()
            );
        }
        let start = PAGE_HEADER_SIZE + idx as usize * SLOT_SIZE;
        Ok(TupleSlot::ref_from_bytes(&self.data[start..start + SLOT_SIZE])
            .expect("slot layout"))
    }

    pub fn tuple_meta(&self, slot_idx: u16) -> Result<TupleMeta> {
        Ok(self.slot(slot_idx)?.meta())
    }

    /// Returns the metadata and payload bytes of the tuple in `slot_idx`.
    pub fn tuple(&self, slot_idx: u16) -> Result<(TupleMeta, &'a [u8])> {
        let slot = self.slot(slot_idx)?;
        let (offset, len) = (slot.offset() as usize, slot.len() as usize);
        Ok((slot.meta(), &self.data[offset..offset + len]))
    }
}

/// Mutable view over one page frame.
pub struct TablePageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> TablePageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn as_page(&self) -> TablePage<'_> {
        TablePage::new(self.data)
    }

    fn header_mut(&mut self) -> &mut TablePageHeader {
        TablePageHeader::mut_from_bytes(&mut self.data[..PAGE_HEADER_SIZE])
            .expect("page header layout")
    }

    fn slot_mut(&mut self, idx: u16) -> Result<&mut TupleSlot> {
        if idx >= self.as_page().tuple_count() {
            engine_bail!(
                ErrorKind::Invariant,
                "slot {} out of range (page holds {})",
                idx,
                self.as_page().tuple_count()
            );
        }
        let start = PAGE_HEADER_SIZE + idx as usize * SLOT_SIZE;
        Ok(
            TupleSlot::mut_from_bytes(&mut self.data[start..start + SLOT_SIZE])
                .expect("slot layout"),
        )
    }

    /// Prepares a freshly allocated frame as an empty table page.
    pub fn init(&mut self) {
        let header = self.header_mut();
        header.set_next_page_id(INVALID_PAGE_ID);
        header.set_tuple_count(0);
        header.set_deleted_count(0);
    }

    pub fn set_next_page_id(&mut self, id: u32) {
        self.header_mut().set_next_page_id(id);
    }

    /// Payload offset a tuple of `len` bytes would occupy, or `None` when
    /// the page cannot fit another slot plus the payload.
    pub fn next_tuple_offset(&self, len: usize) -> Option<u16> {
        let page = self.as_page();
        let count = page.tuple_count();
        let payload_start = if count == 0 {
            PAGE_SIZE
        } else {
            // Payloads descend, so the latest slot holds the low watermark.
            page.slot(count - 1).ok()?.offset() as usize
        };
        let offset = payload_start.checked_sub(len)?;
        let directory_end = PAGE_HEADER_SIZE + (count as usize + 1) * SLOT_SIZE;
        if offset < directory_end {
            return None;
        }
        Some(offset as u16)
    }

    /// Appends a tuple, returning its slot index, or `None` when full.
    pub fn insert_tuple(&mut self, meta: &TupleMeta, payload: &[u8]) -> Option<u16> {
        let offset = self.next_tuple_offset(payload.len())?;
        let idx = self.as_page().tuple_count();

        self.data[offset as usize..offset as usize + payload.len()].copy_from_slice(payload);

        let start = PAGE_HEADER_SIZE + idx as usize * SLOT_SIZE;
        let slot = TupleSlot::mut_from_bytes(&mut self.data[start..start + SLOT_SIZE])
            .expect("slot layout");
        slot.set_offset(offset);
        slot.set_len(payload.len() as u16);
        slot.set_flags(0);
        slot.set_meta(meta);

        let deleted = meta.is_deleted;
        let header = self.header_mut();
        header.set_tuple_count(idx + 1);
        if deleted {
            let d = header.deleted_count();
            header.set_deleted_count(d + 1);
        }
        Some(idx)
    }

    pub fn update_tuple_meta(&mut self, meta: &TupleMeta, slot_idx: u16) -> Result<()> {
        let was_deleted = {
            let slot = self.slot_mut(slot_idx)?;
            let was = slot.meta().is_deleted;
            slot.set_meta(meta);
            was
        };
        if !was_deleted && meta.is_deleted {
            let header = self.header_mut();
            let d = header.deleted_count();
            header.set_deleted_count(d + 1);
        } else if was_deleted && !meta.is_deleted {
            let header = self.header_mut();
            let d = header.deleted_count();
            header.set_deleted_count(d.saturating_sub(1));
        }
        Ok(())
    }

    /// Overwrites a tuple's payload without moving it. The replacement must
    /// have exactly the stored length; growing a tuple is delete-then-insert
    /// at the heap level.
    pub fn update_tuple_in_place(
        &mut self,
        meta: &TupleMeta,
        payload: &[u8],
        slot_idx: u16,
    ) -> Result<()> {
        let (offset, len) = {
            let slot = self.slot_mut(slot_idx)?;
            (slot.offset() as usize, slot.len() as usize)
        };
        if payload.len() != len {
            engine_bail!(
                ErrorKind::Invariant,
                "in-place update changed payload size ({} -> {})",
                len,
                payload.len()
            );
        }
        self.data[offset..offset + len].copy_from_slice(payload);
        self.update_tuple_meta(meta, slot_idx)
    }
}
