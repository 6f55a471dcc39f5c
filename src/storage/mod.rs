//! # Storage Layer
//!
//! The storage layer provides the paged substrate the table heap is built
//! on. Disk I/O, the replacement policy, and recovery belong to an external
//! collaborator; what lives here is the contract the executor core needs:
//!
//! - [`buffer`]: an in-memory buffer pool handing out latched page guards
//! - [`page`]: the slotted table-page layout (header, slot directory,
//!   payloads growing from the tail)
//! - [`tuple`]: binary tuple encoding, record identifiers, per-slot metadata
//! - [`heap`]: the linked-page table heap and its forward iterators
//!
//! ## Page Layout
//!
//! ```text
//! +--------------------+
//! | Header (8 bytes)   |  next_page_id, tuple_count, deleted_count
//! +--------------------+
//! | Slot Directory     |  20 bytes per slot: payload offset and length
//! |                    |  plus the 16-byte tuple meta; grows forward
//! +--------------------+
//! | Free Space         |
//! +--------------------+
//! | Tuple Payloads     |  grows backward from the page tail
//! +--------------------+
//! ```
//!
//! Slots are never compacted: a deleted tuple keeps its slot and payload,
//! only the tombstone bit in the slot's metadata flips. Slot counts are
//! therefore monotonically non-decreasing, which keeps RIDs stable for the
//! lifetime of the heap.

pub mod buffer;
pub mod heap;
pub mod page;
pub mod tuple;

pub use buffer::{BufferPool, PageReadGuard, PageWriteGuard};
pub use heap::{TableHeap, TableIter};
pub use tuple::{Rid, Tuple, TupleMeta};

/// Page identifier within a buffer pool.
pub type PageId = u32;

/// Sentinel for "no page".
pub const INVALID_PAGE_ID: PageId = u32::MAX;

/// Fixed page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Bytes reserved for the table-page header.
pub const PAGE_HEADER_SIZE: usize = 8;

/// Bytes per slot-directory entry: offset (2) + length (2) + the 16-byte
/// tuple metadata.
pub const SLOT_SIZE: usize = 20;
