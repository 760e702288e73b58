//! Allocation receipts.
//!
//! A [`Span`] names one allocation: which allocator produced it, where it
//! lives, and which slot generation and ledger epoch it was born in. Spans
//! are plain `Copy` values and grant no access to memory; they exist so an
//! allocation can be freed and so staleness can be checked in O(1) without a
//! lookup table.

use std::fmt;

use crate::id::AllocatorId;

/// Location and identity of one allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct Span {
    pub(crate) allocator: AllocatorId,
    /// Index into the ledger's slot table.
    pub(crate) slot: u32,
    /// Slot generation when this allocation was made.
    pub(crate) generation: u32,
    /// Ledger epoch when this allocation was made.
    pub(crate) epoch: u64,
    /// Index of the backing region.
    pub(crate) region: u32,
    /// Byte offset within the region.
    pub(crate) offset: usize,
    /// Requested length in bytes.
    pub(crate) len: usize,
}

impl Span {
    /// The allocator that produced this span.
    pub fn allocator(&self) -> AllocatorId {
        self.allocator
    }

    /// Index of the backing region within its allocator.
    pub fn region(&self) -> u32 {
        self.region
    }

    /// Byte offset within the region.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the span covers no bytes. Allocators never produce these.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte offset.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Slot generation recorded at allocation time.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether both spans cover at least one common byte of the same region.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.allocator == other.allocator
            && self.region == other.region
            && !self.is_empty()
            && !other.is_empty()
            && self.offset < other.end()
            && other.offset < self.end()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Span(alloc={}, region={}, off={}, len={}, gen={})",
            self.allocator, self.region, self.offset, self.len, self.generation
        )
    }
}
