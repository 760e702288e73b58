//! Shared bookkeeping between an allocator and its views.
//!
//! The [`Ledger`] owns every [`Region`] of one allocator together with the
//! slot table that records, per allocation slot, the current generation and
//! the placement of the live allocation (if any). The allocator holds the
//! ledger through an `Arc`; views hold it through a `Weak`, so a view never
//! keeps memory alive on its own.
//!
//! A span is live iff
//! - the ledger is not closed,
//! - the span's epoch equals the ledger epoch (no `reset()`/`close()` since),
//! - the span's generation equals its slot's generation (no `free` since),
//! - its region has not been released.

use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;

use crate::error::{MemoryError, Result};
use crate::id::AllocatorId;
use crate::region::Region;
use crate::span::Span;
use crate::strategy::Placement;

/// One entry of the slot table.
#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    /// `Some` while an allocation occupies the slot.
    placement: Option<Placement>,
    /// Requested length of the occupying allocation.
    len: usize,
}

/// Mutable ledger contents, guarded by [`Ledger::write`].
pub(crate) struct LedgerState {
    regions: Vec<Option<Region>>,
    slots: Vec<Slot>,
    /// Vacant slots available for reuse.
    free_slots: Vec<u32>,
    epoch: u64,
    closed: bool,
    /// Ledgers of nested arenas, closed before this one.
    children: SmallVec<[Weak<Ledger>; 4]>,
}

/// Region table and slot generations of one allocator.
pub(crate) struct Ledger {
    id: AllocatorId,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Create a ledger owning `first` as region 0.
    pub(crate) fn new(id: AllocatorId, first: Region) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: RwLock::new(LedgerState {
                regions: vec![Some(first)],
                slots: Vec::new(),
                free_slots: Vec::new(),
                epoch: 0,
                closed: false,
                children: SmallVec::new(),
            }),
        })
    }

    pub(crate) fn id(&self) -> AllocatorId {
        self.id
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write()
    }

    /// Register a nested ledger to be closed together with this one.
    pub(crate) fn adopt(&self, child: &Arc<Ledger>) {
        let mut state = self.write();
        state.children.retain(|c| c.strong_count() > 0);
        state.children.push(Arc::downgrade(child));
    }

    /// Close every live descendant, then this ledger.
    ///
    /// Children are collected under the lock and closed after it is dropped,
    /// so no two ledger locks are ever held at once.
    pub(crate) fn close(&self) {
        let children: SmallVec<[Weak<Ledger>; 4]> = {
            let mut state = self.write();
            if state.closed {
                return;
            }
            std::mem::take(&mut state.children)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.close();
        }
        self.write().close(self.id);
    }
}

impl LedgerState {
    /// Resolve the region behind a live span.
    pub(crate) fn check(&self, span: &Span) -> Result<&Region> {
        if self.closed || span.epoch != self.epoch {
            return Err(MemoryError::UseAfterFree);
        }
        match self.slots.get(span.slot as usize) {
            Some(slot) if slot.generation == span.generation && slot.placement.is_some() => self
                .regions
                .get(span.region as usize)
                .and_then(Option::as_ref)
                .ok_or(MemoryError::UseAfterFree),
            _ => Err(MemoryError::UseAfterFree),
        }
    }

    /// Record a new allocation and mint its span.
    pub(crate) fn occupy(&mut self, id: AllocatorId, placement: Placement, len: usize) -> Span {
        let slot = match self.free_slots.pop() {
            Some(index) => {
                let entry = &mut self.slots[index as usize];
                entry.placement = Some(placement);
                entry.len = len;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    placement: Some(placement),
                    len,
                });
                (self.slots.len() - 1) as u32
            }
        };
        Span {
            allocator: id,
            slot,
            generation: self.slots[slot as usize].generation,
            epoch: self.epoch,
            region: placement.region,
            offset: placement.offset,
            len,
        }
    }

    /// Retire a live allocation and return its placement together with the
    /// length recorded when it was made.
    ///
    /// The slot's generation advances so every outstanding view of the span
    /// turns stale. A slot whose generation is exhausted is never reused.
    pub(crate) fn vacate(&mut self, span: &Span) -> Result<(Placement, usize)> {
        if span.epoch != self.epoch {
            return Err(MemoryError::DoubleFree);
        }
        let slot = self
            .slots
            .get_mut(span.slot as usize)
            .filter(|s| s.generation == span.generation)
            .ok_or(MemoryError::DoubleFree)?;
        let placement = slot.placement.take().ok_or(MemoryError::DoubleFree)?;
        if slot.generation == u32::MAX {
            tracing::debug!(slot = span.slot, "slot generation exhausted, retiring slot");
        } else {
            slot.generation += 1;
            self.free_slots.push(span.slot);
        }
        Ok((placement, slot.len))
    }

    /// Invalidate every outstanding span at once.
    pub(crate) fn advance_epoch(&mut self) {
        self.epoch += 1;
        self.slots.clear();
        self.free_slots.clear();
    }

    /// Add a region and return its index.
    pub(crate) fn push_region(&mut self, region: Region) -> u32 {
        self.regions.push(Some(region));
        (self.regions.len() - 1) as u32
    }

    /// Total capacity of live regions in bytes.
    pub(crate) fn capacity(&self) -> usize {
        self.regions.iter().flatten().map(Region::capacity).sum()
    }

    /// Number of live regions.
    pub(crate) fn region_count(&self) -> usize {
        self.regions.iter().flatten().count()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self, id: AllocatorId) {
        if self.closed {
            return;
        }
        self.advance_epoch();
        self.closed = true;
        let mut released = 0usize;
        for mut region in self.regions.iter_mut().filter_map(Option::take) {
            released += region.capacity();
            if let Err(e) = region.release() {
                tracing::warn!(allocator = %id, error = %e, "region release failed");
            }
        }
        tracing::debug!(allocator = %id, released, "ledger closed");
    }
}
