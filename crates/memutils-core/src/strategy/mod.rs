//! Placement strategies.
//!
//! A strategy decides where inside the allocator's regions a request goes.
//! It never touches memory and never sees spans or generations: it works
//! purely in `(region, offset)` coordinates and is told about each region's
//! base address so that alignment can be satisfied on absolute addresses.
//!
//! The set of strategies is closed. [`Strategy`] dispatches over the three
//! implementations of [`Placer`]:
//!
//! - [`Bump`]: cursor per region, no reuse until reset.
//! - [`FreeList`]: ordered free blocks, first- or best-fit, coalescing.
//! - [`Pooled`]: power-of-two slot stacks over a backing [`FreeList`].

mod bump;
mod freelist;
mod pooled;

pub(crate) use bump::Bump;
pub(crate) use freelist::FreeList;
pub(crate) use pooled::Pooled;

use crate::config::StrategyKind;

/// Where an allocation was placed, and how much it consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Placement {
    /// Region index.
    pub(crate) region: u32,
    /// Byte offset of the first usable byte within the region.
    pub(crate) offset: usize,
    /// Bytes held by the strategy on behalf of this allocation.
    pub(crate) reserved: usize,
    /// Pool size-class index, if the allocation came from a pool.
    pub(crate) class: Option<u8>,
}

/// The operations every strategy provides.
pub(crate) trait Placer {
    /// Make a new region available for placement.
    fn add_region(&mut self, index: u32, base: usize, capacity: usize);

    /// Find room for `size` bytes whose absolute address is a multiple of
    /// `align` (a power of two). `None` means the regions are exhausted.
    fn place(&mut self, size: usize, align: usize) -> Option<Placement>;

    /// Take back a placement previously returned by [`place`](Self::place).
    fn reclaim(&mut self, placement: Placement);

    /// Forget every placement; all region bytes become available again.
    fn reset(&mut self);

    /// Capacity a fresh region needs so that `place(size, align)` is
    /// guaranteed to succeed in it. `None` on arithmetic overflow.
    fn footprint(&self, size: usize, align: usize) -> Option<usize> {
        size.checked_add(align - 1)
    }
}

/// Strategy selected at allocator construction.
pub(crate) enum Strategy {
    Bump(Bump),
    FreeList(FreeList),
    Pooled(Pooled),
}

impl Strategy {
    pub(crate) fn new(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Bump => Self::Bump(Bump::new()),
            StrategyKind::FreeList { fit } => Self::FreeList(FreeList::new(fit)),
            StrategyKind::Pooled {
                min_class,
                max_class,
            } => Self::Pooled(Pooled::new(min_class, max_class)),
        }
    }

    /// Slots parked in pool free stacks (zero for non-pooled strategies).
    pub(crate) fn pooled_free_slots(&self) -> usize {
        match self {
            Self::Pooled(p) => p.free_slots(),
            _ => 0,
        }
    }

    /// Bytes the strategy can still hand out without growing.
    pub(crate) fn free_bytes(&self) -> usize {
        match self {
            Self::Bump(b) => b.free_bytes(),
            Self::FreeList(f) => f.free_bytes(),
            Self::Pooled(p) => p.free_bytes(),
        }
    }

    /// Number of disjoint free blocks, a fragmentation measure.
    pub(crate) fn free_blocks(&self) -> usize {
        match self {
            Self::Bump(_) => 0,
            Self::FreeList(f) => f.block_count(),
            Self::Pooled(p) => p.backing().block_count(),
        }
    }
}

impl Placer for Strategy {
    fn add_region(&mut self, index: u32, base: usize, capacity: usize) {
        match self {
            Self::Bump(s) => s.add_region(index, base, capacity),
            Self::FreeList(s) => s.add_region(index, base, capacity),
            Self::Pooled(s) => s.add_region(index, base, capacity),
        }
    }

    #[inline]
    fn place(&mut self, size: usize, align: usize) -> Option<Placement> {
        match self {
            Self::Bump(s) => s.place(size, align),
            Self::FreeList(s) => s.place(size, align),
            Self::Pooled(s) => s.place(size, align),
        }
    }

    #[inline]
    fn reclaim(&mut self, placement: Placement) {
        match self {
            Self::Bump(s) => s.reclaim(placement),
            Self::FreeList(s) => s.reclaim(placement),
            Self::Pooled(s) => s.reclaim(placement),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Bump(s) => s.reset(),
            Self::FreeList(s) => s.reset(),
            Self::Pooled(s) => s.reset(),
        }
    }

    fn footprint(&self, size: usize, align: usize) -> Option<usize> {
        match self {
            Self::Bump(s) => s.footprint(size, align),
            Self::FreeList(s) => s.footprint(size, align),
            Self::Pooled(s) => s.footprint(size, align),
        }
    }
}

/// Offset (relative to `base`) of the first address at or after
/// `base + offset` that is a multiple of `align`.
#[inline]
pub(crate) fn aligned_offset(base: usize, offset: usize, align: usize) -> Option<usize> {
    let addr = base.checked_add(offset)?;
    let aligned = addr.checked_add(align - 1)? & !(align - 1);
    Some(aligned - base)
}
