//! Scoped allocation with bulk release.
//!
//! An [`Arena`] owns one [`Allocator`] and remembers every span it handed
//! out. [`close`](Arena::close) invalidates all of them in a single epoch
//! step and releases the backing regions; views that survive the arena
//! report [`MemoryError::UseAfterFree`].
//!
//! Arenas nest. A [`child`](Arena::child) arena has its own regions but is
//! registered with its parent, and closing the parent closes every live
//! descendant first.
//!
//! ```
//! use memutils_core::{Arena, AllocatorConfig, MemoryError};
//!
//! let mut arena = Arena::create(AllocatorConfig::default())?;
//! let mut view = arena.allocate(8, 8)?;
//! view.write_u64(0, 1)?;
//! arena.close();
//! assert_eq!(view.read_u64(0), Err(MemoryError::UseAfterFree));
//! arena.close(); // no-op
//! # Ok::<(), MemoryError>(())
//! ```

use indexmap::IndexSet;

use crate::allocator::{Allocator, AllocatorStats};
use crate::config::AllocatorConfig;
use crate::error::{MemoryError, Result};
use crate::id::AllocatorId;
use crate::span::Span;
use crate::view::View;

/// Lifetime scope for a group of allocations.
///
/// Dropping the arena closes it.
#[derive(Debug)]
pub struct Arena {
    allocator: Allocator,
    /// Spans handed out since creation or the last reset, in allocation order.
    vended: IndexSet<Span>,
}

impl Arena {
    /// Create an arena backed by a new allocator built from `config`.
    pub fn create(config: AllocatorConfig) -> Result<Self> {
        Ok(Self {
            allocator: Allocator::new(config)?,
            vended: IndexSet::new(),
        })
    }

    /// Allocate through the arena's allocator and record the span.
    ///
    /// Fails with `UseAfterFree` once the arena is closed.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<View> {
        let view = self.allocator.allocate(size, align)?;
        self.vended.insert(view.span());
        Ok(view)
    }

    /// Free one allocation before the arena closes.
    pub fn free(&mut self, span: Span) -> Result<()> {
        self.allocator.free(span)?;
        self.vended.shift_remove(&span);
        Ok(())
    }

    /// Create a nested arena with this arena's configuration.
    ///
    /// The child is closed no later than its parent.
    pub fn child(&self) -> Result<Arena> {
        if self.is_closed() {
            return Err(MemoryError::UseAfterFree);
        }
        let child = Arena::create(*self.allocator.config())?;
        self.allocator.ledger().adopt(child.allocator.ledger());
        tracing::debug!(parent = %self.id(), child = %child.id(), "child arena created");
        Ok(child)
    }

    /// Invalidate every vended view and release the backing regions,
    /// closing live child arenas first. Idempotent.
    pub fn close(&mut self) {
        if self.is_closed() {
            self.vended.clear();
            return;
        }
        let allocations = self.vended.len();
        self.allocator.close();
        self.vended.clear();
        tracing::debug!(arena = %self.id(), allocations, "arena closed");
    }

    /// Invalidate every vended view but keep the regions for reuse.
    pub fn reset(&mut self) -> Result<()> {
        self.allocator.reset()?;
        self.vended.clear();
        Ok(())
    }

    /// Whether the arena, or an ancestor, has been closed.
    pub fn is_closed(&self) -> bool {
        self.allocator.is_closed()
    }

    /// Outstanding spans in allocation order. Empty once closed.
    pub fn spans(&self) -> impl ExactSizeIterator<Item = Span> + '_ {
        self.vended
            .iter()
            .copied()
            .take(self.allocation_count())
    }

    /// Number of outstanding allocations.
    pub fn allocation_count(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.vended.len()
        }
    }

    /// Requested bytes across outstanding allocations.
    pub fn allocated_bytes(&self) -> usize {
        self.spans().map(|s| s.len()).sum()
    }

    /// Counters of the underlying allocator.
    pub fn stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    /// Identity recorded in every span this arena vends.
    pub fn id(&self) -> AllocatorId {
        self.allocator.id()
    }
}
