//! Sub-allocation inside owned regions.
//!
//! An [`Allocator`] owns a ledger of regions and a placement strategy. Each
//! successful [`allocate`](Allocator::allocate) records a slot in the ledger
//! and returns a [`View`] over the new span; [`free`](Allocator::free) retires
//! the slot, which turns every view of the span stale, and hands the bytes
//! back to the strategy.
//!
//! Growth is a single step: when the strategy cannot place a request and the
//! allocator is [`Growth::Growable`], one new region is acquired (doubling
//! the backing capacity, or larger if the request needs it) and the
//! placement is retried once.

use std::fmt;
use std::sync::Arc;

use crate::config::{AllocatorConfig, Growth, MisusePolicy};
use crate::error::{MemoryError, Result};
use crate::id::AllocatorId;
use crate::ledger::{Ledger, LedgerState};
use crate::region::Region;
use crate::span::Span;
use crate::strategy::{Placement, Placer, Strategy};
use crate::view::View;

/// Point-in-time counters of an [`Allocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Regions currently owned.
    pub regions: usize,
    /// Total bytes across owned regions.
    pub capacity_bytes: usize,
    /// Outstanding allocations.
    pub live_allocations: usize,
    /// Requested bytes of outstanding allocations.
    pub live_bytes: usize,
    /// Highest `live_bytes` seen since construction or the last reset.
    pub peak_live_bytes: usize,
    /// Vacated slots parked in pooled size classes.
    pub pooled_free_slots: usize,
    /// Bytes the strategy can still hand out without growing.
    pub free_bytes: usize,
    /// Disjoint free blocks tracked by a free-list (zero for bump).
    pub free_blocks: usize,
}

/// Hands out spans of its regions according to a [`StrategyKind`](crate::config::StrategyKind).
///
/// Mutation takes `&mut self`; wrap the allocator in a
/// [`SharedAllocator`](crate::shared::SharedAllocator) to use it from
/// several threads. Views handed out stay usable from any thread.
///
/// Dropping the allocator releases its regions. Views that outlive it fail
/// with [`MemoryError::UseAfterFree`].
pub struct Allocator {
    config: AllocatorConfig,
    ledger: Arc<Ledger>,
    strategy: Strategy,
    live_allocations: usize,
    live_bytes: usize,
    peak_live_bytes: usize,
}

impl Allocator {
    /// Validate `config` and acquire the first region.
    pub fn new(config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        let region = Region::acquire(config.region_size)?;
        let (base, capacity) = (region.base_address(), region.capacity());
        let id = AllocatorId::next();
        let mut strategy = Strategy::new(config.strategy);
        strategy.add_region(0, base, capacity);
        tracing::debug!(
            allocator = %id,
            strategy = %config.strategy,
            growth = %config.growth,
            capacity,
            "allocator created"
        );
        Ok(Self {
            config,
            ledger: Ledger::new(id, region),
            strategy,
            live_allocations: 0,
            live_bytes: 0,
            peak_live_bytes: 0,
        })
    }

    /// Allocate `size` bytes whose address is a multiple of `align`.
    ///
    /// # Errors
    ///
    /// - `InvalidSize` if `size` is zero.
    /// - `InvalidAlignment` unless `align` is a power of two.
    /// - `UseAfterFree` if the allocator has been closed.
    /// - `OutOfMemory` if the request does not fit and growth is disabled
    ///   or did not help.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<View> {
        if size == 0 {
            return Err(MemoryError::InvalidSize { requested: size });
        }
        if !align.is_power_of_two() {
            return Err(MemoryError::InvalidAlignment { align });
        }
        let span = {
            let mut state = self.ledger.write();
            if state.is_closed() {
                return Err(MemoryError::UseAfterFree);
            }
            let placement = match self.strategy.place(size, align) {
                Some(p) => p,
                None => grow(&self.config, &mut self.strategy, &mut state, size, align)?,
            };
            state.occupy(self.ledger.id(), placement, size)
        };
        self.live_allocations += 1;
        self.live_bytes += size;
        self.peak_live_bytes = self.peak_live_bytes.max(self.live_bytes);
        tracing::trace!(%span, align, "allocate");
        Ok(View::new(Arc::downgrade(&self.ledger), span))
    }

    /// Return an allocation to the strategy.
    ///
    /// Every view of the span, including pieces split off it, turns stale.
    ///
    /// # Errors
    ///
    /// - `ForeignSpan` if another allocator produced the span.
    /// - `DoubleFree` if the span is not outstanding (already freed, or
    ///   made before a reset).
    /// - `UseAfterFree` if the allocator has been closed.
    ///
    /// The first two are subject to the configured [`MisusePolicy`].
    pub fn free(&mut self, span: Span) -> Result<()> {
        // Checked under every policy: a foreign span can match one of ours by
        // slot and generation, and must never reach the ledger.
        if span.allocator() != self.id() {
            return self.misuse(MemoryError::ForeignSpan {
                expected: self.id(),
                found: span.allocator(),
            });
        }
        let vacated = {
            let mut state = self.ledger.write();
            if state.is_closed() {
                return Err(MemoryError::UseAfterFree);
            }
            state.vacate(&span)
        };
        match vacated {
            Ok((placement, len)) => {
                self.strategy.reclaim(placement);
                self.live_allocations -= 1;
                self.live_bytes -= len;
                tracing::trace!(%span, "free");
                Ok(())
            }
            Err(e) => self.misuse(e),
        }
    }

    /// Free the allocation behind `view`.
    pub fn free_view(&mut self, view: View) -> Result<()> {
        self.free(view.span())
    }

    /// Move the contents of `view` into a new allocation of `new_size`
    /// bytes and free the old one.
    ///
    /// The first `min(view.len(), new_size)` bytes are copied; the rest of a
    /// larger allocation reads as whatever the strategy hands out. On
    /// success `view` is replaced by a view of the new allocation; on error
    /// it is left untouched. Resizing never happens in place.
    ///
    /// Only the window of `view` is carried. If `view` is a piece produced by
    /// [`View::split_off`], the whole allocation behind it is freed, so every
    /// sibling piece turns stale and its bytes are not moved.
    pub fn reallocate(&mut self, view: &mut View, new_size: usize, align: usize) -> Result<()> {
        let old = view.span();
        if old.allocator() != self.id() {
            return Err(MemoryError::ForeignSpan {
                expected: self.id(),
                found: old.allocator(),
            });
        }
        if !view.is_live() {
            return Err(MemoryError::UseAfterFree);
        }
        let mut fresh = self.allocate(new_size, align)?;
        let carried = view.len().min(new_size);
        if let Err(e) = fresh.copy_from(view, 0, 0, carried) {
            self.free(fresh.span())?;
            return Err(e);
        }
        self.free(old)?;
        tracing::trace!(from = %old, to = %fresh.span(), carried, "reallocate");
        *view = fresh;
        Ok(())
    }

    /// Free every outstanding allocation at once and rewind the strategy.
    ///
    /// Regions are kept. All views handed out so far turn stale.
    pub fn reset(&mut self) -> Result<()> {
        {
            let mut state = self.ledger.write();
            if state.is_closed() {
                return Err(MemoryError::UseAfterFree);
            }
            state.advance_epoch();
        }
        self.strategy.reset();
        tracing::debug!(
            allocator = %self.id(),
            dropped = self.live_allocations,
            "allocator reset"
        );
        self.clear_counters();
        Ok(())
    }

    /// Release every region. Idempotent.
    ///
    /// All views turn stale and every later operation except `stats` and
    /// `close` reports `UseAfterFree`.
    pub fn close(&mut self) {
        self.ledger.close();
        self.clear_counters();
    }

    /// Whether [`close`](Self::close) has run, directly or via a parent arena.
    pub fn is_closed(&self) -> bool {
        self.ledger.read().is_closed()
    }

    /// Current counters.
    pub fn stats(&self) -> AllocatorStats {
        let state = self.ledger.read();
        let closed = state.is_closed();
        AllocatorStats {
            regions: state.region_count(),
            capacity_bytes: state.capacity(),
            live_allocations: if closed { 0 } else { self.live_allocations },
            live_bytes: if closed { 0 } else { self.live_bytes },
            peak_live_bytes: if closed { 0 } else { self.peak_live_bytes },
            pooled_free_slots: if closed { 0 } else { self.strategy.pooled_free_slots() },
            free_bytes: if closed { 0 } else { self.strategy.free_bytes() },
            free_blocks: if closed { 0 } else { self.strategy.free_blocks() },
        }
    }

    /// Identity recorded in every span this allocator produces.
    pub fn id(&self) -> AllocatorId {
        self.ledger.id()
    }

    /// Configuration the allocator was built with.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub(crate) fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    fn clear_counters(&mut self) {
        self.live_allocations = 0;
        self.live_bytes = 0;
        self.peak_live_bytes = 0;
    }

    fn misuse(&self, err: MemoryError) -> Result<()> {
        match self.config.misuse {
            MisusePolicy::Report => {
                tracing::warn!(allocator = %self.id(), error = %err, "allocator misuse");
                Err(err)
            }
            MisusePolicy::Panic => panic!("allocator {} misuse: {err}", self.id()),
            MisusePolicy::Trust => Ok(()),
        }
    }
}

/// Acquire one more region and retry the placement once.
fn grow(
    config: &AllocatorConfig,
    strategy: &mut Strategy,
    state: &mut LedgerState,
    size: usize,
    align: usize,
) -> Result<Placement> {
    let capacity = state.capacity();
    let exhausted = MemoryError::OutOfMemory {
        requested: size,
        capacity,
    };
    if config.growth == Growth::Fixed {
        return Err(exhausted);
    }
    let needed = strategy
        .footprint(size, align)
        .filter(|&n| n <= Region::MAX_CAPACITY)
        .ok_or_else(|| exhausted.clone())?;
    let grown = capacity.max(needed).min(Region::MAX_CAPACITY);
    let region = match Region::acquire(grown) {
        Ok(region) => region,
        Err(e) => {
            tracing::debug!(error = %e, grown, "growth failed");
            return Err(exhausted);
        }
    };
    let (base, cap) = (region.base_address(), region.capacity());
    let index = state.push_region(region);
    strategy.add_region(index, base, cap);
    tracing::debug!(region = index, capacity = cap, total = capacity + cap, "allocator grew");
    strategy.place(size, align).ok_or(exhausted)
}

impl Drop for Allocator {
    fn drop(&mut self) {
        self.ledger.close();
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("id", &self.id())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
