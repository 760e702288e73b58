//! Synchronized handles for use across threads.
//!
//! [`Allocator`] and [`Arena`] mutate through `&mut self`. The wrappers
//! here put them behind `Arc<Mutex<_>>` so that clones can be handed to
//! several threads. Views returned by either wrapper are independent of the
//! mutex and can be moved to any thread.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::allocator::{Allocator, AllocatorStats};
use crate::arena::Arena;
use crate::config::AllocatorConfig;
use crate::error::Result;
use crate::id::AllocatorId;
use crate::span::Span;
use crate::view::View;

/// Cloneable, thread-safe handle to one [`Allocator`].
#[derive(Clone, Debug)]
pub struct SharedAllocator {
    inner: Arc<Mutex<Allocator>>,
}

impl SharedAllocator {
    /// Build a new allocator from `config` and wrap it.
    pub fn new(config: AllocatorConfig) -> Result<Self> {
        Ok(Self::from(Allocator::new(config)?))
    }

    /// See [`Allocator::allocate`].
    pub fn allocate(&self, size: usize, align: usize) -> Result<View> {
        self.inner.lock().allocate(size, align)
    }

    /// See [`Allocator::free`].
    pub fn free(&self, span: Span) -> Result<()> {
        self.inner.lock().free(span)
    }

    /// See [`Allocator::reallocate`].
    pub fn reallocate(&self, view: &mut View, new_size: usize, align: usize) -> Result<()> {
        self.inner.lock().reallocate(view, new_size, align)
    }

    /// See [`Allocator::reset`].
    pub fn reset(&self) -> Result<()> {
        self.inner.lock().reset()
    }

    /// See [`Allocator::close`].
    pub fn close(&self) {
        self.inner.lock().close();
    }

    /// See [`Allocator::is_closed`].
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closed()
    }

    /// See [`Allocator::stats`].
    pub fn stats(&self) -> AllocatorStats {
        self.inner.lock().stats()
    }

    /// See [`Allocator::id`].
    pub fn id(&self) -> AllocatorId {
        self.inner.lock().id()
    }

    /// Run `f` with exclusive access, for sequences that must not interleave
    /// with other threads.
    pub fn with<R>(&self, f: impl FnOnce(&mut Allocator) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<Allocator> for SharedAllocator {
    fn from(allocator: Allocator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }
}

/// Cloneable, thread-safe handle to one [`Arena`].
#[derive(Clone, Debug)]
pub struct SharedArena {
    inner: Arc<Mutex<Arena>>,
}

impl SharedArena {
    /// Create a new arena from `config` and wrap it.
    pub fn create(config: AllocatorConfig) -> Result<Self> {
        Ok(Self::from(Arena::create(config)?))
    }

    /// See [`Arena::allocate`].
    pub fn allocate(&self, size: usize, align: usize) -> Result<View> {
        self.inner.lock().allocate(size, align)
    }

    /// See [`Arena::free`].
    pub fn free(&self, span: Span) -> Result<()> {
        self.inner.lock().free(span)
    }

    /// See [`Arena::child`]. The child gets its own lock.
    pub fn child(&self) -> Result<SharedArena> {
        Ok(Self::from(self.inner.lock().child()?))
    }

    /// See [`Arena::close`].
    pub fn close(&self) {
        self.inner.lock().close();
    }

    /// See [`Arena::reset`].
    pub fn reset(&self) -> Result<()> {
        self.inner.lock().reset()
    }

    /// See [`Arena::is_closed`].
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closed()
    }

    /// See [`Arena::allocation_count`].
    pub fn allocation_count(&self) -> usize {
        self.inner.lock().allocation_count()
    }

    /// See [`Arena::stats`].
    pub fn stats(&self) -> AllocatorStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut Arena) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<Arena> for SharedArena {
    fn from(arena: Arena) -> Self {
        Self {
            inner: Arc::new(Mutex::new(arena)),
        }
    }
}
