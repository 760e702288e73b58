//! Allocator identity.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counter for unique [`AllocatorId`] allocation.
static ALLOCATOR_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Unique per-instance identifier for an allocator.
///
/// Drawn from a process-wide monotonic counter, so a span can always be
/// traced back to the allocator that produced it, even after that allocator
/// has been dropped and another one created in its place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocatorId(u32);

impl AllocatorId {
    /// Allocate a fresh, unique id.
    pub fn next() -> Self {
        Self(ALLOCATOR_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AllocatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = AllocatorId::next();
        let b = AllocatorId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
