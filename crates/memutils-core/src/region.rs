//! Contiguous blocks of raw memory.
//!
//! A [`Region`] is the fundamental storage unit: one zero-initialised block
//! obtained from the global allocator with a fixed capacity. Regions are
//! never resized. They are released exactly once, either explicitly through
//! [`Region::release`] or when dropped.

use std::alloc::Layout;
use std::cmp::Ordering;
use std::fmt;
use std::ptr::NonNull;

use crate::error::{MemoryError, Result};
use crate::raw;

/// A single contiguous block of raw memory.
pub struct Region {
    /// Start of the block. Dangling once released.
    base: NonNull<u8>,
    /// Layout passed to the global allocator.
    layout: Layout,
    released: bool,
}

// SAFETY: `Region` exclusively owns its block, like `Box<[u8]>`. Byte access
// is crate-private and serialised against release by the ledger lock.
#[allow(unsafe_code)]
unsafe impl Send for Region {}

// SAFETY: the public `&self` API only exposes addresses and capacity.
#[allow(unsafe_code)]
unsafe impl Sync for Region {}

impl Region {
    /// Alignment of every region's base address.
    pub const BASE_ALIGN: usize = 64;

    /// Largest capacity accepted by [`Region::acquire`].
    pub const MAX_CAPACITY: usize = isize::MAX as usize - (Self::BASE_ALIGN - 1);

    /// Obtain a zeroed region of `capacity` bytes.
    ///
    /// Fails with `InvalidSize` for zero or oversized requests and with
    /// `OutOfMemory` if the global allocator cannot satisfy the request.
    #[allow(unsafe_code)]
    pub fn acquire(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > Self::MAX_CAPACITY {
            return Err(MemoryError::InvalidSize {
                requested: capacity,
            });
        }
        let layout = Layout::from_size_align(capacity, Self::BASE_ALIGN).map_err(|_| {
            MemoryError::InvalidSize {
                requested: capacity,
            }
        })?;
        // SAFETY: capacity is non-zero, checked above.
        let base = unsafe { raw::alloc_zeroed(layout) }.ok_or(MemoryError::OutOfMemory {
            requested: capacity,
            capacity: 0,
        })?;
        tracing::debug!(capacity, base = base.as_ptr() as usize, "region acquired");
        Ok(Self {
            base,
            layout,
            released: false,
        })
    }

    /// Return the memory to the environment.
    ///
    /// A second call reports `DoubleRelease` and does nothing else.
    #[allow(unsafe_code)]
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(MemoryError::DoubleRelease);
        }
        // SAFETY: `base` came from `alloc_zeroed(self.layout)` and the flag
        // guarantees this runs once.
        unsafe { raw::dealloc(self.base, self.layout) };
        self.released = true;
        self.base = NonNull::dangling();
        tracing::debug!(capacity = self.layout.size(), "region released");
        Ok(())
    }

    /// Address of the byte at `offset`.
    pub fn address_of(&self, offset: usize) -> Result<NonNull<u8>> {
        self.ptr_at(offset, 1)
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Whether [`release`](Self::release) has run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Numeric address of the first byte.
    pub fn base_address(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Pointer to `offset` after checking that the non-empty range
    /// `offset..offset + len` lies inside the live region.
    fn ptr_at(&self, offset: usize, len: usize) -> Result<NonNull<u8>> {
        if self.released {
            return Err(MemoryError::UseAfterFree);
        }
        let out_of_bounds = MemoryError::OutOfBounds {
            offset,
            len,
            bound: self.capacity(),
        };
        match offset.checked_add(len) {
            // In bounds: offset < capacity, so the sum cannot wrap to null.
            Some(end) if len > 0 && end <= self.capacity() => {
                NonNull::new(self.base.as_ptr().wrapping_add(offset)).ok_or(out_of_bounds)
            }
            _ => Err(out_of_bounds),
        }
    }
}

// ── Byte access ─────────────────────────────────────────────────────
//
// Crate-private. Callers (views) hold the ledger read lock and own the only
// live view over the touched range, which rules out concurrent writers.

#[allow(unsafe_code)]
impl Region {
    pub(crate) fn load(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let src = self.ptr_at(offset, dst.len())?;
        // SAFETY: range checked by `ptr_at`; no concurrent writer (see above).
        unsafe { raw::load(src, dst) };
        Ok(())
    }

    pub(crate) fn store(&self, offset: usize, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let dst = self.ptr_at(offset, src.len())?;
        // SAFETY: range checked by `ptr_at`; the calling view is the only
        // live view over it.
        unsafe { raw::store(dst, src) };
        Ok(())
    }

    pub(crate) fn fill(&self, offset: usize, len: usize, byte: u8) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let dst = self.ptr_at(offset, len)?;
        // SAFETY: as for `store`.
        unsafe { raw::fill(dst, len, byte) };
        Ok(())
    }

    pub(crate) fn copy_into(
        &self,
        src_offset: usize,
        dst: &Region,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let src = self.ptr_at(src_offset, len)?;
        let dst = dst.ptr_at(dst_offset, len)?;
        // SAFETY: both ranges checked; `raw::copy` tolerates overlap.
        unsafe { raw::copy(src, dst, len) };
        Ok(())
    }

    pub(crate) fn compare(
        &self,
        offset: usize,
        other: &Region,
        other_offset: usize,
        len: usize,
    ) -> Result<Ordering> {
        if len == 0 {
            return Ok(Ordering::Equal);
        }
        let a = self.ptr_at(offset, len)?;
        let b = other.ptr_at(other_offset, len)?;
        // SAFETY: both ranges checked; callers hold shared access only.
        Ok(unsafe { raw::compare(a, b, len) })
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if !self.released {
            // Cannot fail: the flag was checked.
            let _ = self.release();
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("base", &format_args!("{:#x}", self.base_address()))
            .field("capacity", &self.capacity())
            .field("released", &self.released)
            .finish()
    }
}
