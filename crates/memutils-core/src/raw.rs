//! Low-level primitives for raw region memory.
//!
//! This is the only module (together with the `Send`/`Sync` impls in
//! `region.rs`) allowed to contain `unsafe` code. Every function is a thin
//! wrapper over one `std::alloc` or `std::ptr` primitive with its contract
//! stated in a `# Safety` section. Callers obtain pointers exclusively from
//! [`Region::ptr_at`](crate::region::Region) after bounds and liveness checks.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cmp::Ordering;
use std::ptr::NonNull;

/// Request zeroed memory from the global allocator.
///
/// Returns `None` if the allocator reports exhaustion.
///
/// # Safety
///
/// `layout` must have a non-zero size.
pub(crate) unsafe fn alloc_zeroed(layout: Layout) -> Option<NonNull<u8>> {
    // SAFETY: caller guarantees a non-zero layout size.
    NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
}

/// Return memory to the global allocator.
///
/// # Safety
///
/// `ptr` must have been produced by [`alloc_zeroed`] with the same `layout`
/// and must not be used afterwards.
pub(crate) unsafe fn dealloc(ptr: NonNull<u8>, layout: Layout) {
    // SAFETY: forwarded caller contract.
    unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
}

/// Copy `dst.len()` bytes starting at `src` into `dst`.
///
/// # Safety
///
/// `src..src + dst.len()` must lie inside one live region and must not be
/// written concurrently.
pub(crate) unsafe fn load(src: NonNull<u8>, dst: &mut [u8]) {
    // SAFETY: caller guarantees the source range is readable; `dst` is a
    // distinct Rust allocation so the ranges cannot overlap.
    unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_mut_ptr(), dst.len()) }
}

/// Copy `src` into memory starting at `dst`.
///
/// # Safety
///
/// `dst..dst + src.len()` must lie inside one live region and must not be
/// accessed concurrently.
pub(crate) unsafe fn store(dst: NonNull<u8>, src: &[u8]) {
    // SAFETY: caller guarantees the destination range is writable and
    // exclusively accessed; `src` is a distinct Rust allocation.
    unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len()) }
}

/// Move `len` bytes from `src` to `dst`. The ranges may overlap.
///
/// # Safety
///
/// Both ranges must lie inside live regions; `dst` must not be accessed
/// concurrently.
pub(crate) unsafe fn copy(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    // SAFETY: forwarded caller contract; `ptr::copy` tolerates overlap.
    unsafe { std::ptr::copy(src.as_ptr(), dst.as_ptr(), len) }
}

/// Set `len` bytes starting at `dst` to `byte`.
///
/// # Safety
///
/// `dst..dst + len` must lie inside one live region and must not be
/// accessed concurrently.
pub(crate) unsafe fn fill(dst: NonNull<u8>, len: usize, byte: u8) {
    // SAFETY: forwarded caller contract.
    unsafe { std::ptr::write_bytes(dst.as_ptr(), byte, len) }
}

/// Lexicographic byte comparison of two ranges of equal length.
///
/// # Safety
///
/// Both ranges must lie inside live regions and must not be written while
/// the comparison runs.
pub(crate) unsafe fn compare(a: NonNull<u8>, b: NonNull<u8>, len: usize) -> Ordering {
    // SAFETY: caller guarantees both ranges are readable and not mutated for
    // the lifetime of these temporary slices.
    let (a, b) = unsafe {
        (
            std::slice::from_raw_parts(a.as_ptr(), len),
            std::slice::from_raw_parts(b.as_ptr(), len),
        )
    };
    a.cmp(b)
}
