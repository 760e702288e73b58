//! Bounds-checked typed access to one allocation.
//!
//! A [`View`] pairs a [`Span`] with a non-owning reference to its
//! allocator's ledger. Every access upgrades that reference, takes the
//! ledger read lock, checks that the span is still live and only then checks
//! bounds, so stale views fail with [`MemoryError::UseAfterFree`] rather than
//! touching released memory.
//!
//! Values are stored in native byte order and need not be aligned.
//!
//! ```
//! use memutils_core::{Allocator, AllocatorConfig, MemoryError};
//!
//! let mut alloc = Allocator::new(AllocatorConfig::default())?;
//! let mut view = alloc.allocate(16, 8)?;
//! view.write_u64(8, 7)?;
//! assert_eq!(view.read_u64(8)?, 7);
//! assert!(matches!(view.read_u64(12), Err(MemoryError::OutOfBounds { .. })));
//! # Ok::<(), MemoryError>(())
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::cursor::{RingCursor, ViewCursor};
use crate::error::{MemoryError, Result};
use crate::ledger::Ledger;
use crate::region::Region;
use crate::span::Span;

mod sealed {
    pub trait Sealed {}
}

/// Plain numeric types that can be stored in a view.
///
/// Sealed: implemented for the fixed-width integers and floats only.
pub trait Scalar: Copy + sealed::Sealed {
    /// Width in bytes.
    const SIZE: usize;
    /// Native-endian byte representation.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;
    /// Encode in native byte order.
    fn encode(self) -> Self::Bytes;
    /// Decode from native byte order.
    fn decode(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            type Bytes = [u8; std::mem::size_of::<$t>()];

            #[inline]
            fn encode(self) -> Self::Bytes {
                self.to_ne_bytes()
            }

            #[inline]
            fn decode(bytes: Self::Bytes) -> Self {
                <$t>::from_ne_bytes(bytes)
            }
        }
    )*};
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

/// Handle to a live allocation, or to a window of one after
/// [`split_off`](View::split_off).
///
/// Not `Clone`: each byte is reachable through at most one view, and writes
/// take `&mut self`, so distinct views never race.
pub struct View {
    ledger: Weak<Ledger>,
    span: Span,
    /// Start of this view's window within the span.
    start: usize,
    len: usize,
}

impl View {
    pub(crate) fn new(ledger: Weak<Ledger>, span: Span) -> Self {
        Self {
            ledger,
            span,
            start: 0,
            len: span.len(),
        }
    }

    /// Length of the view in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view covers no bytes (possible only after a split).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The allocation this view belongs to. Pass it to
    /// [`Allocator::free`](crate::allocator::Allocator::free).
    pub fn span(&self) -> Span {
        self.span
    }

    /// Whether the allocation is still outstanding.
    pub fn is_live(&self) -> bool {
        self.ledger.upgrade().is_some_and(|ledger| {
            let state = ledger.read();
            state.check(&self.span).is_ok()
        })
    }

    /// Numeric address of the view's first byte.
    pub fn address(&self) -> Result<usize> {
        self.with_region(0, 0, |region, at| Ok(region.base_address() + at))
    }

    /// Read a scalar at `offset`.
    #[inline]
    pub fn read<T: Scalar>(&self, offset: usize) -> Result<T> {
        let mut bytes = T::Bytes::default();
        self.read_bytes(offset, bytes.as_mut())?;
        Ok(T::decode(bytes))
    }

    /// Write a scalar at `offset`.
    #[inline]
    pub fn write<T: Scalar>(&mut self, offset: usize, value: T) -> Result<()> {
        self.write_bytes(offset, value.encode().as_ref())
    }

    /// Read a byte at `offset` as a boolean; any non-zero byte is `true`.
    pub fn read_bool(&self, offset: usize) -> Result<bool> {
        Ok(self.read::<u8>(offset)? != 0)
    }

    /// Write a boolean as a single byte (`0` or `1`).
    pub fn write_bool(&mut self, offset: usize, value: bool) -> Result<()> {
        self.write::<u8>(offset, u8::from(value))
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.with_region(offset, dst.len(), |region, at| region.load(at, dst))
    }

    /// Copy `src` into the view starting at `offset`.
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        self.with_region(offset, src.len(), |region, at| region.store(at, src))
    }

    /// Set `len` bytes starting at `offset` to `byte`.
    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<()> {
        self.with_region(offset, len, |region, at| region.fill(at, len, byte))
    }

    /// Copy the whole view into a new vector.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        self.read_bytes(0, &mut out)?;
        Ok(out)
    }

    /// Copy `len` bytes from `src` at `src_offset` into this view at
    /// `dst_offset`. The views may belong to different allocators.
    pub fn copy_from(
        &mut self,
        src: &View,
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        self.with_pair(src, |dst_region, dst_at, src_region, src_at| {
            let dst_at = self.window(dst_at, dst_offset, len)?;
            let src_at = src.window(src_at, src_offset, len)?;
            src_region.copy_into(src_at, dst_region, dst_at, len)
        })
    }

    /// Lexicographically compare `len` bytes of this view at `offset` with
    /// `len` bytes of `other` at `other_offset`.
    pub fn compare(
        &self,
        offset: usize,
        other: &View,
        other_offset: usize,
        len: usize,
    ) -> Result<Ordering> {
        self.with_pair(other, |region, at, other_region, other_at| {
            let at = self.window(at, offset, len)?;
            let other_at = other.window(other_at, other_offset, len)?;
            region.compare(at, other_region, other_at, len)
        })
    }

    /// Whether both views have the same length and contents.
    pub fn content_eq(&self, other: &View) -> Result<bool> {
        if self.len != other.len {
            // Still report stale views.
            self.with_pair(other, |_, _, _, _| Ok(()))?;
            return Ok(false);
        }
        Ok(self.compare(0, other, 0, self.len)? == Ordering::Equal)
    }

    /// Split the view in two at `at`.
    ///
    /// Afterwards `self` covers `[0, at)` and the returned view covers the
    /// former `[at, len)`. Both pieces belong to the same allocation: freeing
    /// its span invalidates both.
    pub fn split_off(&mut self, at: usize) -> Result<View> {
        self.with_region(at, 0, |_, _| Ok(()))?;
        let tail = View {
            ledger: self.ledger.clone(),
            span: self.span,
            start: self.start + at,
            len: self.len - at,
        };
        self.len = at;
        Ok(tail)
    }

    /// Sequential reader and writer over this view.
    pub fn cursor(&mut self) -> ViewCursor<'_> {
        ViewCursor::new(self)
    }

    /// Circular reader and writer over this view.
    pub fn ring(&mut self) -> RingCursor<'_> {
        RingCursor::new(self)
    }

    /// Region offset of `offset` within this view, if `len` bytes fit.
    fn window(&self, base: usize, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(base + offset),
            _ => Err(MemoryError::OutOfBounds {
                offset,
                len,
                bound: self.len,
            }),
        }
    }

    /// Run `f` on the live region with the region offset of `offset`, after
    /// checking liveness and then bounds of `offset..offset + len`.
    fn with_region<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&Region, usize) -> Result<R>,
    ) -> Result<R> {
        let ledger = self.ledger.upgrade().ok_or(MemoryError::UseAfterFree)?;
        let state = ledger.read();
        let region = state.check(&self.span)?;
        let at = self.window(self.span.offset() + self.start, offset, len)?;
        f(region, at)
    }

    /// Like [`with_region`](Self::with_region) for two views at once,
    /// passing each region with its view's window start. Bounds are left to
    /// `f`.
    ///
    /// Views of one allocator share a single read lock. Otherwise both locks
    /// are taken in allocator-id order.
    fn with_pair<R>(
        &self,
        other: &View,
        f: impl FnOnce(&Region, usize, &Region, usize) -> Result<R>,
    ) -> Result<R> {
        let mine = self.ledger.upgrade().ok_or(MemoryError::UseAfterFree)?;
        let theirs = other.ledger.upgrade().ok_or(MemoryError::UseAfterFree)?;
        let my_at = self.span.offset() + self.start;
        let their_at = other.span.offset() + other.start;
        if Arc::ptr_eq(&mine, &theirs) {
            let state = mine.read();
            let region = state.check(&self.span)?;
            let other_region = state.check(&other.span)?;
            return f(region, my_at, other_region, their_at);
        }
        let (my_state, their_state) = if mine.id() < theirs.id() {
            let a = mine.read();
            (a, theirs.read())
        } else {
            let b = theirs.read();
            (mine.read(), b)
        };
        let region = my_state.check(&self.span)?;
        let other_region = their_state.check(&other.span)?;
        f(region, my_at, other_region, their_at)
    }
}

macro_rules! shortcuts {
    ($($t:ty => $read:ident, $write:ident;)*) => {
        impl View {$(
            #[doc = concat!("Read a `", stringify!($t), "` at `offset`.")]
            #[inline]
            pub fn $read(&self, offset: usize) -> Result<$t> {
                self.read::<$t>(offset)
            }

            #[doc = concat!("Write a `", stringify!($t), "` at `offset`.")]
            #[inline]
            pub fn $write(&mut self, offset: usize, value: $t) -> Result<()> {
                self.write::<$t>(offset, value)
            }
        )*}
    };
}

shortcuts! {
    u8 => read_u8, write_u8;
    i8 => read_i8, write_i8;
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    u64 => read_u64, write_u64;
    i64 => read_i64, write_i64;
    u128 => read_u128, write_u128;
    i128 => read_i128, write_i128;
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("span", &self.span)
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Allocator;
    use crate::config::AllocatorConfig;

    fn alloc() -> Allocator {
        Allocator::new(AllocatorConfig::default().with_region_size(4096)).unwrap()
    }

    #[test]
    fn fresh_view_is_zeroed() {
        let mut a = alloc();
        let v = a.allocate(32, 8).unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![0u8; 32]);
    }

    #[test]
    fn scalar_round_trips() {
        let mut a = alloc();
        let mut v = a.allocate(64, 16).unwrap();
        v.write_i8(0, -3).unwrap();
        v.write_u16(1, 0xBEEF).unwrap();
        v.write_i32(3, -70_000).unwrap();
        v.write_f32(7, 1.5).unwrap();
        v.write_f64(11, -2.25).unwrap();
        v.write_u128(19, u128::MAX - 1).unwrap();
        v.write_i64(35, i64::MIN).unwrap();
        assert_eq!(v.read_i8(0).unwrap(), -3);
        assert_eq!(v.read_u16(1).unwrap(), 0xBEEF);
        assert_eq!(v.read_i32(3).unwrap(), -70_000);
        assert_eq!(v.read_f32(7).unwrap(), 1.5);
        assert_eq!(v.read_f64(11).unwrap(), -2.25);
        assert_eq!(v.read_u128(19).unwrap(), u128::MAX - 1);
        assert_eq!(v.read_i64(35).unwrap(), i64::MIN);
    }

    #[test]
    fn native_byte_order() {
        let mut a = alloc();
        let mut v = a.allocate(4, 4).unwrap();
        v.write_u32(0, 0x0102_0304).unwrap();
        assert_eq!(v.to_vec().unwrap(), 0x0102_0304u32.to_ne_bytes());
    }

    #[test]
    fn bool_uses_one_byte() {
        let mut a = alloc();
        let mut v = a.allocate(2, 1).unwrap();
        v.write_bool(1, true).unwrap();
        assert!(v.read_bool(1).unwrap());
        assert!(!v.read_bool(0).unwrap());
        v.write_u8(0, 7).unwrap();
        assert!(v.read_bool(0).unwrap());
    }

    #[test]
    fn out_of_bounds_is_overflow_checked() {
        let mut a = alloc();
        let v = a.allocate(16, 8).unwrap();
        assert_eq!(
            v.read_u64(12).unwrap_err(),
            MemoryError::OutOfBounds {
                offset: 12,
                len: 8,
                bound: 16
            }
        );
        assert!(matches!(
            v.read_u8(usize::MAX).unwrap_err(),
            MemoryError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn liveness_is_checked_before_bounds() {
        let mut a = alloc();
        let v = a.allocate(16, 8).unwrap();
        a.free(v.span()).unwrap();
        assert_eq!(v.read_u64(100).unwrap_err(), MemoryError::UseAfterFree);
        assert!(!v.is_live());
    }

    #[test]
    fn fill_and_bytes() {
        let mut a = alloc();
        let mut v = a.allocate(8, 1).unwrap();
        v.fill(2, 4, 0xAA).unwrap();
        v.write_bytes(0, &[1, 2]).unwrap();
        let mut out = [0u8; 8];
        v.read_bytes(0, &mut out).unwrap();
        assert_eq!(out, [1, 2, 0xAA, 0xAA, 0xAA, 0xAA, 0, 0]);
        assert!(v.fill(6, 3, 0).is_err());
    }

    #[test]
    fn copy_between_allocators() {
        let mut a = alloc();
        let mut b = alloc();
        let mut src = a.allocate(8, 8).unwrap();
        let mut dst = b.allocate(8, 8).unwrap();
        src.write_u64(0, 99).unwrap();
        dst.copy_from(&src, 0, 0, 8).unwrap();
        assert_eq!(dst.read_u64(0).unwrap(), 99);
        assert_eq!(dst.compare(0, &src, 0, 8).unwrap(), Ordering::Equal);
        assert!(dst.content_eq(&src).unwrap());
        assert!(dst.copy_from(&src, 4, 0, 8).is_err());
    }

    #[test]
    fn compare_is_lexicographic() {
        let mut a = alloc();
        let mut x = a.allocate(3, 1).unwrap();
        let mut y = a.allocate(3, 1).unwrap();
        x.write_bytes(0, &[1, 2, 3]).unwrap();
        y.write_bytes(0, &[1, 3, 0]).unwrap();
        assert_eq!(x.compare(0, &y, 0, 3).unwrap(), Ordering::Less);
        assert_eq!(y.compare(0, &x, 0, 3).unwrap(), Ordering::Greater);
        assert_eq!(x.compare(0, &y, 0, 1).unwrap(), Ordering::Equal);
        assert!(!x.content_eq(&y).unwrap());
    }

    #[test]
    fn compare_with_freed_view_fails() {
        let mut a = alloc();
        let x = a.allocate(4, 1).unwrap();
        let y = a.allocate(4, 1).unwrap();
        a.free(y.span()).unwrap();
        assert_eq!(x.compare(0, &y, 0, 4).unwrap_err(), MemoryError::UseAfterFree);
    }

    #[test]
    fn split_pieces_are_disjoint() {
        let mut a = alloc();
        let mut head = a.allocate(16, 8).unwrap();
        let mut tail = head.split_off(8).unwrap();
        assert_eq!((head.len(), tail.len()), (8, 8));
        head.write_u64(0, 1).unwrap();
        tail.write_u64(0, 2).unwrap();
        assert_eq!(head.read_u64(0).unwrap(), 1);
        assert_eq!(tail.read_u64(0).unwrap(), 2);
        assert_eq!(tail.address().unwrap(), head.address().unwrap() + 8);
        assert!(head.read_u8(8).is_err());
        assert!(head.split_off(9).is_err());

        a.free(head.span()).unwrap();
        assert_eq!(tail.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);
    }

    #[test]
    fn view_outliving_allocator_is_stale() {
        let v = {
            let mut a = alloc();
            a.allocate(8, 8).unwrap()
        };
        assert_eq!(v.read_u64(0).unwrap_err(), MemoryError::UseAfterFree);
        assert_eq!(v.address().unwrap_err(), MemoryError::UseAfterFree);
    }

    #[test]
    fn views_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<View>();
    }
}
