//! Sequential access over a [`View`].
//!
//! A [`ViewCursor`] keeps two positions: `put*` calls append at the write
//! position and `get*` calls consume from the read position. Only bytes
//! already written through the cursor are readable:
//!
//! ```text
//! 0        read_position   write_position          len
//! |  consumed  |  readable  |       writable        |
//! ```
//!
//! A [`RingCursor`] uses the view as a circular buffer instead. Its positions
//! only ever grow and are mapped onto the view modulo its length, so space
//! consumed by `get*` becomes writable again:
//!
//! ```text
//! 0      write % len      read % len         len
//! | readable |  writable   |    readable      |
//! ```

use std::io;

use crate::error::{MemoryError, Result};
use crate::view::{Scalar, View};

/// Reader and writer with independent positions over one view.
#[derive(Debug)]
pub struct ViewCursor<'a> {
    view: &'a mut View,
    read: usize,
    write: usize,
}

impl<'a> ViewCursor<'a> {
    pub(crate) fn new(view: &'a mut View) -> Self {
        Self {
            view,
            read: 0,
            write: 0,
        }
    }

    /// Offset of the next byte `get*` will consume.
    pub fn read_position(&self) -> usize {
        self.read
    }

    /// Offset of the next byte `put*` will fill.
    pub fn write_position(&self) -> usize {
        self.write
    }

    /// Bytes written but not yet read.
    pub fn readable(&self) -> usize {
        self.write - self.read
    }

    /// Bytes left before the end of the view.
    pub fn writable(&self) -> usize {
        self.view.len() - self.write
    }

    /// Rewind both positions to the start. Contents are kept.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Append a scalar at the write position.
    pub fn put<T: Scalar>(&mut self, value: T) -> Result<()> {
        self.view.write(self.write, value)?;
        self.write += T::SIZE;
        Ok(())
    }

    /// Consume a scalar from the read position.
    pub fn get<T: Scalar>(&mut self) -> Result<T> {
        self.check_readable(T::SIZE)?;
        let value = self.view.read(self.read)?;
        self.read += T::SIZE;
        Ok(value)
    }

    /// Append all of `src`.
    pub fn put_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.view.write_bytes(self.write, src)?;
        self.write += src.len();
        Ok(())
    }

    /// Consume exactly `dst.len()` bytes.
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        self.check_readable(dst.len())?;
        self.view.read_bytes(self.read, dst)?;
        self.read += dst.len();
        Ok(())
    }

    fn check_readable(&self, len: usize) -> Result<()> {
        if len > self.readable() {
            return Err(MemoryError::OutOfBounds {
                offset: self.read,
                len,
                bound: self.write,
            });
        }
        Ok(())
    }
}

impl io::Read for ViewCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.readable());
        self.get_bytes(&mut buf[..n])?;
        Ok(n)
    }
}

impl io::Write for ViewCursor<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.writable());
        self.put_bytes(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Circular reader and writer over one view.
///
/// Capacity is the view's length and never changes; grow the backing
/// allocation with [`Allocator::reallocate`](crate::allocator::Allocator::reallocate)
/// after draining the ring if more room is needed.
#[derive(Debug)]
pub struct RingCursor<'a> {
    view: &'a mut View,
    read: u64,
    write: u64,
}

impl<'a> RingCursor<'a> {
    pub(crate) fn new(view: &'a mut View) -> Self {
        Self {
            view,
            read: 0,
            write: 0,
        }
    }

    /// Length of the underlying view.
    pub fn capacity(&self) -> usize {
        self.view.len()
    }

    /// Total bytes consumed since construction or the last reset.
    pub fn read_position(&self) -> u64 {
        self.read
    }

    /// Total bytes written since construction or the last reset.
    pub fn write_position(&self) -> u64 {
        self.write
    }

    /// Bytes written but not yet read.
    pub fn readable(&self) -> usize {
        (self.write - self.read) as usize
    }

    /// Bytes that can be written before unread data would be overwritten.
    pub fn writable(&self) -> usize {
        self.capacity() - self.readable()
    }

    /// Discard unread data and rewind both positions. Contents are kept.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Append a scalar, wrapping around the end of the view if needed.
    pub fn put<T: Scalar>(&mut self, value: T) -> Result<()> {
        self.put_bytes(value.encode().as_ref())
    }

    /// Consume a scalar, wrapping around the end of the view if needed.
    pub fn get<T: Scalar>(&mut self) -> Result<T> {
        let mut bytes = T::Bytes::default();
        self.get_bytes(bytes.as_mut())?;
        Ok(T::decode(bytes))
    }

    /// Append all of `src`.
    ///
    /// Fails with `OutOfBounds` without writing anything if `src` does not
    /// fit in [`writable`](Self::writable).
    pub fn put_bytes(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.writable() {
            return Err(MemoryError::OutOfBounds {
                offset: self.readable(),
                len: src.len(),
                bound: self.capacity(),
            });
        }
        if src.is_empty() {
            return Ok(());
        }
        let (at, first) = self.segment(self.write, src.len());
        self.view.write_bytes(at, &src[..first])?;
        self.view.write_bytes(0, &src[first..])?;
        self.write += src.len() as u64;
        Ok(())
    }

    /// Consume exactly `dst.len()` bytes.
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.readable() {
            return Err(MemoryError::OutOfBounds {
                offset: 0,
                len: dst.len(),
                bound: self.readable(),
            });
        }
        if dst.is_empty() {
            return Ok(());
        }
        let (at, first) = self.segment(self.read, dst.len());
        let (head, tail) = dst.split_at_mut(first);
        self.view.read_bytes(at, head)?;
        self.view.read_bytes(0, tail)?;
        self.read += dst.len() as u64;
        Ok(())
    }

    /// View offset of `position` and how many of `len` bytes fit before the
    /// end of the view. Only called with a non-zero capacity.
    fn segment(&self, position: u64, len: usize) -> (usize, usize) {
        let capacity = self.capacity();
        let at = (position % capacity as u64) as usize;
        (at, len.min(capacity - at))
    }
}

impl io::Read for RingCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.readable());
        self.get_bytes(&mut buf[..n])?;
        Ok(n)
    }
}

impl io::Write for RingCursor<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.writable());
        self.put_bytes(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
