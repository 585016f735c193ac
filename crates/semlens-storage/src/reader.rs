//! Bounds-checked reads over byte slices.
//!
//! Every format in the blob stores offsets and lengths that come from the
//! file itself. [`ByteRange`] validates those against the buffer with
//! overflow-checked arithmetic, and [`ByteCursor`] reads fixed-width
//! integers without ever indexing past the end.

use std::ops::Range;

use bytes::Buf;
use thiserror::Error;

/// A read ran past the end of its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("needed {needed} bytes but only {available} remain")]
pub struct Truncated {
    /// Bytes the read required.
    pub needed: usize,
    /// Bytes that were left.
    pub available: usize,
}

/// An `(offset, length)` pair taken from untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// Start of the range.
    pub offset: u64,
    /// Length of the range.
    pub length: u64,
}

impl ByteRange {
    /// Creates a new range.
    #[inline]
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Returns the exclusive end, or `None` if it overflows.
    #[inline]
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Returns true if the whole range lies inside `total` bytes.
    #[inline]
    pub fn fits_within(&self, total: u64) -> bool {
        self.end().is_some_and(|end| end <= total)
    }

    /// Converts to an index range, if it is addressable on this platform.
    pub fn to_index_range(&self) -> Option<Range<usize>> {
        let start = usize::try_from(self.offset).ok()?;
        let end = usize::try_from(self.end()?).ok()?;
        Some(start..end)
    }
}

/// Sequential reader over a borrowed byte slice.
///
/// # Example
///
/// ```rust
/// use semlens_storage::reader::ByteCursor;
///
/// let data = [0x01, 0x00, 0x00, 0x00, 0xAB];
/// let mut cursor = ByteCursor::new(&data);
/// assert_eq!(cursor.read_u32_le().unwrap(), 1);
/// assert_eq!(cursor.read_u8().unwrap(), 0xAB);
/// assert!(cursor.read_u8().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    start_len: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor positioned at the start of `data`.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buf: data,
            start_len: data.len(),
        }
    }

    /// Returns the number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.start_len - self.buf.len()
    }

    /// Returns the number of unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if every byte has been read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    fn ensure(&self, needed: usize) -> Result<(), Truncated> {
        if self.buf.len() < needed {
            return Err(Truncated {
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Skips `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), Truncated> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }

    /// Reads a byte.
    pub fn read_u8(&mut self) -> Result<u8, Truncated> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16_le(&mut self) -> Result<u16, Truncated> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32, Truncated> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64, Truncated> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32_be(&mut self) -> Result<u32, Truncated> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    /// Reads an `i64` in the given byte order.
    pub fn read_i64(&mut self, big_endian: bool) -> Result<i64, Truncated> {
        self.ensure(8)?;
        Ok(if big_endian {
            self.buf.get_i64()
        } else {
            self.buf.get_i64_le()
        })
    }

    /// Reads an `f64` in the given byte order.
    pub fn read_f64(&mut self, big_endian: bool) -> Result<f64, Truncated> {
        self.ensure(8)?;
        Ok(if big_endian {
            self.buf.get_f64()
        } else {
            self.buf.get_f64_le()
        })
    }

    /// Reads a `u32` in the given byte order.
    pub fn read_u32(&mut self, big_endian: bool) -> Result<u32, Truncated> {
        if big_endian {
            self.read_u32_be()
        } else {
            self.read_u32_le()
        }
    }
}
