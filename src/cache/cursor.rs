//! Bounds-checked cursor over a loaded cache.
//!
//! Every structural read in the parser goes through [`BoundsCursor`]. The
//! cursor only moves forward, and only after the requested range has been
//! checked against the end of the region, so no later stage ever handles an
//! offset that was not validated first.

use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};

/// A forward-only cursor over an immutable byte region.
#[derive(Debug, Clone)]
pub struct BoundsCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BoundsCursor<'a> {
    /// Creates a cursor at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the absolute position of the cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes left in the region.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns the whole underlying region.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Validates `[pos, pos + n)` and returns it as a slice.
    fn range(&self, n: u64) -> Result<&'a [u8]> {
        let end = (self.pos as u64)
            .checked_add(n)
            .filter(|&end| end <= self.data.len() as u64)
            .ok_or_else(|| Error::truncated(self.pos, n, self.data.len()))?;
        Ok(&self.data[self.pos..end as usize])
    }

    /// Returns the next `n` bytes and moves past them.
    pub fn advance(&mut self, n: u64) -> Result<&'a [u8]> {
        let bytes = self.range(n)?;
        self.pos += bytes.len();
        Ok(bytes)
    }

    /// Returns the next `n` bytes without consuming them.
    pub fn peek(&self, n: u64) -> Result<&'a [u8]> {
        self.range(n)
    }

    /// Skips padding up to the next multiple of `align`.
    ///
    /// Returns the number of bytes skipped. `align` must be non-zero.
    pub fn align_to(&mut self, align: usize) -> Result<usize> {
        debug_assert!(align > 0);
        let pad = (align - self.pos % align) % align;
        self.advance(pad as u64)?;
        Ok(pad)
    }

    /// Decodes one fixed-size record and moves past it.
    pub fn read<T>(&mut self) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let offset = self.pos;
        let bytes = self.advance(std::mem::size_of::<T>() as u64)?;
        T::read_from_bytes(bytes).map_err(|_| {
            Error::truncated(offset, std::mem::size_of::<T>() as u64, self.data.len())
        })
    }

    /// Consumes an array of `count` fixed-size records.
    ///
    /// The total size is computed in 64 bits with overflow checking, since
    /// `count` comes straight from the file. The returned slice has exactly
    /// `count * size_of::<T>()` bytes.
    pub fn read_array<T>(&mut self, count: u32) -> Result<&'a [u8]> {
        let size = std::mem::size_of::<T>() as u64;
        let total = u64::from(count)
            .checked_mul(size)
            .ok_or_else(|| Error::truncated(self.pos, u64::MAX, self.data.len()))?;
        self.advance(total)
    }
}
