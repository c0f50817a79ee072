//! Shared-memory address ranges.
//!
//! A [`SharedRegion`] names the bytes a cache operation must cover. It carries
//! an address and a length only; it never dereferences anything, so building
//! one is safe from any context.

/// A contiguous byte range in memory visible to more than one core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SharedRegion {
    addr: usize,
    len: usize,
}

impl SharedRegion {
    /// Creates a region from a raw address and length.
    #[inline]
    pub const fn new(addr: usize, len: usize) -> Self {
        Self { addr, len }
    }

    /// Returns the region covering `value` in place.
    ///
    /// For containers this covers the container header only (pointer, length,
    /// capacity), not heap storage it owns. Commit heap storage separately
    /// with [`of_slice`](Self::of_slice).
    #[inline]
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self {
            addr: core::ptr::from_ref(value).cast::<u8>() as usize,
            len: core::mem::size_of_val(value),
        }
    }

    /// Returns the region covering the elements of `slice`.
    #[inline]
    pub fn of_slice<T>(slice: &[T]) -> Self {
        Self {
            addr: slice.as_ptr() as usize,
            len: core::mem::size_of_val(slice),
        }
    }

    /// Start address.
    #[inline]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    /// Length in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a zero-length region.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the region rounded outward to whole cache lines of `line` bytes.
    ///
    /// `line` must be a power of two.
    pub const fn aligned(&self, line: usize) -> Self {
        let mask = line - 1;
        let start = self.addr & !mask;
        let end = (self.addr + self.len + mask) & !mask;
        Self {
            addr: start,
            len: end - start,
        }
    }
}
