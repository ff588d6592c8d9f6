use std::fmt;

/// An index into a byte within the vmcore file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Offset(pub u64);

/// The address of a byte in the kernel that crashed. These are normally associated
/// with one of the load segments in the vmcore.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualAddr(pub u64);

/// Offsets and virtual addresses are both just u64's but we don't want to mix them up.
pub trait Address: Copy + Ord {
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;
}

impl Address for Offset {
    fn from_raw(raw: u64) -> Self {
        Offset(raw)
    }

    fn raw(self) -> u64 {
        self.0
    }
}

impl Address for VirtualAddr {
    fn from_raw(raw: u64) -> Self {
        VirtualAddr(raw)
    }

    fn raw(self) -> u64 {
        self.0
    }
}

/// A range of bytes that can be addressed using either offsets into the vmcore or
/// virtual addresses. Bytes can always be addressed using offsets and bytes within
/// load segments can also be addressed using virtual addresses.
///
/// Sizes come straight from an untrusted file so end() is checked: a range whose end
/// doesn't fit in 64 bits is treated as containing nothing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Bytes<A> {
    pub start: A,
    pub size: u64,
}

impl<A: Address> Bytes<A> {
    pub fn from_raw(start: u64, size: u64) -> Self {
        Bytes {
            start: A::from_raw(start),
            size,
        }
    }

    /// One past the last byte or None if that overflows.
    pub fn end(&self) -> Option<A> {
        self.start.raw().checked_add(self.size).map(A::from_raw)
    }

    pub fn contains(&self, addr: A) -> bool {
        match self.end() {
            Some(end) => addr >= self.start && addr < end,
            None => false,
        }
    }

    /// Returns true if all of inner lies within self and inner also ends before the
    /// last byte of self. LOAD lookups use this so a read ending exactly at the end
    /// of a segment is rejected.
    pub fn strictly_contains(&self, inner: &Bytes<A>) -> bool {
        match (self.end(), inner.end()) {
            (Some(end), Some(inner_end)) => inner.start >= self.start && inner_end < end,
            _ => false,
        }
    }

    /// Returns true if the range lies within [0, limit).
    pub fn fits_within(&self, limit: u64) -> bool {
        match self.end() {
            Some(end) => end.raw() <= limit,
            None => false,
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Display for VirtualAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
