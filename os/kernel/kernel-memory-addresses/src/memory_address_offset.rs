use crate::{MemoryAddress, MemoryPage, PageSize};
use core::fmt;
use core::marker::PhantomData;
use core::ops::Add;

/// Byte offset inside a page of size `S`; always below `S::SIZE`.
///
/// For [`Size4K`](crate::Size4K) this is the low 12 bits of an address,
/// for [`Size4M`](crate::Size4M) the low 22 bits.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddressOffset<S: PageSize> {
    bytes: u32,
    _size: PhantomData<S>,
}

impl<S: PageSize> MemoryAddressOffset<S> {
    /// The offset `bytes`, or `None` if it does not fit inside one page.
    #[inline]
    #[must_use]
    pub const fn new(bytes: u32) -> Option<Self> {
        if bytes < S::SIZE {
            Some(Self::masked(bytes))
        } else {
            None
        }
    }

    /// The in-page part of `addr`.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: MemoryAddress) -> Self {
        Self::masked(addr.as_u32())
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.bytes
    }

    const fn masked(v: u32) -> Self {
        Self {
            bytes: v & (S::SIZE - 1),
            _size: PhantomData,
        }
    }
}

impl<S: PageSize> fmt::Debug for MemoryAddressOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:#X}/{}", self.bytes, S::as_str())
    }
}

impl<S: PageSize> Add<MemoryAddressOffset<S>> for MemoryPage<S> {
    type Output = MemoryAddress;

    #[inline]
    fn add(self, rhs: MemoryAddressOffset<S>) -> MemoryAddress {
        self.join(rhs)
    }
}

impl<S: PageSize> From<MemoryAddress> for MemoryAddressOffset<S> {
    #[inline]
    fn from(addr: MemoryAddress) -> Self {
        Self::from_addr(addr)
    }
}
