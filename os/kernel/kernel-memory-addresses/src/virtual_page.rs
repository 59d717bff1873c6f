use crate::{MemoryAddressOffset, MemoryPage, PageSize, VirtualAddress};
use core::fmt;

/// Page-aligned virtual base of a `S`-sized page.
///
/// For [`Size4K`](crate::Size4K) the page number is the 20-bit value that
/// selects a directory slot (upper 10 bits) and a table slot (lower 10 bits);
/// for [`Size4M`](crate::Size4M) it is the directory slot itself.
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x0040_1234);
/// let vp = va.page::<Size4K>();
/// assert_eq!(vp.base().as_u32(), 0x0040_1000);
/// assert_eq!(vp.number(), 0x401);
/// assert_eq!(vp.join(va.offset::<Size4K>()), va);
/// assert_eq!(va.page::<Size4M>().number(), 1);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage<S: PageSize>(pub(crate) MemoryPage<S>);

impl<S: PageSize> VirtualPage<S> {
    /// Page containing `va`.
    #[inline]
    #[must_use]
    pub const fn from_addr(va: VirtualAddress) -> Self {
        Self(MemoryPage::from_addr(va.0))
    }

    /// Page number `n`, i.e. base `n << S::SHIFT`.
    #[inline]
    #[must_use]
    pub const fn from_number(n: u32) -> Self {
        Self::from_addr(VirtualAddress::new(n << S::SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0.base())
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0.number()
    }

    /// The page right after this one, or `None` at the top of the address space.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.base().as_u32().checked_add(S::SIZE) {
            Some(b) => Some(Self::from_addr(VirtualAddress::new(b))),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: MemoryAddressOffset<S>) -> VirtualAddress {
        VirtualAddress(self.0.join(off))
    }
}

impl<S: PageSize> fmt::Display for VirtualPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<S: PageSize> fmt::Debug for VirtualPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vpage {:#010X}/{}", self.0.base().as_u32(), S::as_str())
    }
}

impl<S: PageSize> TryFrom<VirtualAddress> for VirtualPage<S> {
    type Error = ();

    /// Succeeds only for page-aligned addresses.
    #[inline]
    fn try_from(va: VirtualAddress) -> Result<Self, ()> {
        va.is_aligned::<S>().then(|| Self::from_addr(va)).ok_or(())
    }
}
