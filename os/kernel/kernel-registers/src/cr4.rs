#[cfg(all(feature = "asm", target_arch = "x86"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR4, reduced to the paging-mode bits.
///
/// Two-level paging with 4 MiB pages needs `PSE` set and `PAE` clear; with
/// `PAE` set the CPU would walk three-level tables instead. Everything else
/// is kept as padding so a read/modify/write preserves it.
#[bitfield(u32)]
pub struct Cr4 {
    #[bits(4)]
    __low: u8,

    /// `PSE`, bit 4. A directory entry with `PS=1` maps a 4 MiB page.
    pub pse: bool,

    /// `PAE`, bit 5.
    pub pae: bool,

    #[bits(1)]
    __bit6: u8,

    /// `PGE`, bit 7. Entries marked global survive a CR3 reload.
    pub pge: bool,

    #[bits(24)]
    __high: u32,
}

impl Cr4 {
    /// This value with 4 MiB pages on and PAE off.
    #[inline]
    #[must_use]
    pub const fn with_large_pages(self) -> Self {
        self.with_pse(true).with_pae(false)
    }

    /// Whether [`with_large_pages`](Self::with_large_pages) would change anything.
    #[inline]
    #[must_use]
    pub const fn large_pages_enabled(self) -> bool {
        self.pse() && !self.pae()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let raw: u32;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) raw, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(raw)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl StoreRegisterUnsafe for Cr4 {
    unsafe fn store_unsafe(self) {
        let raw = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr4, {}", in(reg) raw, options(nostack, preserves_flags));
        }
    }
}
