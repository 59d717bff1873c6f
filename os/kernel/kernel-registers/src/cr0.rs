#[cfg(all(feature = "asm", target_arch = "x86"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR0 as far as turning on paging is concerned.
///
/// Only `PE`, `WP` and `PG` are named. The other bits (FPU control, cache
/// control, alignment mask) sit in padding: they survive a
/// load/modify/store round trip untouched but cannot be changed here.
#[bitfield(u32)]
pub struct Cr0 {
    /// `PE`, bit 0. Paging requires protected mode.
    pub protected_mode: bool,

    #[bits(15)]
    __pe_wp_gap: u16,

    /// `WP`, bit 16. Supervisor writes honor read-only entries.
    pub write_protect: bool,

    #[bits(14)]
    __wp_pg_gap: u16,

    /// `PG`, bit 31. Translation through the directory in CR3.
    pub paging: bool,
}

impl Cr0 {
    /// Whether setting [`paging`](Self::paging) would be accepted by the CPU.
    #[inline]
    #[must_use]
    pub const fn can_enable_paging(self) -> bool {
        self.protected_mode()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let raw: u32;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) raw, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(raw)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let raw = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) raw, options(nostack, preserves_flags));
        }
    }
}
