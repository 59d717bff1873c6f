//! Translation lookaside buffer maintenance.

#[cfg(all(feature = "asm", target_arch = "x86"))]
use kernel_memory_addresses::{Size4K, VirtualPage};

/// Invalidate the cached translation of a single page on this CPU.
///
/// For a 4 MiB mapping, invalidating any address inside the large page
/// drops the whole large translation.
///
/// # Safety
/// Must run at CPL0.
#[cfg(all(feature = "asm", target_arch = "x86"))]
#[inline]
pub unsafe fn invlpg(page: VirtualPage<Size4K>) {
    let va = page.base().as_u32();
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) va, options(nostack, preserves_flags));
    }
}
