//! # Paging Hardware Seam
//!
//! The activator and mapper never issue privileged instructions directly;
//! they go through [`PagingHardware`]. [`X86Paging`] is the real thing,
//! built on `kernel-registers`. Hosted tests provide a simulated CPU.

use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualPage};

/// The privileged operations needed to bring up and maintain paging.
pub trait PagingHardware {
    /// Whether the CPU advertises 4 MiB pages (`CPUID.01H:EDX.PSE`).
    fn supports_large_pages(&self) -> bool;

    /// Set `CR4.PSE` so directory entries with `PS=1` map 4 MiB pages.
    ///
    /// # Safety
    /// Changes how every present directory entry is interpreted.
    unsafe fn enable_large_pages(&mut self);

    /// Load `CR3` with the directory in `root`.
    ///
    /// # Safety
    /// With paging enabled, the new directory must map the executing code
    /// and stack.
    unsafe fn load_root(&mut self, root: PhysicalPage<Size4K>);

    /// Set `CR0.PG`. A no-op when paging is already on.
    ///
    /// # Safety
    /// `CR3` must hold a directory that identity-maps the executing code.
    unsafe fn enable_paging(&mut self);

    /// Drop the cached translation of one virtual page (`invlpg`).
    fn invalidate_page(&mut self, page: VirtualPage<Size4K>);
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use self::x86::X86Paging;

#[cfg(all(feature = "asm", target_arch = "x86"))]
mod x86 {
    use super::PagingHardware;
    use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualPage};
    use kernel_registers::cpuid::Leaf01h;
    use kernel_registers::cr0::Cr0;
    use kernel_registers::cr3::Cr3;
    use kernel_registers::cr4::Cr4;
    use kernel_registers::tlb::invlpg;
    use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

    /// [`PagingHardware`] for the running 32-bit x86 CPU.
    ///
    /// Must only be used at CPL0.
    #[derive(Debug)]
    pub struct X86Paging {
        features: Leaf01h,
    }

    impl X86Paging {
        /// Probe CPUID once and keep the feature word.
        ///
        /// # Safety
        /// Must run at CPL0 on a CPU with the `cpuid` instruction.
        #[must_use]
        pub unsafe fn new() -> Self {
            Self {
                features: unsafe { Leaf01h::read() },
            }
        }
    }

    impl PagingHardware for X86Paging {
        fn supports_large_pages(&self) -> bool {
            self.features.has_pse()
        }

        unsafe fn enable_large_pages(&mut self) {
            unsafe {
                let cr4 = Cr4::load_unsafe();
                if !cr4.large_pages_enabled() {
                    cr4.with_large_pages().store_unsafe();
                }
            }
        }

        unsafe fn load_root(&mut self, root: PhysicalPage<Size4K>) {
            unsafe { Cr3::from_directory_phys(root.base(), false, false).store_unsafe() }
        }

        unsafe fn enable_paging(&mut self) {
            unsafe {
                let cr0 = Cr0::load_unsafe();
                if !cr0.paging() {
                    cr0.with_paging(true).store_unsafe();
                }
            }
        }

        fn invalidate_page(&mut self, page: VirtualPage<Size4K>) {
            // SAFETY: X86Paging only exists at CPL0.
            unsafe { invlpg(page) }
        }
    }
}
