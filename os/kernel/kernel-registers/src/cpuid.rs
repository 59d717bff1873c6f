//! CPUID access, limited to what paging setup needs.

use bitfield_struct::bitfield;

pub const LEAF_01H: u32 = 0x01;

#[derive(Debug, Copy, Clone)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Execute CPUID with the given leaf and subleaf.
///
/// `ebx` may be reserved by the compiler (PIC base), so it is saved around
/// the instruction and its result leaves through `edi`.
///
/// # Safety
/// The CPUID instruction must be available (any CPU that can run
/// 32-bit paging with PSE has it).
#[cfg(all(feature = "asm", target_arch = "x86"))]
#[inline(always)]
#[allow(clippy::inline_always)]
pub unsafe fn cpuid(leaf: u32, subleaf: u32) -> CpuidResult {
    let (eax, ebx, ecx, edx): (u32, u32, u32, u32);
    unsafe {
        core::arch::asm!(
            "push ebx",
            "cpuid",
            "mov edi, ebx",
            "pop ebx",
            inlateout("eax") leaf => eax,
            inlateout("ecx") subleaf => ecx,
            lateout("edi") ebx,
            lateout("edx") edx,
            options(nomem, preserves_flags),
        );
    }
    CpuidResult { eax, ebx, ecx, edx }
}

/// CPUID.01H:EDX — classic feature flags.
///
/// Reference: Intel SDM Vol. 2A, "CPUID—CPU Identification", leaf 01H.
#[bitfield(u32)]
pub struct Leaf1Edx {
    /// On-chip FPU (x87 FPU) present.
    pub fpu: bool, // 0
    /// Virtual 8086 mode extensions (VME) supported.
    pub vme: bool, // 1
    /// Debugging extensions (DE) supported.
    pub de: bool, // 2
    /// Page-Size Extensions (PSE) supported: 4 MiB pages via `CR4.PSE`.
    pub pse: bool, // 3
    /// Time-Stamp Counter (RDTSC) instruction available.
    pub tsc: bool, // 4
    /// Model-Specific Registers (RDMSR/WRMSR) supported.
    pub msr: bool, // 5
    /// Physical Address Extensions (PAE) supported.
    pub pae: bool, // 6
    /// Machine Check Exception (MCE) supported.
    pub mce: bool, // 7
    /// CMPXCHG8B instruction supported.
    pub cx8: bool, // 8
    /// On-chip APIC hardware present and enabled.
    pub apic: bool, // 9
    #[bits(3)]
    __: u8, // 10..=12
    /// Page Global Enable (PGE) supported.
    pub pge: bool, // 13
    #[bits(2)]
    __: u8, // 14..=15
    /// Page Attribute Table (PAT) supported.
    pub pat: bool, // 16
    /// 36-bit Page Size Extension (PSE-36) supported.
    pub pse36: bool, // 17
    #[bits(14)]
    __: u16, // 18..=31
}

/// The subset of CPUID.01H the paging code consults.
#[derive(Copy, Clone, Debug)]
pub struct Leaf01h {
    pub edx: Leaf1Edx,
}

impl Leaf01h {
    /// Query CPUID.01H on the running CPU.
    ///
    /// # Safety
    /// The caller must ensure that the `cpuid` instruction is available and leaf `0x01` exists.
    #[cfg(all(feature = "asm", target_arch = "x86"))]
    #[must_use]
    pub unsafe fn read() -> Self {
        unsafe { Self::from(cpuid(LEAF_01H, 0)) }
    }

    /// Decode a raw result.
    ///
    /// # Safety
    /// The caller must ensure that the passed [`CpuidResult`] belongs to a valid leaf `0x01` entry.
    #[must_use]
    pub const unsafe fn from(r: CpuidResult) -> Self {
        Self {
            edx: Leaf1Edx::from_bits(r.edx),
        }
    }

    /// Whether 4 MiB pages can be enabled through `CR4.PSE`.
    #[inline]
    #[must_use]
    pub const fn has_pse(&self) -> bool {
        self.edx.pse()
    }

    #[inline]
    #[must_use]
    pub const fn has_pge(&self) -> bool {
        self.edx.pge()
    }
}
