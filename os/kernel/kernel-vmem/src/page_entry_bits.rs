use bitfield_struct::bitfield;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};

/// Represents a single 32-bit (non-PAE) page entry in its raw bitfield form.
///
/// This structure models the bit layout shared by page-table entries and by
/// the low flag bits of page-directory entries. Each bit corresponds to a
/// hardware-defined flag or address field as specified by the Intel manuals.
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (leaf only) |
/// | 7         | `PS` / `PAT`      | Large page in a PDE, PAT in a PTE |
/// | 8         | `G`               | Global (leaf only) |
/// | 9–11      | OS avail          | Reserved for OS use |
/// | 12–31     | `addr`            | Physical frame bits [31:12] |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new()
///     .with_present(true)
///     .with_writable(true)
///     .with_physical_address(PhysicalAddress::new(0x0050_0000));
/// assert!(e.present());
/// assert_eq!(e.into_bits(), 0x0050_0003);
/// ```
#[bitfield(u32)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Clear implies a not-present entry; every other bit is then free for
    /// software and carries no meaningful address.
    pub present: bool,

    /// Writable (RW, bit 1).
    ///
    /// Set to allow writes; clear for read-only. Supervisor writes to
    /// read-only pages are only blocked when `CR0.WP` is set.
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow user-mode access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    ///
    /// Typically set for memory-mapped device windows.
    pub cache_disabled: bool,

    /// Accessed (A, bit 5).
    ///
    /// Set by the CPU on first access through this entry.
    pub accessed: bool,

    /// Dirty (D, bit 6) — **leaf only**.
    ///
    /// Set by the CPU on first write to a leaf mapping.
    pub dirty: bool,

    /// Large Page / Page Size (PS, bit 7).
    ///
    /// In a page-directory entry, **set** means the entry maps a 4 MiB page
    /// directly (requires `CR4.PSE`). In a page-table entry this position is
    /// the PAT selector and is passed through as given.
    pub large_page: bool,

    /// Global (G, bit 8) — **leaf only**.
    ///
    /// When set on a leaf mapping (and `CR4.PGE` is enabled), the TLB entry
    /// survives CR3 reloads.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical address bits [31:12] (bits 12..=31).
    #[bits(20)]
    phys_addr_bits_31_12: u32,
}

impl PageEntryBits {
    /// Mask of the twelve flag bits (everything below the frame address).
    pub const FLAGS_MASK: u32 = Size4K::SIZE - 1;

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_31_12(phys.as_u32() >> Size4K::SHIFT);
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(mut self, phys: PhysicalAddress) -> Self {
        self.set_physical_address(phys);
        self
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_31_12() << Size4K::SHIFT)
    }

    /// Only the flag bits, with the address field cleared.
    #[inline]
    #[must_use]
    pub const fn flags_only(self) -> Self {
        Self::from_bits(self.into_bits() & Self::FLAGS_MASK)
    }

    /// Normalize caller-provided flags for a 4 KiB leaf.
    ///
    /// Drops any address bits and forces `present`. Bit 7 stays: a page-table
    /// entry reads it as PAT, so it cannot turn the leaf into a large page.
    #[inline]
    #[must_use]
    pub const fn leaf_4k_flags(self) -> Self {
        self.flags_only().with_present(true)
    }

    /// Whether every flag set in `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        let o = other.flags_only().into_bits();
        self.into_bits() & o == o
    }

    /// Present and writable, supervisor only.
    #[inline]
    #[must_use]
    pub const fn new_common_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }
}
