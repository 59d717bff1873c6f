//! # 32-bit Page Directory
//!
//! One directory of 1024 slots covers the whole 4 GiB address space, 4 MiB
//! per slot. Bit 7 (`PS`) of a slot decides how the CPU reads the rest:
//!
//! | `PS` | meaning                          | base bits | type     |
//! |------|----------------------------------|-----------|----------|
//! | 0    | points at a 4 KiB page table     | `31:12`   | [`Pde`]  |
//! | 1    | maps one 4 MiB page (`CR4.PSE`)  | `31:22`   | [`Pde4M`]|
//!
//! [`PdEntry`] stores either form in the same 32 bits; [`PdEntry::kind`]
//! reads `P` and `PS` and hands back the matching one. Writes to a live
//! directory need the usual `invlpg` afterwards; nothing here does that.

use crate::page_table::{PRESENT_BIT, PS_BIT};
use bitfield_struct::bitfield;
use kernel_info::memory::ENTRIES_PER_TABLE;
use kernel_memory_addresses::{PageSize, PhysicalPage, Size4K, Size4M, VirtualAddress};

/// A directory slot: raw bits, a table link, or a 4 MiB leaf.
#[derive(Copy, Clone)]
#[repr(C)]
pub union PdEntry {
    bits: u32,
    table: Pde,
    large: Pde4M,
}

/// Directory entry linking a page table (`PS=0`).
#[bitfield(u32)]
pub struct Pde {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub write_through: bool,
    pub cache_disable: bool,
    pub accessed: bool,
    #[bits(1)]
    __dirty_unused: u8,
    /// Stays clear; set would turn the entry into a [`Pde4M`].
    #[bits(1)]
    __ps_clear: u8,
    #[bits(1)]
    __global_unused: u8,
    #[bits(3)]
    pub os_available: u8,
    /// Frame number of the linked table.
    #[bits(20)]
    table_frame: u32,
}

impl Pde {
    /// Link to the table in `phys`.
    #[inline]
    #[must_use]
    pub const fn with_physical_page(self, phys: PhysicalPage<Size4K>) -> Self {
        self.with_table_frame(phys.number())
    }

    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_number(self.table_frame())
    }

    /// Supervisor-only, read/write link used for the boot tables.
    #[inline]
    #[must_use]
    pub const fn new_common_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }

    /// Link for tables created on demand: present, writable and user.
    ///
    /// Rights combine across both levels, so the page entries alone end
    /// up deciding what is allowed.
    #[inline]
    #[must_use]
    pub const fn new_table_link() -> Self {
        Self::new_common_rw().with_user(true)
    }
}

/// Directory entry mapping a 4 MiB page (`PS=1`).
///
/// Bits 13..21 would carry physical address bits 32 and up under PSE-36;
/// they stay zero here.
#[bitfield(u32)]
pub struct Pde4M {
    pub present: bool,
    pub writable: bool,
    pub user: bool,
    pub write_through: bool,
    pub cache_disable: bool,
    pub accessed: bool,
    pub dirty: bool,
    #[bits(default = true)]
    pub(crate) page_size: bool,
    pub global: bool,
    #[bits(3)]
    pub os_available: u8,
    pub pat: bool,
    #[bits(9)]
    __pse36_high: u16,
    /// Number of the 4 MiB frame, which equals the slot for identity maps.
    #[bits(10)]
    large_frame: u16,
}

impl Pde4M {
    /// Point at the 4 MiB frame `phys`; also asserts `PS`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_physical_page(self, phys: PhysicalPage<Size4M>) -> Self {
        self.with_large_frame(phys.number() as u16).with_page_size(true)
    }

    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size4M> {
        PhysicalPage::from_number(self.large_frame() as u32)
    }

    /// Supervisor-only, read/write 4 MiB page.
    #[inline]
    #[must_use]
    pub const fn new_common_rw() -> Self {
        Self::new().with_present(true).with_writable(true).with_page_size(true)
    }
}

/// Directory slot number, VA bits `[31:22]`. Always below 1024.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirIndex(u16);

/// What a present directory slot holds.
#[derive(Copy, Clone, Debug)]
pub enum PdEntryKind {
    NextPageTable(PhysicalPage<Size4K>, Pde),
    Leaf4MiB(PhysicalPage<Size4M>, Pde4M),
}

/// 1024 directory slots in one 4 KiB frame.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

impl DirIndex {
    /// Slot covering `va`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new((va.as_u32() >> Size4M::SHIFT) as u16)
    }

    /// # Panics
    /// In debug builds, if `v >= 1024`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Lowest address of the 4 MiB region behind this slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << Size4M::SHIFT)
    }

    /// Slots 0 through 1023.
    #[allow(clippy::cast_possible_truncation)]
    pub fn all() -> impl Iterator<Item = Self> {
        (0..ENTRIES_PER_TABLE).map(|i| Self::new(i as u16))
    }
}

impl Default for PdEntry {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl PdEntry {
    /// Absent slot.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self { bits: 0 }
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u32 {
        // SAFETY: every variant is a plain u32.
        unsafe { self.bits }
    }

    #[inline]
    #[must_use]
    pub const fn present(self) -> bool {
        self.into_bits() & PRESENT_BIT != 0
    }

    /// Decode a present slot; `None` when `P` is clear, whatever else is set.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> Option<PdEntryKind> {
        if !self.present() {
            return None;
        }

        // SAFETY: PS selects which overlay describes the bits.
        Some(unsafe {
            if self.bits & PS_BIT != 0 {
                PdEntryKind::Leaf4MiB(self.large.physical_page(), self.large)
            } else {
                PdEntryKind::NextPageTable(self.table.physical_page(), self.table)
            }
        })
    }

    /// Present link to the table in `page`; `PS` is forced clear.
    #[must_use]
    pub const fn present_next_with(flags: Pde, page: PhysicalPage<Size4K>) -> Self {
        let bits = flags.with_present(true).with_physical_page(page).into_bits();
        Self::from_bits(bits & !PS_BIT)
    }

    /// Present 4 MiB mapping of `page`; `PS` is forced set.
    #[must_use]
    pub const fn present_leaf_with(flags: Pde4M, page: PhysicalPage<Size4M>) -> Self {
        Self {
            large: flags.with_present(true).with_physical_page(page),
        }
    }
}

impl PageDirectory {
    #[inline]
    #[must_use]
    pub const fn get(&self, i: DirIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: DirIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Mark slot `i` absent.
    #[inline]
    pub const fn set_zero(&mut self, i: DirIndex) {
        self.set(i, PdEntry::zero());
    }
}
