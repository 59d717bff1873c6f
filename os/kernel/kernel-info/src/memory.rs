//! # Memory Layout

use kernel_memory_addresses::{PageSize, Size4K, Size4M, VirtualAddress};

/// Size of a small page, a page table and a page directory, in bytes.
pub const PAGE_SIZE: u32 = Size4K::SIZE;

/// Size of a large page mapped directly by a directory entry.
pub const LARGE_PAGE_SIZE: u32 = Size4M::SIZE;

/// Number of 32-bit entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Directory slot that points back at the directory itself.
pub const SELF_MAP_SLOT: usize = ENTRIES_PER_TABLE - 1;

/// Virtual base of the page-table window created by the self-map slot.
///
/// The page table behind directory slot `i` is visible at
/// `PAGE_TABLES_BASE + i * PAGE_SIZE`.
pub const PAGE_TABLES_BASE: VirtualAddress =
    VirtualAddress::new((SELF_MAP_SLOT as u32) << Size4M::SHIFT);

/// Virtual address at which the active page directory is visible.
pub const PAGE_DIR_VADDR: VirtualAddress =
    VirtualAddress::new(PAGE_TABLES_BASE.as_u32() + (SELF_MAP_SLOT as u32) * PAGE_SIZE);

/// Extent of the identity map backed by 4 KiB pages (directory slot 0).
///
/// Keeps low memory, including the code that flips `CR0.PG`, executable at
/// page granularity right after paging comes on.
pub const IDENTITY_SMALL_BYTES: u32 = LARGE_PAGE_SIZE;

/// Directory slots eagerly identity-mapped with large pages at boot.
pub const IDENTITY_LARGE_SLOTS: core::ops::RangeInclusive<usize> = 1..=SELF_MAP_SLOT - 1;

const _: () = {
    assert!(ENTRIES_PER_TABLE * 4 == PAGE_SIZE as usize);
    assert!(LARGE_PAGE_SIZE == PAGE_SIZE * ENTRIES_PER_TABLE as u32);
    assert!(PAGE_TABLES_BASE.as_u32() == 0xFFC0_0000);
    assert!(PAGE_DIR_VADDR.as_u32() == 0xFFFF_F000);
    assert!(IDENTITY_SMALL_BYTES.is_multiple_of(PAGE_SIZE));
};
