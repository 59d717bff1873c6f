//! # Memory Page Table

pub mod pd;
pub mod pt;

use crate::page_table::pd::DirIndex;
use crate::page_table::pt::TableIndex;
use kernel_memory_addresses::VirtualAddress;

/// Hardware **Present** bit position shared across levels (bit 0).
const PRESENT_BIT: u32 = 1 << 0;

/// Hardware **Page Size** (PS) bit position (bit 7).
///
/// - In a directory entry pointing at a page table: PS **must be 0**.
/// - In a directory entry mapping a 4 MiB page: PS **must be 1**.
/// - In a 4 KiB PTE: bit 7 is **PAT** (not PS).
const PS_BIT: u32 = 1 << 7;

/// Split a virtual address into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirIndex, TableIndex) {
    (DirIndex::from(va), TableIndex::from(va))
}
