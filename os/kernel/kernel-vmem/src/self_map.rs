//! # Self-Map Window
//!
//! Directory slot 1023 points back at the directory's own frame. Walking a
//! virtual address through that slot makes the hardware treat the directory
//! as a page table, which yields two fixed windows:
//!
//! ```text
//! VA = [ 1023 : 10 ] [ i : 10 ] [ offset : 12 ]
//!        │             │
//!        │             └─► directory entry i is used as a "PTE",
//!        │                 so the 4 KiB page behind it is the table of slot i
//!        └───────────────► directory used as the page table
//!
//! PAGE_TABLES_BASE + i * 4096   → page table of directory slot i
//! PAGE_DIR_VADDR  (i = 1023)    → the page directory itself
//! ```
//!
//! The window for slot `i` only resolves while directory entry `i` is a
//! present table link. Whenever that entry changes, the cached translation
//! of the window page must be invalidated before the window is used.

use crate::page_table::pd::{DirIndex, PageDirectory, PdEntry, PdEntryKind};
use crate::page_table::pt::PageTable;
use kernel_info::memory::{PAGE_DIR_VADDR, PAGE_SIZE, PAGE_TABLES_BASE, SELF_MAP_SLOT};
use kernel_memory_addresses::VirtualAddress;

/// The directory index reserved for the self-map.
#[allow(clippy::cast_possible_truncation)]
pub const SELF_MAP_INDEX: DirIndex = DirIndex::new(SELF_MAP_SLOT as u16);

/// Virtual address at which the page table for directory slot `i` is visible.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn table_window(i: DirIndex) -> VirtualAddress {
    VirtualAddress::new(PAGE_TABLES_BASE.as_u32() + (i.as_usize() as u32) * PAGE_SIZE)
}

/// Virtual address at which the active page directory is visible.
#[inline]
#[must_use]
pub const fn directory_window() -> VirtualAddress {
    PAGE_DIR_VADDR
}

/// Whether `va` falls inside the 4 MiB self-map window.
#[inline]
#[must_use]
pub const fn is_window_address(va: VirtualAddress) -> bool {
    va.as_u32() >= PAGE_TABLES_BASE.as_u32()
}

/// Resolves self-map window addresses to typed table views.
///
/// The production implementation is [`ActiveWindow`], which dereferences
/// the window address in the running address space. Hosted tests substitute
/// a simulated MMU that performs the two-level walk through the simulated
/// `CR3`.
pub trait TableWindow {
    /// Reinterpret the 4 KiB page visible at `va` as a `T`.
    ///
    /// # Safety
    /// - `va` must be a window address whose walk currently resolves.
    /// - `T` must be a page-sized table type.
    /// - No other reference to the same page may be alive for `'a`.
    unsafe fn window_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T;

    /// The active page directory, through [`directory_window`].
    ///
    /// # Safety
    /// Paging must be enabled with a directory whose slot 1023 is the self-map.
    #[inline]
    unsafe fn directory<'a>(&self) -> &'a mut PageDirectory {
        unsafe { self.window_mut::<PageDirectory>(directory_window()) }
    }

    /// The page table of directory slot `i`, through [`table_window`].
    ///
    /// # Safety
    /// Directory entry `i` must be a present table link and its window page
    /// must not hold a stale cached translation.
    #[inline]
    unsafe fn table<'a>(&self, i: DirIndex) -> &'a mut PageTable {
        debug_assert!(i != SELF_MAP_INDEX, "slot 1023 is the directory itself");
        unsafe { self.window_mut::<PageTable>(table_window(i)) }
    }
}

/// [`TableWindow`] over the running CPU's active address space.
#[derive(Debug, Default, Copy, Clone)]
pub struct ActiveWindow;

impl TableWindow for ActiveWindow {
    #[inline]
    unsafe fn window_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        debug_assert!(is_window_address(va));
        // SAFETY: Caller guarantees the window page is mapped and unaliased.
        unsafe { &mut *va.as_mut_ptr::<T>() }
    }
}

/// What a 4 MiB directory region currently is.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Region {
    /// Backed by a page table; 4 KiB granularity (slot 0 after boot, plus
    /// every lazily created table).
    TableBacked,
    /// Mapped as one 4 MiB identity page.
    IdentityLarge,
    /// The self-map window (slot 1023).
    SelfMap,
    /// Directory entry not present.
    Unmapped,
}

impl Region {
    /// Classify directory slot `i` holding `entry`.
    #[must_use]
    pub const fn classify(i: DirIndex, entry: PdEntry) -> Self {
        if i.as_usize() == SELF_MAP_SLOT {
            return Self::SelfMap;
        }
        match entry.kind() {
            None => Self::Unmapped,
            Some(PdEntryKind::Leaf4MiB(..)) => Self::IdentityLarge,
            Some(PdEntryKind::NextPageTable(..)) => Self::TableBacked,
        }
    }
}
