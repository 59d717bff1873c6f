//! # Physical Access Before Paging
//!
//! While translation is still disabled, linear addresses *are* physical
//! addresses, so the boot sequencer reaches fresh frames through a
//! [`PhysMapper`]. Once paging is on, all table access goes through the
//! self-map window instead (see [`crate::self_map`]).

use crate::page_table::pd::PageDirectory;
use crate::page_table::pt::PageTable;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Converts physical addresses to *temporarily* usable pointers.
///
/// # Safety
/// - You must ensure `pa` is reachable and writable for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// Borrow a [`PageDirectory`] in this frame.
    ///
    /// # Safety
    /// The frame must be exclusively owned by the caller.
    #[inline]
    unsafe fn directory_mut<'a>(&self, page: PhysicalPage<Size4K>) -> &'a mut PageDirectory {
        unsafe { self.phys_to_mut::<PageDirectory>(page.base()) }
    }

    /// Borrow a [`PageTable`] in this frame.
    ///
    /// # Safety
    /// The frame must be exclusively owned by the caller.
    #[inline]
    unsafe fn table_mut<'a>(&self, page: PhysicalPage<Size4K>) -> &'a mut PageTable {
        unsafe { self.phys_to_mut::<PageTable>(page.base()) }
    }
}

/// [`PhysMapper`] for the pre-paging phase: physical address == pointer.
///
/// # Safety
/// Only meaningful while `CR0.PG` is clear (or inside an identity mapping).
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = pa.as_u32() as usize as *mut T;
        // SAFETY: Caller guarantees the frame is reachable at its physical address.
        unsafe { &mut *ptr }
    }
}
