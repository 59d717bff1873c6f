//! # Boot Sequencer
//!
//! One-time construction of the kernel's address space, run while paging is
//! still off:
//!
//! | Directory slot | Contents |
//! |----------------|----------|
//! | 0              | Page table identity-mapping `0..4 MiB` with 4 KiB pages |
//! | 1 ..= 1022     | 4 MiB identity pages, slot `i` → `i * 4 MiB` |
//! | 1023           | Self-map (points at the directory's own frame) |
//!
//! Nearly the whole 4 GiB space is present after boot, so stray accesses to
//! nonexistent RAM or unclaimed device ranges do not fault. Regions can be
//! handed back with [`Vmm::unmap_large`].

use crate::PageEntryBits;
use crate::activator::{ActivationError, Activator, BuiltDirectory};
use crate::frame::FrameAlloc;
use crate::hardware::PagingHardware;
use crate::page_table::pd::{DirIndex, PdEntry, Pde, Pde4M};
use crate::page_table::pt::{PtEntry, TableIndex};
use crate::phys_mapper::PhysMapper;
use crate::self_map::TableWindow;
use crate::vmm::Vmm;
use kernel_info::memory::{ENTRIES_PER_TABLE, IDENTITY_SMALL_BYTES, LARGE_PAGE_SIZE, SELF_MAP_SLOT};
use kernel_memory_addresses::{PhysicalPage, Size4K, Size4M};
use log::{debug, info, warn};

const _: () = {
    // Exactly one boot table backs the small-page identity region.
    assert!(IDENTITY_SMALL_BYTES == LARGE_PAGE_SIZE);
};

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum BootError {
    #[error("no frame left for the boot page directory or its first table")]
    AllocationExhausted,
    #[error(transparent)]
    Activation(#[from] ActivationError),
}

/// Intended initial contents of a directory slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotLayout {
    /// Identity map through the boot page table (4 KiB pages).
    IdentitySmall,
    /// Identity map with one 4 MiB page.
    IdentityLarge,
    /// Self-map slot.
    SelfMap,
}

/// Boot-time layout of directory slot `i`.
#[must_use]
pub const fn slot_layout(i: DirIndex) -> SlotLayout {
    match i.as_usize() {
        0 => SlotLayout::IdentitySmall,
        SELF_MAP_SLOT => SlotLayout::SelfMap,
        _ => SlotLayout::IdentityLarge,
    }
}

/// Allocate and populate the boot directory and its single page table.
///
/// Both frames are reached through `phys`, since translation is still
/// disabled. If the second allocation fails, the first frame is returned
/// to `alloc` before the error is reported.
///
/// # Errors
/// [`BootError::AllocationExhausted`] if fewer than two frames are available.
#[allow(clippy::cast_possible_truncation)]
pub fn build_directory<A: FrameAlloc + ?Sized, M: PhysMapper>(
    alloc: &mut A,
    phys: &M,
) -> Result<BuiltDirectory, BootError> {
    let Some(dir_frame) = alloc.alloc_frame() else {
        warn!("no frame for the boot page directory");
        return Err(BootError::AllocationExhausted);
    };
    let Some(table_frame) = alloc.alloc_frame() else {
        warn!("no frame for the boot page table");
        alloc.free_frame(dir_frame);
        return Err(BootError::AllocationExhausted);
    };

    let dir_page = dir_frame.into_page();
    let table_page = table_frame.into_page();

    // SAFETY: the frame was just allocated and paging is off.
    let table = unsafe { phys.table_mut(table_page) };
    for i in 0..ENTRIES_PER_TABLE {
        let page = PhysicalPage::<Size4K>::from_number(i as u32);
        table.set(
            TableIndex::new(i as u16),
            PtEntry::make_4k(page, PageEntryBits::new_common_rw()),
        );
    }

    // SAFETY: the frame was just allocated and paging is off.
    let dir = unsafe { phys.directory_mut(dir_page) };
    for i in DirIndex::all() {
        let entry = match slot_layout(i) {
            SlotLayout::IdentitySmall => {
                PdEntry::present_next_with(Pde::new_common_rw(), table_page)
            }
            SlotLayout::IdentityLarge => PdEntry::present_leaf_with(
                Pde4M::new_common_rw(),
                PhysicalPage::<Size4M>::from_number(i.as_usize() as u32),
            ),
            SlotLayout::SelfMap => PdEntry::present_next_with(Pde::new_common_rw(), dir_page),
        };
        dir.set(i, entry);
    }

    debug!(
        "boot directory at {}, identity table at {}",
        dir_page.base(),
        table_page.base()
    );
    Ok(BuiltDirectory::new(dir_page))
}

/// Build the boot address space and activate it.
///
/// # Errors
/// - [`BootError::AllocationExhausted`] from [`build_directory`].
/// - [`BootError::Activation`] if the CPU lacks 4 MiB page support; no frame
///   is allocated in that case.
///
/// # Safety
/// Must run once, with paging disabled, from code that lives in the
/// identity-mapped low memory. `phys` must reach physical memory directly.
pub unsafe fn init<A, M, W, H>(
    alloc: &mut A,
    phys: &M,
    window: W,
    hardware: H,
) -> Result<Vmm<W, H>, BootError>
where
    A: FrameAlloc + ?Sized,
    M: PhysMapper,
    W: TableWindow,
    H: PagingHardware,
{
    // Checked up front so a refused boot leaves the allocator untouched.
    if !hardware.supports_large_pages() {
        warn!("no PSE support; boot address space not built");
        return Err(ActivationError::UnsupportedHardwareFeature.into());
    }

    info!("building boot address space");
    let built = build_directory(alloc, phys)?;

    let mut activator = Activator::new(hardware);
    let previous = unsafe { activator.switch(built) }?;
    debug_assert!(previous.is_none(), "boot activates the first directory");

    info!("paging enabled");
    // SAFETY: the directory just activated carries the self-map in slot 1023.
    Ok(unsafe { Vmm::from_active(window, activator) })
}
