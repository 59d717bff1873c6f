//! # Virtual Memory Manager
//!
//! [`Vmm`] is the single choke point for mutating the active address space.
//! It reaches the directory and its tables exclusively through the self-map
//! window ([`TableWindow`]) and keeps the TLB coherent through the
//! [`Activator`]'s hardware, one page at a time.
//!
//! ```rust,ignore
//! let hw = unsafe { X86Paging::new() };
//! let mut vmm = unsafe { boot::init(&mut frames, &IdentityPhysMapper, ActiveWindow, hw) }?;
//! let va = VirtualAddress::new(0x0000_3000);
//! let rw = PageEntryBits::new().with_writable(true);
//! vmm.map(va, PhysicalAddress::new(0x0050_0000), rw, &mut frames)?;
//! assert!(vmm.translate(va).is_some());
//! ```

use crate::PageEntryBits;
use crate::activator::Activator;
use crate::frame::FrameAlloc;
use crate::hardware::PagingHardware;
use crate::page_table::pd::{DirIndex, PdEntry, PdEntryKind, Pde};
use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
use crate::page_table::split_indices;
use crate::self_map::{Region, SELF_MAP_INDEX, TableWindow, table_window};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, Size4M, VirtualAddress};
use log::{debug, trace, warn};

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum MapError {
    /// The frame allocator could not supply a frame for a new page table.
    #[error("no frame left for a new page table")]
    AllocationExhausted,
    /// The address lies in a 4 MiB page or in the self-map window.
    #[error("{0} cannot take a 4 KiB mapping")]
    InvalidTranslationRequest(VirtualAddress),
}

/// The kernel's handle to the active address space.
pub struct Vmm<W: TableWindow, H: PagingHardware> {
    window: W,
    activator: Activator<H>,
}

impl<W: TableWindow, H: PagingHardware> Vmm<W, H> {
    /// Take over an already active address space.
    ///
    /// # Safety
    /// `activator` must have a current directory whose slot 1023 is the
    /// self-map, and `window` must resolve addresses through it.
    pub const unsafe fn from_active(window: W, activator: Activator<H>) -> Self {
        Self { window, activator }
    }

    #[inline]
    #[must_use]
    pub const fn activator(&self) -> &Activator<H> {
        &self.activator
    }

    #[inline]
    #[must_use]
    pub const fn hardware(&self) -> &H {
        self.activator.hardware()
    }

    /// Find the page-table entry for `va`, optionally creating its table.
    ///
    /// - Large-page regions and the self-map window are refused.
    /// - An absent directory entry yields `Ok(None)` when `create` is `None`.
    ///   Otherwise a frame is taken from `create`, linked into the directory
    ///   as present, writable and user, and zeroed through the window.
    ///
    /// # Errors
    /// - [`MapError::InvalidTranslationRequest`] for large pages and slot 1023.
    /// - [`MapError::AllocationExhausted`] if a table is needed but no frame is left.
    pub fn entry_for(
        &mut self,
        va: VirtualAddress,
        create: Option<&mut dyn FrameAlloc>,
    ) -> Result<Option<&mut PtEntry>, MapError> {
        let (di, ti) = split_indices(va);
        if di == SELF_MAP_INDEX {
            warn!("refusing 4 KiB lookup of {va} inside the self-map window");
            return Err(MapError::InvalidTranslationRequest(va));
        }

        // SAFETY: `from_active` guarantees an active directory with the self-map.
        let dir = unsafe { self.window.directory() };
        match dir.get(di).kind() {
            Some(PdEntryKind::NextPageTable(..)) => {}
            Some(PdEntryKind::Leaf4MiB(base, _)) => {
                warn!("refusing 4 KiB lookup of {va} inside large page {}", base.base());
                return Err(MapError::InvalidTranslationRequest(va));
            }
            None => {
                let Some(alloc) = create else {
                    return Ok(None);
                };
                let Some(frame) = alloc.alloc_frame() else {
                    warn!("no frame for the page table of {}", di.base());
                    return Err(MapError::AllocationExhausted);
                };

                let page = frame.into_page();
                dir.set(di, PdEntry::present_next_with(Pde::new_table_link(), page));
                self.activator
                    .hardware_mut()
                    .invalidate_page(table_window(di).page());

                // SAFETY: the entry was just linked and its window page invalidated.
                unsafe { self.window.table(di) }.zero();
                debug!("created page table {} for region {}", page.base(), di.base());
            }
        }

        // SAFETY: directory entry `di` is a present table link.
        let table = unsafe { self.window.table(di) };
        Ok(Some(table.get_mut(ti)))
    }

    /// Map the 4 KiB page containing `va` to the frame containing `pa`.
    ///
    /// `flags` are reduced to their twelve flag bits with `present` forced;
    /// bit 7 lands in the entry as PAT. Remapping an already-mapped page overwrites it.
    ///
    /// # Errors
    /// See [`entry_for`](Self::entry_for).
    pub fn map<A: FrameAlloc>(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        flags: PageEntryBits,
        alloc: &mut A,
    ) -> Result<(), MapError> {
        let entry = self
            .entry_for(va, Some(alloc as &mut dyn FrameAlloc))?
            .ok_or(MapError::InvalidTranslationRequest(va))?;
        *entry = PtEntry::make_4k(pa.page::<Size4K>(), flags);

        let bits = flags.leaf_4k_flags().into_bits();
        trace!("map {} -> {} [{bits:#05X}]", va.page::<Size4K>(), pa.page::<Size4K>());
        self.activator.hardware_mut().invalidate_page(va.page());
        Ok(())
    }

    /// Remove the 4 KiB mapping of `va`, if there is one.
    ///
    /// Unmapped addresses, large-page regions and the self-map window are
    /// left alone. The frame behind the mapping is never freed here.
    pub fn unmap(&mut self, va: VirtualAddress) {
        let cleared = match self.entry_for(va, None) {
            Ok(Some(entry)) if entry.is_present() => {
                *entry = PtEntry::zero();
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!("unmap of {va} ignored: {e}");
                false
            }
        };

        if cleared {
            trace!("unmap {}", va.page::<Size4K>());
            self.activator.hardware_mut().invalidate_page(va.page());
        }
    }

    /// Translate `va` to the physical address of the same byte.
    ///
    /// Returns the leaf entry's flag bits alongside. For a 4 MiB page bit 7
    /// (`large_page`) is the `PS` bit; for a 4 KiB page it is whatever PAT
    /// value was mapped. Absent mappings yield `None`.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<(PhysicalAddress, PageEntryBits)> {
        let (di, ti) = split_indices(va);

        // SAFETY: read-only access; no mutable view is alive while `&self` is held.
        let pde = unsafe { self.window.directory() }.get(di);
        match pde.kind()? {
            PdEntryKind::Leaf4MiB(base, leaf) => Some((
                base.join(va.offset::<Size4M>()),
                PageEntryBits::from_bits(leaf.into_bits()).flags_only(),
            )),
            PdEntryKind::NextPageTable(..) => {
                // Slot 1023 resolves to the directory itself, read as a table.
                let table: &PageTable =
                    unsafe { self.window.window_mut::<PageTable>(table_window(di)) };
                let (page, flags) = table.get(ti).page_4k()?;
                Some((page.join(va.offset::<Size4K>()), flags.flags_only()))
            }
        }
    }

    /// Classify the 4 MiB region containing `va`.
    #[must_use]
    pub fn region(&self, va: VirtualAddress) -> Region {
        let di = DirIndex::from(va);
        Region::classify(di, self.directory_slot(di))
    }

    /// Release a 4 MiB page so the region becomes absent.
    ///
    /// An absent slot is left as is. Afterwards, [`map`](Self::map) may
    /// populate the region with a lazily created table.
    ///
    /// # Errors
    /// [`MapError::InvalidTranslationRequest`] for table-backed regions and the
    /// self-map window.
    pub fn unmap_large(&mut self, va: VirtualAddress) -> Result<(), MapError> {
        let di = DirIndex::from(va);
        if di == SELF_MAP_INDEX {
            warn!("refusing to release the self-map window");
            return Err(MapError::InvalidTranslationRequest(va));
        }

        // SAFETY: `from_active` guarantees an active directory with the self-map.
        let dir = unsafe { self.window.directory() };
        match dir.get(di).kind() {
            None => Ok(()),
            Some(PdEntryKind::NextPageTable(..)) => {
                warn!("refusing to release table-backed region {}", di.base());
                Err(MapError::InvalidTranslationRequest(va))
            }
            Some(PdEntryKind::Leaf4MiB(base, _)) => {
                dir.set_zero(di);
                debug!("released large page {} at {}", base.base(), di.base());
                self.activator.hardware_mut().invalidate_page(di.base().page());
                Ok(())
            }
        }
    }

    /// Map every 4 KiB page overlapping `[va, va + len)` to consecutive
    /// frames starting at the frame containing `pa`.
    ///
    /// Stops at the first failure; pages mapped before it stay mapped.
    ///
    /// # Errors
    /// The first error of [`map`](Self::map), or
    /// [`MapError::InvalidTranslationRequest`] if the range runs past 4 GiB.
    pub fn map_range<A: FrameAlloc>(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        len: u32,
        flags: PageEntryBits,
        alloc: &mut A,
    ) -> Result<(), MapError> {
        let va0 = va.page::<Size4K>().base();
        let pa0 = pa.page::<Size4K>().base();
        for i in 0..pages_overlapping(va, len) {
            let (Some(v), Some(p)) = (page_step(va0, i), page_step_phys(pa0, i)) else {
                return Err(MapError::InvalidTranslationRequest(va));
            };
            self.map(v, p, flags, alloc)?;
        }
        Ok(())
    }

    /// Unmap every 4 KiB page overlapping `[va, va + len)`.
    pub fn unmap_range(&mut self, va: VirtualAddress, len: u32) {
        let va0 = va.page::<Size4K>().base();
        for i in 0..pages_overlapping(va, len) {
            let Some(v) = page_step(va0, i) else {
                break;
            };
            self.unmap(v);
        }
    }

    /// Decoded directory slot `i`, or `None` when absent.
    #[must_use]
    pub fn directory_entry(&self, i: DirIndex) -> Option<PdEntryKind> {
        self.directory_slot(i).kind()
    }

    /// Present entries of the table behind slot `i`.
    ///
    /// `None` unless slot `i` is table-backed (the self-map slot never is).
    pub fn table_entries(
        &self,
        i: DirIndex,
    ) -> Option<impl Iterator<Item = (TableIndex, PtEntry)> + '_> {
        if i == SELF_MAP_INDEX {
            return None;
        }
        match self.directory_entry(i)? {
            PdEntryKind::NextPageTable(..) => {
                // SAFETY: slot `i` is a present table link.
                let table: &PageTable = unsafe { self.window.table(i) };
                Some(table.present_entries())
            }
            PdEntryKind::Leaf4MiB(..) => None,
        }
    }

    fn directory_slot(&self, i: DirIndex) -> PdEntry {
        // SAFETY: read-only access; no mutable view is alive while `&self` is held.
        unsafe { self.window.directory() }.get(i)
    }
}

fn pages_overlapping(va: VirtualAddress, len: u32) -> u64 {
    let span = u64::from(va.offset::<Size4K>().as_u32()) + u64::from(len);
    span.div_ceil(u64::from(Size4K::SIZE))
}

fn page_step(base: VirtualAddress, i: u64) -> Option<VirtualAddress> {
    base.checked_add(u32::try_from(i * u64::from(Size4K::SIZE)).ok()?)
}

fn page_step_phys(base: PhysicalAddress, i: u64) -> Option<PhysicalAddress> {
    base.checked_add(u32::try_from(i * u64::from(Size4K::SIZE)).ok()?)
}
