//! # Virtual Memory Support
//!
//! Two-level, non-PAE paging for a 32-bit x86 kernel.
//!
//! ## What you get
//! - Typed [page directory](PageDirectory) and [page table](PageTable)
//!   layouts with [`PageEntryBits`] flag access.
//! - The [self-map window](self_map): directory slot 1023 points at the
//!   directory itself, so every table is reachable at a fixed virtual address.
//! - [`boot::init`] to build the initial identity layout and turn paging on.
//! - [`Vmm`] with `map` / `unmap` / `translate`, creating page tables lazily.
//! - Seams for the [frame allocator](FrameAlloc), the
//!   [paging hardware](PagingHardware) and the [window](TableWindow), so the
//!   whole core runs hosted against a simulated machine.
//!
//! ## 32-bit Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  Dir  | Table | Offset |
//! ```
//!
//! The CPU uses the two index fields to walk two tables of 1024 (2¹⁰)
//! entries of 4 bytes each:
//!
//! ```text
//!  CR3 → Page Directory ─┬─ PDE (PS=0) → Page Table → PTE → 4 KiB page
//!                        └─ PDE (PS=1) ──────────────────→ 4 MiB page
//! ```
//!
//! | Level | Table name | Entry name | Description |
//! |:------|:-----------|:-----------|:------------|
//! | 1 | **Page Directory** | **PDE** | Root table, referenced by `CR3`. With `PS=1` (and `CR4.PSE`) an entry maps a 4 MiB page directly. |
//! | 2 | **Page Table** | **PTE** | Each entry maps a 4 KiB physical page (always a leaf). |
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──boot::build_directory──► Built ──Activator::switch──► Active
//! ```
//!
//! Building happens with paging off, through a [`PhysMapper`]. Once active,
//! every mutation goes through the self-map window and is followed by a
//! single-page TLB invalidation.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod activator;
pub mod boot;
pub mod frame;
pub mod hardware;
mod page_entry_bits;
pub mod page_table;
pub mod phys_mapper;
pub mod self_map;
pub mod vmm;

pub use crate::activator::{ActivationError, Activator, ActiveDirectory, BuiltDirectory};
pub use crate::boot::BootError;
pub use crate::frame::{Frame, FrameAlloc};
pub use crate::hardware::PagingHardware;
#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use crate::hardware::X86Paging;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{DirIndex, PageDirectory, PdEntry, PdEntryKind, Pde, Pde4M};
pub use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
pub use crate::phys_mapper::{IdentityPhysMapper, PhysMapper};
pub use crate::self_map::{ActiveWindow, Region, TableWindow};
pub use crate::vmm::{MapError, Vmm};

/// Re-export constants as info module.
pub use kernel_info::memory as info;
