//! # Paging Layout Constants
//!
//! This crate is the single source of truth for the fixed geometry of the
//! 32-bit, two-level (non-PAE) paging scheme: table sizes, large-page size,
//! the self-map slot and the virtual windows it produces, and the extent of
//! the boot-time identity map.
//!
//! ## Virtual Address Space Layout
//!
//! After boot, the kernel's single address space looks like this:
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Identity, 4 KiB pages          │  directory slot 0
//! 0x0040_0000 ├─────────────────────────────────┤ IDENTITY_SMALL_BYTES
//!             │                                 │
//!             │  Identity, 4 MiB large pages    │  directory slots 1..=1022
//!             │                                 │
//! 0xFFC0_0000 ├─────────────────────────────────┤ PAGE_TABLES_BASE
//!             │  Self-map window (page tables)  │  directory slot 1023
//! 0xFFFF_F000 ├─────────────────────────────────┤ PAGE_DIR_VADDR
//!             │  Page directory itself          │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! The constants are `const` and checked with compile-time assertions, so a
//! misconfigured layout fails the build instead of the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
