//! # Kernel Frame Allocation
//!
//! Physical frame allocation for the paging core in `kernel-vmem`.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  kernel-vmem (boot, Vmm)     │  consumes FrameAlloc
//! └──────────────┬───────────────┘
//!                │ alloc_frame / free_frame
//! ┌──────────────▼───────────────┐
//! │  BitmapFrameAlloc            │  1 bit per 4 KiB frame, no heap
//! └──────────────────────────────┘
//! ```
//!
//! The allocator is the sole owner of frame lifetimes: the paging core only
//! allocates on the lazy page-table path and never frees on `unmap`.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod frame_alloc;

pub use frame_alloc::{BitmapError, BitmapFrameAlloc};
