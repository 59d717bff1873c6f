//! # Physical Frames
//!
//! A [`Frame`] is the exclusive ownership handle of one 4 KiB physical frame,
//! handed out by a [`FrameAlloc`]. It is deliberately neither `Copy` nor
//! `Clone`: returning it through [`FrameAlloc::free_frame`] consumes it, and
//! installing it as a page table moves it into the address space via
//! [`Frame::into_page`].

use core::fmt;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Exclusively owned 4 KiB physical frame.
///
/// The contents are not guaranteed to be zeroed.
#[must_use = "dropping a Frame leaks it; return it with FrameAlloc::free_frame"]
#[derive(PartialEq, Eq)]
pub struct Frame(PhysicalPage<Size4K>);

impl Frame {
    /// Mint the ownership handle for `page`.
    ///
    /// Only a frame allocator should call this, once per hand-out; two live
    /// `Frame`s for the same page break the single-owner rule.
    #[inline]
    pub const fn from_page(page: PhysicalPage<Size4K>) -> Self {
        Self(page)
    }

    /// The frame's page, without giving up ownership.
    #[inline]
    #[must_use]
    pub const fn page(&self) -> PhysicalPage<Size4K> {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.0.base()
    }

    /// Give up the handle, e.g. because the frame now lives on as a page table.
    #[inline]
    #[must_use]
    pub const fn into_page(self) -> PhysicalPage<Size4K> {
        self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#010X})", self.0.base().as_u32())
    }
}

/// Physical frame allocator contract consumed by the paging core.
///
/// The implementation decides where frames come from (bootloader pool,
/// bitmap, etc.). Returned frames **must** be 4 KiB aligned.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame.
    ///
    /// Returns `None` when the pool is exhausted.
    fn alloc_frame(&mut self) -> Option<Frame>;

    /// Return a frame to the pool.
    ///
    /// Freeing a frame that a live mapping still references is a caller
    /// error and not detected here.
    fn free_frame(&mut self, frame: Frame);
}

impl<A: FrameAlloc + ?Sized> FrameAlloc for &mut A {
    #[inline]
    fn alloc_frame(&mut self) -> Option<Frame> {
        (**self).alloc_frame()
    }

    #[inline]
    fn free_frame(&mut self, frame: Frame) {
        (**self).free_frame(frame);
    }
}
