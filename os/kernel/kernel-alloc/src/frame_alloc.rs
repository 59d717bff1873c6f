//! # Bitmap Frame Allocator
//!
//! Manages a fixed physical window `[base, base + frames * 4 KiB)` with one
//! bit per frame. The bitmap lives inline, so the allocator works before any
//! heap exists.
//!
//! ```rust
//! use kernel_alloc::frame_alloc::BitmapFrameAlloc;
//! use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};
//! use kernel_vmem::FrameAlloc;
//!
//! let base = PhysicalPage::from_addr(PhysicalAddress::new(0x0010_0000));
//! let mut frames = BitmapFrameAlloc::<2>::new(base, 40).unwrap();
//! let f = frames.alloc_frame().unwrap();
//! assert_eq!(f.base().as_u32(), 0x0010_0000);
//! assert_eq!(frames.live_frames(), 1);
//! frames.free_frame(f);
//! assert_eq!(frames.free_frames(), 40);
//! ```

use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::{Frame, FrameAlloc};
use log::{debug, trace, warn};

const WORD_BITS: u32 = u32::BITS;

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum BitmapError {
    /// More frames requested than the bitmap has bits for.
    #[error("{requested} frames exceed the bitmap capacity of {capacity}")]
    CapacityExceeded { requested: u32, capacity: u32 },
    /// The managed window would extend past 4 GiB.
    #[error("frame window starting at {0} runs past 4 GiB")]
    WindowOverflow(PhysicalAddress),
}

/// One-bit-per-frame allocator over `WORDS * 32` frames at most.
///
/// A set bit means the frame is live (handed out or reserved). Allocation
/// always returns the lowest free frame.
pub struct BitmapFrameAlloc<const WORDS: usize> {
    base: PhysicalPage<Size4K>,
    frames: u32,
    live: u32,
    bitmap: [u32; WORDS],
}

impl<const WORDS: usize> BitmapFrameAlloc<WORDS> {
    /// Largest window this bitmap can describe.
    #[allow(clippy::cast_possible_truncation)]
    pub const CAPACITY: u32 = (WORDS as u32) * WORD_BITS;

    /// Manage `frames` frames starting at `base`, all initially free.
    ///
    /// # Errors
    /// - [`BitmapError::CapacityExceeded`] if `frames > Self::CAPACITY`.
    /// - [`BitmapError::WindowOverflow`] if the window does not fit below 4 GiB.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(base: PhysicalPage<Size4K>, frames: u32) -> Result<Self, BitmapError> {
        if frames > Self::CAPACITY {
            return Err(BitmapError::CapacityExceeded {
                requested: frames,
                capacity: Self::CAPACITY,
            });
        }

        let end = u64::from(base.base().as_u32()) + u64::from(frames) * u64::from(PAGE_SIZE);
        if end > 1 << 32 {
            return Err(BitmapError::WindowOverflow(base.base()));
        }

        let mut bitmap = [0; WORDS];
        // Bits past the window are permanently taken.
        for (w, word) in bitmap.iter_mut().enumerate() {
            let first = w as u32 * WORD_BITS;
            if first >= frames {
                *word = u32::MAX;
            } else if frames - first < WORD_BITS {
                *word = u32::MAX << (frames - first);
            }
        }

        debug!(
            "bitmap frame allocator: {frames} frames at {} ({} KiB)",
            base.base(),
            u64::from(frames) * u64::from(PAGE_SIZE) / 1024
        );
        Ok(Self {
            base,
            frames,
            live: 0,
            bitmap,
        })
    }

    /// Number of frames in the managed window.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.frames
    }

    /// Frames currently handed out or reserved.
    #[inline]
    #[must_use]
    pub const fn live_frames(&self) -> u32 {
        self.live
    }

    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> u32 {
        self.frames - self.live
    }

    /// Whether `page` lies in the window and is currently live.
    #[must_use]
    pub fn is_live(&self, page: PhysicalPage<Size4K>) -> bool {
        self.index_of(page).is_some_and(|i| self.test(i))
    }

    /// Take `page` out of circulation without handing out a [`Frame`],
    /// e.g. because the kernel image occupies it.
    ///
    /// Returns `false` if the page is outside the window or already live.
    pub fn reserve(&mut self, page: PhysicalPage<Size4K>) -> bool {
        match self.index_of(page) {
            Some(i) if !self.test(i) => {
                self.mark(i, true);
                trace!("reserved frame {}", page.base());
                true
            }
            _ => false,
        }
    }

    fn index_of(&self, page: PhysicalPage<Size4K>) -> Option<u32> {
        let i = page.number().checked_sub(self.base.number())?;
        (i < self.frames).then_some(i)
    }

    fn page_at(&self, i: u32) -> PhysicalPage<Size4K> {
        PhysicalPage::from_number(self.base.number() + i)
    }

    fn test(&self, i: u32) -> bool {
        self.bitmap[(i / WORD_BITS) as usize] & (1 << (i % WORD_BITS)) != 0
    }

    fn mark(&mut self, i: u32, live: bool) {
        let word = &mut self.bitmap[(i / WORD_BITS) as usize];
        let bit = 1 << (i % WORD_BITS);
        if live {
            *word |= bit;
            self.live += 1;
        } else {
            *word &= !bit;
            self.live -= 1;
        }
    }
}

impl<const WORDS: usize> FrameAlloc for BitmapFrameAlloc<WORDS> {
    fn alloc_frame(&mut self) -> Option<Frame> {
        let (w, word) = self
            .bitmap
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u32::MAX)?;

        #[allow(clippy::cast_possible_truncation)]
        let i = w as u32 * WORD_BITS + word.trailing_ones();
        self.mark(i, true);

        let page = self.page_at(i);
        trace!("alloc frame {}", page.base());
        Some(Frame::from_page(page))
    }

    fn free_frame(&mut self, frame: Frame) {
        let page = frame.into_page();
        let Some(i) = self.index_of(page) else {
            warn!("ignoring free of foreign frame {}", page.base());
            return;
        };

        debug_assert!(self.test(i), "double free of frame {}", page.base());
        if self.test(i) {
            self.mark(i, false);
            trace!("free frame {}", page.base());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(0x0020_0000))
    }

    #[test]
    fn hands_out_lowest_free_frame() {
        let mut a = BitmapFrameAlloc::<1>::new(base(), 4).unwrap();
        let f0 = a.alloc_frame().unwrap();
        let f1 = a.alloc_frame().unwrap();
        assert_eq!(f0.base().as_u32(), 0x0020_0000);
        assert_eq!(f1.base().as_u32(), 0x0020_1000);

        a.free_frame(f0);
        let again = a.alloc_frame().unwrap();
        assert_eq!(again.base().as_u32(), 0x0020_0000);
        assert_eq!(a.live_frames(), 2);
        assert_eq!(a.free_frames(), 2);
    }

    #[test]
    fn exhausts_at_window_end() {
        let mut a = BitmapFrameAlloc::<2>::new(base(), 33).unwrap();
        let frames: Vec<_> = core::iter::from_fn(|| a.alloc_frame()).collect();
        assert_eq!(frames.len(), 33);
        assert_eq!(frames[32].base().as_u32(), 0x0020_0000 + 32 * 0x1000);
        assert!(a.alloc_frame().is_none());
        assert_eq!(a.free_frames(), 0);
    }

    #[test]
    fn live_set_tracks_frames() {
        let mut a = BitmapFrameAlloc::<1>::new(base(), 8).unwrap();
        let f = a.alloc_frame().unwrap();
        let page = f.page();
        assert!(a.is_live(page));
        a.free_frame(f);
        assert!(!a.is_live(page));

        let outside = PhysicalPage::from_addr(PhysicalAddress::new(0x0010_0000));
        assert!(!a.is_live(outside));
    }

    #[test]
    fn reserved_frames_are_skipped() {
        let mut a = BitmapFrameAlloc::<1>::new(base(), 4).unwrap();
        assert!(a.reserve(base()));
        assert!(!a.reserve(base()));
        assert_eq!(a.alloc_frame().unwrap().base().as_u32(), 0x0020_1000);
        assert_eq!(a.live_frames(), 2);
    }

    #[test]
    fn foreign_frames_are_ignored() {
        let mut a = BitmapFrameAlloc::<1>::new(base(), 4).unwrap();
        a.free_frame(Frame::from_page(PhysicalPage::from_addr(PhysicalAddress::new(
            0x0100_0000,
        ))));
        assert_eq!(a.live_frames(), 0);
    }

    #[test]
    #[should_panic(expected = "double free")]
    #[cfg(debug_assertions)]
    fn double_free_is_caught_in_debug() {
        let mut a = BitmapFrameAlloc::<1>::new(base(), 4).unwrap();
        let page = a.alloc_frame().unwrap().into_page();
        a.free_frame(Frame::from_page(page));
        a.free_frame(Frame::from_page(page));
    }

    #[test]
    fn rejects_oversized_windows() {
        assert_eq!(
            BitmapFrameAlloc::<1>::new(base(), 33).err(),
            Some(BitmapError::CapacityExceeded {
                requested: 33,
                capacity: 32
            })
        );

        let top = PhysicalPage::from_addr(PhysicalAddress::new(0xFFFF_F000));
        assert!(BitmapFrameAlloc::<1>::new(top, 1).is_ok());
        assert_eq!(
            BitmapFrameAlloc::<1>::new(top, 2).err(),
            Some(BitmapError::WindowOverflow(top.base()))
        );
    }
}
