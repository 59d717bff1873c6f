//! A small simulated 32-bit machine: RAM, a CPU with the paging registers and
//! a TLB, and a frame allocator that counts what it hands out.
//!
//! The window walks the directory in simulated `CR3` exactly like the MMU
//! would, including the self-map recursion, and caches translations until
//! they are invalidated. A missing `invlpg` therefore shows up as a read of
//! the wrong frame.

#![allow(dead_code)]

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress, VirtualPage};
use kernel_vmem::{
    boot, BootError, Frame, FrameAlloc, PagingHardware, PhysMapper, TableWindow, Vmm,
};
use std::cell::{RefCell, UnsafeCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

pub const RAM_BASE: u32 = 0x0100_0000;
const PAGE: u32 = 4096;

/// Byte pattern of never-written RAM, so missing zeroing is visible.
pub const GARBAGE: u8 = 0xA5;

#[repr(C, align(4096))]
struct Aligned4K([u8; PAGE as usize]);

/// Physical RAM at `[RAM_BASE, RAM_BASE + frames * 4 KiB)`.
pub struct SimRam {
    base: u32,
    frames: Box<[UnsafeCell<Aligned4K>]>,
}

impl SimRam {
    pub fn new(frames: usize) -> Self {
        let frames = (0..frames)
            .map(|_| UnsafeCell::new(Aligned4K([GARBAGE; PAGE as usize])))
            .collect();
        Self {
            base: RAM_BASE,
            frames,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, n: usize) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.base + n as u32 * PAGE))
    }

    fn ptr(&self, pa: u32) -> *mut u8 {
        let rel = pa
            .checked_sub(self.base)
            .unwrap_or_else(|| panic!("physical access below RAM: {pa:#010x}"));
        let idx = (rel / PAGE) as usize;
        assert!(idx < self.frames.len(), "physical access past RAM: {pa:#010x}");
        unsafe { self.frames[idx].get().cast::<u8>().add((rel % PAGE) as usize) }
    }

    pub fn read_u32(&self, pa: u32) -> u32 {
        assert_eq!(pa % 4, 0);
        unsafe { self.ptr(pa).cast::<u32>().read() }
    }
}

impl PhysMapper for SimRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.ptr(pa.as_u32()).cast::<T>() }
    }
}

/// Architectural state the tests inspect.
#[derive(Debug, Default)]
pub struct CpuState {
    pub pse_supported: bool,
    pub pse: bool,
    pub paging: bool,
    pub cr3: Option<u32>,
    pub cr3_loads: usize,
    pub invalidations: Vec<u32>,
    tlb: HashMap<u32, u32>,
}

/// [`PagingHardware`] backed by [`CpuState`].
pub struct SimCpu(Rc<RefCell<CpuState>>);

impl PagingHardware for SimCpu {
    fn supports_large_pages(&self) -> bool {
        self.0.borrow().pse_supported
    }

    unsafe fn enable_large_pages(&mut self) {
        self.0.borrow_mut().pse = true;
    }

    unsafe fn load_root(&mut self, root: PhysicalPage<Size4K>) {
        let mut cpu = self.0.borrow_mut();
        cpu.cr3 = Some(root.base().as_u32());
        cpu.cr3_loads += 1;
        cpu.tlb.clear();
    }

    unsafe fn enable_paging(&mut self) {
        self.0.borrow_mut().paging = true;
    }

    fn invalidate_page(&mut self, page: VirtualPage<Size4K>) {
        let mut cpu = self.0.borrow_mut();
        let va = page.base().as_u32();
        cpu.tlb.remove(&va);
        cpu.invalidations.push(va);
    }
}

/// [`TableWindow`] that performs the hardware walk on simulated RAM.
pub struct SimWindow {
    ram: Rc<SimRam>,
    cpu: Rc<RefCell<CpuState>>,
}

impl SimWindow {
    fn walk(&self, va: u32) -> u32 {
        let mut cpu = self.cpu.borrow_mut();
        assert!(cpu.paging, "window used before paging is enabled");
        let page = va & !(PAGE - 1);
        if let Some(&frame) = cpu.tlb.get(&page) {
            return frame | (va & (PAGE - 1));
        }

        let cr3 = cpu.cr3.expect("paging enabled without CR3");
        let pde = self.ram.read_u32(cr3 + (va >> 22) * 4);
        assert!(pde & 1 != 0, "page fault at {va:#010x}: directory entry absent");
        assert!(pde & 0x80 == 0, "window walk hit a 4 MiB page at {va:#010x}");

        let pte = self.ram.read_u32((pde & !0xFFF) + ((va >> 12) & 0x3FF) * 4);
        assert!(pte & 1 != 0, "page fault at {va:#010x}: table entry absent");
        let frame = pte & !0xFFF;
        cpu.tlb.insert(page, frame);
        frame | (va & (PAGE - 1))
    }
}

impl TableWindow for SimWindow {
    unsafe fn window_mut<'a, T>(&self, va: VirtualAddress) -> &'a mut T {
        let pa = self.walk(va.as_u32());
        unsafe { self.ram.phys_to_mut(PhysicalAddress::new(pa)) }
    }
}

/// Frame allocator over the simulated RAM, lowest frame first.
pub struct CountingAlloc {
    free: VecDeque<PhysicalPage<Size4K>>,
    live: HashSet<u32>,
    pub allocs: usize,
    pub frees: usize,
}

impl CountingAlloc {
    pub fn new(ram: &SimRam, limit: usize) -> Self {
        Self {
            free: (0..ram.frame_count().min(limit)).map(|n| ram.frame(n)).collect(),
            live: HashSet::new(),
            allocs: 0,
            frees: 0,
        }
    }

    pub fn is_live(&self, page: PhysicalPage<Size4K>) -> bool {
        self.live.contains(&page.base().as_u32())
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl FrameAlloc for CountingAlloc {
    fn alloc_frame(&mut self) -> Option<Frame> {
        let page = self.free.pop_front()?;
        self.allocs += 1;
        assert!(self.live.insert(page.base().as_u32()));
        Some(Frame::from_page(page))
    }

    fn free_frame(&mut self, frame: Frame) {
        self.frees += 1;
        let page = frame.into_page();
        assert!(self.live.remove(&page.base().as_u32()), "double free of {page:?}");
        self.free.push_front(page);
    }
}

pub type SimVmm = Vmm<SimWindow, SimCpu>;

/// RAM, CPU and frame pool wired together.
pub struct Machine {
    pub ram: Rc<SimRam>,
    pub cpu: Rc<RefCell<CpuState>>,
    pub frames: CountingAlloc,
}

impl Machine {
    pub fn new(frames: usize) -> Self {
        Self::with_limit(frames, frames)
    }

    /// Only the first `limit` frames are available to the allocator.
    pub fn with_limit(frames: usize, limit: usize) -> Self {
        let ram = Rc::new(SimRam::new(frames));
        let pool = CountingAlloc::new(&ram, limit);
        Self {
            ram,
            cpu: Rc::new(RefCell::new(CpuState {
                pse_supported: true,
                ..CpuState::default()
            })),
            frames: pool,
        }
    }

    pub fn without_pse(mut self) -> Self {
        self.cpu.borrow_mut().pse_supported = false;
        self
    }

    pub fn boot(&mut self) -> Result<SimVmm, BootError> {
        let window = SimWindow {
            ram: Rc::clone(&self.ram),
            cpu: Rc::clone(&self.cpu),
        };
        let cpu = SimCpu(Rc::clone(&self.cpu));
        unsafe { boot::init(&mut self.frames, &*self.ram, window, cpu) }
    }

    pub fn invalidations(&self) -> Vec<u32> {
        self.cpu.borrow().invalidations.clone()
    }
}

/// A machine with 32 frames of RAM, booted.
pub fn booted() -> (Machine, SimVmm) {
    let mut m = Machine::new(32);
    let vmm = m.boot().expect("boot");
    (m, vmm)
}

pub const fn va(v: u32) -> VirtualAddress {
    VirtualAddress::new(v)
}

pub const fn pa(p: u32) -> PhysicalAddress {
    PhysicalAddress::new(p)
}
