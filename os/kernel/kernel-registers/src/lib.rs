//! # Typed 32-bit `x86` Registers
//!
//! Bitfield views of the control registers involved in enabling two-level
//! paging (`CR0`, `CR3`, `CR4`), the CPUID feature word that advertises
//! large-page support, and single-page TLB invalidation.
//!
//! Every register type converts to and from its raw `u32` representation
//! without touching hardware. The actual `mov crN` / `cpuid` / `invlpg`
//! instructions are only compiled with the `asm` feature on a 32-bit `x86`
//! target, so the layouts can be unit-tested on any host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(feature = "cr4")]
pub mod cr4;

#[cfg(feature = "cpuid")]
pub mod cpuid;

#[cfg(feature = "tlb")]
pub mod tlb;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
