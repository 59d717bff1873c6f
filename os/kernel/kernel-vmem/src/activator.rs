//! # Activator
//!
//! Installs a built directory as the translation root and tracks which
//! directory is current. The "current directory" is state of the
//! [`Activator`] value, not a global; it changes in the same call that
//! loads `CR3`.
//!
//! ```text
//! Uninitialized ──boot::build_directory──► Built ──Activator::switch──► Active
//! ```

use crate::hardware::PagingHardware;
use kernel_memory_addresses::{PhysicalPage, Size4K};
use log::{info, warn};

/// A fully populated directory that has not been activated yet.
///
/// Only the boot sequencer creates these, so holding one implies slot 1023
/// is the self-map and low memory is identity-mapped.
#[derive(Debug, PartialEq, Eq)]
pub struct BuiltDirectory {
    root: PhysicalPage<Size4K>,
}

/// The directory currently installed in `CR3`.
#[derive(Debug, PartialEq, Eq)]
pub struct ActiveDirectory {
    root: PhysicalPage<Size4K>,
}

impl BuiltDirectory {
    pub(crate) const fn new(root: PhysicalPage<Size4K>) -> Self {
        Self { root }
    }

    /// Physical frame of the directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage<Size4K> {
        self.root
    }
}

impl ActiveDirectory {
    /// Physical frame of the directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage<Size4K> {
        self.root
    }
}

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("the CPU does not support 4 MiB pages (CPUID.01H:EDX.PSE)")]
    UnsupportedHardwareFeature,
}

/// Owns the paging hardware and the record of the active directory.
#[derive(Debug)]
pub struct Activator<H: PagingHardware> {
    hardware: H,
    current: Option<ActiveDirectory>,
}

impl<H: PagingHardware> Activator<H> {
    /// An activator with no directory installed yet.
    pub const fn new(hardware: H) -> Self {
        Self {
            hardware,
            current: None,
        }
    }

    /// Make `next` the active directory.
    ///
    /// Checks for large-page support before touching any register, then sets
    /// `CR4.PSE`, loads `CR3`, sets `CR0.PG` and records `next` as current.
    /// Returns the previously active directory, if any.
    ///
    /// # Errors
    /// [`ActivationError::UnsupportedHardwareFeature`] when the CPU cannot do
    /// 4 MiB pages; registers are left untouched.
    ///
    /// # Safety
    /// `next` must map the executing code and stack at their current
    /// addresses.
    pub unsafe fn switch(
        &mut self,
        next: BuiltDirectory,
    ) -> Result<Option<ActiveDirectory>, ActivationError> {
        if !self.hardware.supports_large_pages() {
            warn!("refusing to activate {:?}: no PSE support", next.root);
            return Err(ActivationError::UnsupportedHardwareFeature);
        }

        unsafe {
            self.hardware.enable_large_pages();
            self.hardware.load_root(next.root);
            self.hardware.enable_paging();
        }

        info!("page directory {} is now active", next.root.base());
        Ok(self.current.replace(ActiveDirectory { root: next.root }))
    }

    /// The directory currently installed in `CR3`, if any.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> Option<&ActiveDirectory> {
        self.current.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn hardware(&self) -> &H {
        &self.hardware
    }

    #[inline]
    pub const fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}
