//! Memory-mapped switch register bus
//!
//! Maps the switch BAR through `/sys/bus/pci/devices/{addr}/resourceN` and
//! performs volatile 32-bit accesses. Word address `a` lives at byte offset
//! `4 * a` of the BAR.
//!
//! Unsafe is confined to mmap/munmap and the volatile accessors; every access
//! is bounds-checked and reported as a bus error instead of a panic.

use crate::bus::{BusType, RegisterBus};
use crate::error::{Result, SwitchError};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// Memory-mapped switch BAR
#[derive(Debug)]
pub struct MmioBus {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    pcie_address: String,
    bar_index: usize,
}

// SAFETY: Send - MmioBus owns the mapping exclusively; moving it between threads
// does not invalidate an mmap'd region. All access goes through &mut self.
unsafe impl Send for MmioBus {}

impl MmioBus {
    /// BAR holding the switch register space
    pub const SWITCH_BAR: usize = 4;

    /// Map BAR `bar_index` of the PCIe device at `pcie_address`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The resource file doesn't exist or cannot be opened
    /// - The BAR is empty (device not enabled)
    /// - mmap fails
    pub fn open(pcie_address: &str, bar_index: usize) -> Result<Self> {
        let path = format!("/sys/bus/pci/devices/{pcie_address}/resource{bar_index}");

        tracing::debug!("Mapping switch BAR: {path}");

        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        #[allow(clippy::cast_possible_truncation)]
        let size = file.metadata()?.len() as usize;

        if size == 0 {
            return Err(SwitchError::bus(0, format!("{path} has zero size (device not enabled?)")));
        }

        // SAFETY: mmap of a PCI resource file.
        // Invariants: (1) fd valid, just opened read/write; (2) size non-zero, from
        // the resource file length; (3) MAP_SHARED so stores reach the device;
        // (4) the File is stored alongside the mapping and munmap runs in Drop.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| SwitchError::bus(0, format!("mmap {path} failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| SwitchError::bus(0, format!("mmap {path} returned null")))?;

        tracing::info!(
            "Mapped BAR{bar_index} for {pcie_address} ({} KB at {ptr:p})",
            size / 1024
        );

        Ok(Self {
            ptr,
            size,
            _file: file,
            pcie_address: pcie_address.to_string(),
            bar_index,
        })
    }

    /// PCIe address of the mapped device
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }

    /// Mapped size in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    fn offset(&self, addr: u32) -> Result<usize> {
        let offset = addr as usize * 4;
        if offset + 4 > self.size {
            return Err(SwitchError::bus(
                addr,
                format!("outside BAR{} (limit {:#x} bytes)", self.bar_index, self.size),
            ));
        }
        Ok(offset)
    }
}

impl RegisterBus for MmioBus {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        let offset = self.offset(addr)?;
        // SAFETY: read_volatile necessary for MMIO - hardware can change value.
        // Invariants: (1) ptr from mmap, valid for self.size; (2) offset+4 <= size;
        // (3) offset is a multiple of 4 and the BAR is page aligned.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { std::ptr::read_volatile(self.ptr.as_ptr().add(offset).cast::<u32>()) };
        Ok(value)
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        let offset = self.offset(addr)?;
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side effects.
        // Invariants: (1) ptr from mmap; (2) offset+4 <= size; (3) u32 aligned.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            std::ptr::write_volatile(self.ptr.as_ptr().add(offset).cast::<u32>(), value);
        }
        Ok(())
    }

    fn bus_type(&self) -> BusType {
        BusType::Mmio
    }
}

impl Drop for MmioBus {
    fn drop(&mut self) {
        // SAFETY: ptr/size are exactly the mapping created in open(); Drop runs once
        // and no references into the mapping outlive self.
        unsafe {
            let _ = munmap(self.ptr.as_ptr().cast(), self.size);
        }
        tracing::debug!("Unmapped BAR{} for {}", self.bar_index, self.pcie_address);
    }
}
