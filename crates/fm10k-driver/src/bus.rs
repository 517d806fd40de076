//! Register bus abstraction
//!
//! Every access to switch registers goes through a [`RegisterBus`]. The
//! cache and CRM engine never care whether the words land in a mapped BAR or
//! in the software model used for CI.

use crate::error::Result;
use std::fmt::Debug;

/// Word-addressed management bus
///
/// Addresses are 32-bit word addresses. Multi-word helpers access
/// consecutive addresses; a failure part-way leaves earlier words written.
pub trait RegisterBus: Debug + Send {
    /// Read one 32-bit register
    ///
    /// # Errors
    ///
    /// Returns error if the bus transaction fails.
    fn read32(&mut self, addr: u32) -> Result<u32>;

    /// Write one 32-bit register
    ///
    /// # Errors
    ///
    /// Returns error if the bus transaction fails.
    fn write32(&mut self, addr: u32, value: u32) -> Result<()>;

    /// Read `out.len()` consecutive registers starting at `addr`
    ///
    /// # Errors
    ///
    /// Returns the first bus error encountered.
    fn read_mult(&mut self, addr: u32, out: &mut [u32]) -> Result<()> {
        for (a, word) in (addr..).zip(out.iter_mut()) {
            *word = self.read32(a)?;
        }
        Ok(())
    }

    /// Write `words` to consecutive registers starting at `addr`
    ///
    /// # Errors
    ///
    /// Returns the first bus error encountered.
    fn write_mult(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        for (a, &word) in (addr..).zip(words) {
            self.write32(a, word)?;
        }
        Ok(())
    }

    /// Read a 64-bit register stored as two words, low word first
    ///
    /// # Errors
    ///
    /// Returns error if either word read fails.
    fn read64(&mut self, addr: u32) -> Result<u64> {
        let mut words = [0u32; 2];
        self.read_mult(addr, &mut words)?;
        Ok(fm10k_chip::bits::join_words(words[0], words[1]))
    }

    /// Write a 64-bit register stored as two words, low word first
    ///
    /// # Errors
    ///
    /// Returns error if either word write fails.
    fn write64(&mut self, addr: u32, value: u64) -> Result<()> {
        self.write_mult(addr, &fm10k_chip::bits::split_words(value))
    }

    /// Get bus type for debugging
    fn bus_type(&self) -> BusType;
}

/// Bus type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// Memory-mapped PCIe BAR
    Mmio,

    /// Software register model, no hardware required
    Software,
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Software => write!(f, "Software (model)"),
        }
    }
}

/// Bus selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSelection {
    /// Memory-mapped BAR of the given PCIe device
    Mmio,

    /// Software register model (device id ignored)
    Software,
}

/// Open a bus for `device_id` (a PCIe address for [`BusSelection::Mmio`])
///
/// # Errors
///
/// Returns error if the selected backend cannot be opened.
pub fn select_bus(selection: BusSelection, device_id: &str) -> Result<Box<dyn RegisterBus>> {
    use crate::backends::{MmioBus, SoftwareBus};

    match selection {
        BusSelection::Mmio => {
            tracing::info!("Using MMIO bus for {device_id}");
            MmioBus::open(device_id, MmioBus::SWITCH_BAR).map(|b| Box::new(b) as Box<dyn RegisterBus>)
        }
        BusSelection::Software => {
            tracing::info!("Using software register model");
            Ok(Box::new(SoftwareBus::new()))
        }
    }
}
