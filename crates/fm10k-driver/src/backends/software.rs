// SPDX-License-Identifier: AGPL-3.0-only

//! Software register model
//!
//! Implements [`RegisterBus`] over a sparse in-memory register space. Unwritten
//! registers read as zero unless the model was powered on from a descriptor
//! table, in which case every register with a default-value generator holds
//! its reset value.
//!
//! Besides plain storage the model reproduces the parts of the CRM block the
//! driver depends on:
//!
//! - `CRM_IP` is write-1-to-clear.
//! - `CRM_STATUS.Running` is read-only and follows `CRM_CTRL.Run` after a
//!   configurable number of status reads, or never when the engine is stuck.
//! - [`SoftwareBus::scan_crm`] executes one pass over the configured slots
//!   using the walk model from `fm10k_chip::crm` and raises interrupt-pending
//!   bits for checksum mismatches.
//!
//! The model is a cloneable handle: tests keep a clone to inspect or corrupt
//! register state after handing the bus to a switch.

use crate::bus::{BusType, RegisterBus};
use crate::cache::RegisterSet;
use crate::error::{Result, SwitchError};
use fm10k_chip::bits::{join_words, split_words};
use fm10k_chip::crm::{CrmCommand, CrmMonitorConfig};
use fm10k_chip::regs::{self, crm_ctrl, crm_status};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Access counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Word reads through the bus interface
    pub reads: u64,
    /// Word writes through the bus interface
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Model {
    mem: BTreeMap<u32, u32>,
    faults: BTreeSet<u32>,
    /// Status reads before `Running` follows `Run`; `None` = never.
    crm_latency: Option<u32>,
    /// Target running state and status reads left before it applies.
    transition: Option<(bool, u32)>,
    stats: BusStats,
}

impl Model {
    fn load(&self, addr: u32) -> u32 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    fn store(&mut self, addr: u32, value: u32) {
        if value == 0 {
            self.mem.remove(&addr);
        } else {
            self.mem.insert(addr, value);
        }
    }

    fn check_fault(&self, addr: u32, op: &str) -> Result<()> {
        if self.faults.contains(&addr) {
            return Err(SwitchError::bus(addr, format!("{op} timed out on management bus")));
        }
        Ok(())
    }

    fn running(&self) -> bool {
        crm_status::RUNNING.get(u64::from(self.load(regs::CRM_STATUS))) != 0
    }

    fn set_running(&mut self, running: bool) {
        let status = u64::from(self.load(regs::CRM_STATUS));
        #[allow(clippy::cast_possible_truncation)]
        let status = crm_status::RUNNING.set(status, u64::from(running)) as u32;
        self.store(regs::CRM_STATUS, status);
    }

    fn write_ctrl(&mut self, value: u32) {
        self.store(regs::CRM_CTRL, value);
        let run = crm_ctrl::RUN.get(u64::from(value)) != 0;
        if run == self.running() {
            self.transition = None;
            return;
        }
        self.transition = match self.crm_latency {
            Some(0) => {
                self.set_running(run);
                None
            }
            Some(n) => Some((run, n)),
            None => None,
        };
    }

    fn read_status(&mut self) -> u32 {
        if let Some((target, left)) = self.transition {
            if left <= 1 {
                self.set_running(target);
                self.transition = None;
            } else {
                self.transition = Some((target, left - 1));
            }
        }
        self.load(regs::CRM_STATUS)
    }

    fn is_ip(addr: u32) -> bool {
        addr == regs::CRM_IP || addr == regs::CRM_IP + 1
    }
}

/// Software register model
#[derive(Debug, Clone)]
pub struct SoftwareBus {
    model: Arc<Mutex<Model>>,
}

impl Default for SoftwareBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBus {
    /// Create an empty register space with an immediately responsive CRM
    pub fn new() -> Self {
        let model = Model {
            crm_latency: Some(0),
            ..Model::default()
        };
        Self {
            model: Arc::new(Mutex::new(model)),
        }
    }

    /// Load reset values for every register set that has a default-value generator
    pub fn power_on(&self, sets: &[&RegisterSet]) {
        let mut m = self.lock();
        for set in sets {
            let Some(default) = set.default_value else {
                continue;
            };
            for addr in set.word_addresses() {
                m.store(addr, default(addr));
            }
        }
        debug!("SoftwareBus: powered on {} register sets", sets.len());
    }

    /// `CRM_STATUS.Running` follows `CRM_CTRL.Run` after `reads` status reads
    pub fn set_crm_latency(&self, reads: u32) {
        self.lock().crm_latency = Some(reads);
    }

    /// The CRM never acknowledges run/stop requests
    pub fn set_crm_stuck(&self) {
        let mut m = self.lock();
        m.crm_latency = None;
        m.transition = None;
    }

    /// Make every access to `addr` fail with a bus error
    pub fn inject_fault(&self, addr: u32) {
        self.lock().faults.insert(addr);
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Read a register without side effects or counting
    pub fn peek(&self, addr: u32) -> u32 {
        self.lock().load(addr)
    }

    /// Write a register behind the driver's back (models hardware-side corruption)
    pub fn poke(&self, addr: u32, value: u32) {
        self.lock().store(addr, value);
    }

    /// Access counters since creation or the last [`reset_stats`](Self::reset_stats)
    pub fn stats(&self) -> BusStats {
        self.lock().stats
    }

    /// Zero the access counters
    pub fn reset_stats(&self) {
        self.lock().stats = BusStats::default();
    }

    /// Whether the simulated CRM reports `Running`
    pub fn crm_running(&self) -> bool {
        self.lock().running()
    }

    /// Execute one CRM pass over the slots selected by `CRM_CTRL`
    ///
    /// Only checksum slots are evaluated. Returns the slots whose pending
    /// bit was raised by this pass. Does nothing while the engine is stopped.
    pub fn scan_crm(&self) -> u64 {
        let mut m = self.lock();
        if !m.running() {
            return 0;
        }
        let ctrl = u64::from(m.load(regs::CRM_CTRL));
        #[allow(clippy::cast_possible_truncation)]
        let first = crm_ctrl::FIRST_COMMAND_INDEX.get(ctrl) as u32;
        #[allow(clippy::cast_possible_truncation)]
        let last = crm_ctrl::LAST_COMMAND_INDEX.get(ctrl) as u32;

        let mut raised = 0u64;
        for slot in first..=last {
            let cfg = read_slot(&m, slot);
            if cfg.command != CrmCommand::Checksum || cfg.scan_count() == 0 {
                continue;
            }
            let words = cfg.words_per_register();
            let sum = cfg
                .scan_addresses()
                .flat_map(|a| a..a + words)
                .fold(0u32, |acc, a| acc ^ m.load(a));
            if sum != cfg.param {
                debug!(
                    "SoftwareBus: CRM slot {slot} checksum {sum:#010x} != param {:#010x}",
                    cfg.param
                );
                raised |= 1 << slot;
            }
        }

        if raised != 0 {
            let [lo, hi] = split_words(raised);
            let ip_lo = m.load(regs::CRM_IP) | lo;
            let ip_hi = m.load(regs::CRM_IP + 1) | hi;
            m.store(regs::CRM_IP, ip_lo);
            m.store(regs::CRM_IP + 1, ip_hi);
        }
        raised
    }

    /// Pending interrupt vector as the hardware holds it
    pub fn pending(&self) -> u64 {
        let m = self.lock();
        join_words(m.load(regs::CRM_IP), m.load(regs::CRM_IP + 1))
    }

    fn lock(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_slot(m: &Model, slot: u32) -> CrmMonitorConfig {
    let cmd = regs::crm_command(slot);
    let reg = regs::crm_register(slot);
    CrmMonitorConfig::from_words(
        [m.load(cmd), m.load(cmd + 1)],
        [m.load(reg), m.load(reg + 1)],
        m.load(regs::crm_param(slot)),
    )
}

impl RegisterBus for SoftwareBus {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        let mut m = self.lock();
        m.check_fault(addr, "read")?;
        m.stats.reads += 1;
        if addr == regs::CRM_STATUS {
            return Ok(m.read_status());
        }
        Ok(m.load(addr))
    }

    fn write32(&mut self, addr: u32, value: u32) -> Result<()> {
        let mut m = self.lock();
        m.check_fault(addr, "write")?;
        m.stats.writes += 1;
        match addr {
            regs::CRM_CTRL => m.write_ctrl(value),
            regs::CRM_STATUS => {
                // Running is owned by the engine
                let running = u64::from(m.running());
                #[allow(clippy::cast_possible_truncation)]
                let value = crm_status::RUNNING.set(u64::from(value), running) as u32;
                m.store(addr, value);
            }
            a if Model::is_ip(a) => {
                let left = m.load(a) & !value;
                m.store(a, left);
            }
            _ => m.store(addr, value),
        }
        Ok(())
    }

    fn bus_type(&self) -> BusType {
        BusType::Software
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_registers_read_zero() {
        let mut bus = SoftwareBus::new();
        assert_eq!(bus.read32(0x1234).unwrap(), 0);
        bus.write32(0x1234, 7).unwrap();
        assert_eq!(bus.read32(0x1234).unwrap(), 7);
        assert_eq!(bus.stats(), BusStats { reads: 2, writes: 1 });
    }

    #[test]
    fn pending_bits_are_write_one_to_clear() {
        let mut bus = SoftwareBus::new();
        bus.poke(regs::CRM_IP, 0b1011);
        bus.write32(regs::CRM_IP, 0b0010).unwrap();
        assert_eq!(bus.peek(regs::CRM_IP), 0b1001);
    }

    #[test]
    fn running_follows_run_after_latency() {
        let mut bus = SoftwareBus::new();
        bus.set_crm_latency(3);
        bus.write32(regs::CRM_CTRL, 1).unwrap();
        assert_eq!(bus.read32(regs::CRM_STATUS).unwrap() & 1, 0);
        assert_eq!(bus.read32(regs::CRM_STATUS).unwrap() & 1, 0);
        assert_eq!(bus.read32(regs::CRM_STATUS).unwrap() & 1, 1);
    }

    #[test]
    fn stuck_engine_never_runs() {
        let mut bus = SoftwareBus::new();
        bus.set_crm_stuck();
        bus.write32(regs::CRM_CTRL, 1).unwrap();
        for _ in 0..10 {
            assert_eq!(bus.read32(regs::CRM_STATUS).unwrap() & 1, 0);
        }
    }

    #[test]
    fn running_bit_is_read_only() {
        let mut bus = SoftwareBus::new();
        bus.write32(regs::CRM_STATUS, 1).unwrap();
        assert!(!bus.crm_running());
    }

    #[test]
    fn injected_fault_fails_access() {
        let mut bus = SoftwareBus::new();
        bus.inject_fault(0x40);
        assert!(matches!(bus.read32(0x40), Err(SwitchError::Bus { addr: 0x40, .. })));
        assert!(bus.write32(0x40, 1).is_err());
        bus.clear_faults();
        assert!(bus.write32(0x40, 1).is_ok());
    }

    #[test]
    fn scan_flags_checksum_mismatch() {
        let mut bus = SoftwareBus::new();
        let cfg = CrmMonitorConfig {
            command: CrmCommand::Checksum,
            reg_count: 1,
            entry_count: 2,
            base_address: 0x100,
            size1_shift: fm10k_chip::crm::SHIFT_UNUSED,
            stride1_shift: fm10k_chip::crm::SHIFT_UNUSED,
            size2_shift: fm10k_chip::crm::SHIFT_UNUSED,
            stride2_shift: fm10k_chip::crm::SHIFT_UNUSED,
            param: 0x0F,
            ..CrmMonitorConfig::CLEARED
        };
        bus.write_mult(regs::crm_command(3), &cfg.command_words()).unwrap();
        bus.write_mult(regs::crm_register(3), &cfg.register_words()).unwrap();
        bus.write32(regs::crm_param(3), cfg.param).unwrap();
        bus.poke(0x100, 0x0A);
        bus.poke(0x101, 0x05);

        // Stopped: no scan
        assert_eq!(bus.scan_crm(), 0);

        let ctrl = crm_ctrl::RUN.set(0, 1);
        let ctrl = crm_ctrl::FIRST_COMMAND_INDEX.set(ctrl, 0);
        let ctrl = crm_ctrl::LAST_COMMAND_INDEX.set(ctrl, 3);
        bus.write32(regs::CRM_CTRL, u32::try_from(ctrl).unwrap()).unwrap();
        assert_eq!(bus.scan_crm(), 0);

        bus.poke(0x101, 0x04);
        assert_eq!(bus.scan_crm(), 1 << 3);
        assert_eq!(bus.pending(), 1 << 3);
    }
}
