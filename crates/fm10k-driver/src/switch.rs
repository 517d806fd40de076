//! Per-switch device context
//!
//! A [`Switch`] owns the bus, the register cache and the CRM engine behind a
//! single register-space lock. Callers take the lock once with
//! [`Switch::lock`] and issue any sequence of cache and CRM operations on the
//! returned [`SwitchRegs`] guard; a table update and the checksum refresh of
//! the CRM slot covering it therefore happen under one acquisition.

use crate::bus::RegisterBus;
use crate::cache::{RegisterCache, RegisterSet};
use crate::config::{CacheMode, SwitchConfig};
use crate::crm::{CrmEngine, CrmState, MonitoredBlock};
use crate::error::Result;
use crate::tables;
use fm10k_chip::crm::CrmMonitorConfig;
use fm10k_chip::regs;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Register state of one switch, reachable only through the lock
#[derive(Debug)]
pub struct SwitchRegs {
    bus: Box<dyn RegisterBus>,
    cache: RegisterCache,
    crm: CrmEngine,
    config: SwitchConfig,
}

/// One switch instance
#[derive(Debug)]
pub struct Switch {
    regs: Mutex<SwitchRegs>,
}

impl Switch {
    /// Bring up a switch with the FM10000 register set table and monitor plan
    ///
    /// # Errors
    ///
    /// Returns the first bring-up error; see [`Switch::with_tables`].
    pub fn init(bus: Box<dyn RegisterBus>, config: SwitchConfig) -> Result<Self> {
        Self::with_tables(bus, config, &tables::REGISTER_SETS, tables::crm_monitor_plan())
    }

    /// Bring up a switch for an arbitrary table and plan
    ///
    /// Populates every shadow, resets the CRM, writes the monitor table and,
    /// with `crm_autostart`, unmasks every planned slot and starts a
    /// continuous scan. An autostart timeout is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns a descriptor, encoding or bus error.
    pub fn with_tables(
        mut bus: Box<dyn RegisterBus>,
        config: SwitchConfig,
        sets: &[&'static RegisterSet],
        plan: Vec<MonitoredBlock>,
    ) -> Result<Self> {
        info!("Switch bring-up on {} bus", bus.bus_type());
        let mut cache = RegisterCache::new(sets, &config)?;
        let mut crm = CrmEngine::new(plan)?;

        cache.populate_all(bus.as_mut())?;
        crm.reset(bus.as_mut())?;
        crm.init_table(bus.as_mut(), &cache, config.crm_set_checksums)?;

        if config.crm_autostart && !crm.plan().is_empty() {
            #[allow(clippy::cast_possible_truncation)]
            let last = crm.plan().len() as u32 - 1;
            for slot in 0..=last.min(regs::CRM_GLORT_CAM_SLOT) {
                crm.enable_slot(bus.as_mut(), slot)?;
            }
            if let Err(e) = crm.start(bus.as_mut(), 0, last, true) {
                if !e.is_timeout() {
                    return Err(e);
                }
                warn!("CRM autostart failed, continuing with the engine stopped: {e}");
            }
        }

        info!("Switch ready (CRM {})", crm.state());
        Ok(Self {
            regs: Mutex::new(SwitchRegs {
                bus,
                cache,
                crm,
                config,
            }),
        })
    }

    /// Acquire the register-space lock
    ///
    /// A poisoned lock is recovered: every operation validates before it
    /// mutates, so the guarded state is consistent even after a panic.
    pub fn lock(&self) -> MutexGuard<'_, SwitchRegs> {
        self.regs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the CRM and release the device
    ///
    /// # Errors
    ///
    /// Returns a bus error from the CRM reset.
    pub fn shutdown(self) -> Result<()> {
        let mut state = self.regs.into_inner().unwrap_or_else(PoisonError::into_inner);
        let SwitchRegs { bus, crm, .. } = &mut state;
        crm.reset(bus.as_mut())?;
        info!("Switch shut down");
        Ok(())
    }
}

impl SwitchRegs {
    /// Configuration the switch was brought up with (cache mode and deferral may have changed since)
    pub const fn config(&self) -> &SwitchConfig {
        &self.config
    }

    /// The register cache, for read-only inspection
    pub const fn cache(&self) -> &RegisterCache {
        &self.cache
    }

    /// CRM run state
    pub const fn crm_state(&self) -> CrmState {
        self.crm.state()
    }

    /// CRM slots with unmasked interrupts
    pub const fn crm_enabled_slots(&self) -> u64 {
        self.crm.enabled_slots()
    }

    /// Block monitored by CRM `slot`
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` for an unplanned slot.
    pub fn monitored_block(&self, slot: u32) -> Result<MonitoredBlock> {
        self.crm.monitored_block(slot).copied()
    }

    /// CRM slot covering entry `idx` of `set`
    pub fn slot_for(&self, set: &RegisterSet, idx: &[u32]) -> Option<u32> {
        self.crm.slot_for(set, idx)
    }

    /// Change the cache read path
    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        self.cache.set_mode(mode);
        self.config.cache_mode = mode;
    }

    /// Enable or disable write deferral
    pub fn set_defer_writes(&mut self, on: bool) {
        self.cache.set_defer_writes(on);
        self.config.defer_writes = on;
    }

    /// See [`RegisterCache::read_single`]
    ///
    /// # Errors
    ///
    /// Returns an index or bus error.
    pub fn read_single(&mut self, set: &RegisterSet, idx: &[u32]) -> Result<Vec<u32>> {
        self.cache.read_single(self.bus.as_mut(), set, idx)
    }

    /// See [`RegisterCache::write_single`]
    ///
    /// # Errors
    ///
    /// Returns an index, width or bus error.
    pub fn write_single(&mut self, set: &RegisterSet, idx: &[u32], words: &[u32], force_hw: bool) -> Result<()> {
        self.cache.write_single(self.bus.as_mut(), set, idx, words, force_hw)
    }

    /// See [`RegisterCache::read_modify_write`]
    ///
    /// # Errors
    ///
    /// Returns an index, width or bus error.
    pub fn read_modify_write(
        &mut self,
        set: &RegisterSet,
        idx: &[u32],
        data: &[u32],
        mask: &[u32],
        force_hw: bool,
    ) -> Result<Vec<u32>> {
        self.cache.read_modify_write(self.bus.as_mut(), set, idx, data, mask, force_hw)
    }

    /// See [`RegisterCache::read_multi`]
    ///
    /// # Errors
    ///
    /// Returns an index or bus error.
    pub fn read_multi(&mut self, set: &RegisterSet, first: &[u32], out: &mut [u32]) -> Result<()> {
        self.cache.read_multi(self.bus.as_mut(), set, first, out)
    }

    /// See [`RegisterCache::write_multi`]
    ///
    /// # Errors
    ///
    /// Returns an index or bus error.
    pub fn write_multi(&mut self, set: &RegisterSet, first: &[u32], words: &[u32], force_hw: bool) -> Result<()> {
        self.cache.write_multi(self.bus.as_mut(), set, first, words, force_hw)
    }

    /// Write an entry and, if a CRM slot checksums it, refresh that slot's param
    ///
    /// The write always reaches hardware, even with deferral enabled, so the
    /// next scan sees the words the new param was computed from.
    ///
    /// # Errors
    ///
    /// Returns an index, width or bus error.
    pub fn write_and_resync(&mut self, set: &RegisterSet, idx: &[u32], words: &[u32]) -> Result<()> {
        self.cache.write_single(self.bus.as_mut(), set, idx, words, true)?;
        self.resync(set, idx)
    }

    /// Read-modify-write an entry and refresh the covering CRM slot
    ///
    /// Like [`write_and_resync`](Self::write_and_resync), never deferred.
    ///
    /// # Errors
    ///
    /// Returns an index, width or bus error.
    pub fn rmw_and_resync(&mut self, set: &RegisterSet, idx: &[u32], data: &[u32], mask: &[u32]) -> Result<Vec<u32>> {
        let merged = self.cache.read_modify_write(self.bus.as_mut(), set, idx, data, mask, true)?;
        self.resync(set, idx)?;
        Ok(merged)
    }

    fn resync(&mut self, set: &RegisterSet, idx: &[u32]) -> Result<()> {
        if let Some(slot) = self.crm.slot_for(set, idx) {
            self.crm.update_checksum(self.bus.as_mut(), &self.cache, slot)?;
        }
        Ok(())
    }

    /// See [`RegisterCache::compute_checksum`]
    ///
    /// # Errors
    ///
    /// Returns an index error.
    pub fn compute_checksum(&self, set: &RegisterSet, outer: Option<u32>) -> Result<u32> {
        self.cache.compute_checksum(set, outer)
    }

    /// See [`RegisterCache::compute_live_checksum`]
    ///
    /// # Errors
    ///
    /// Returns an index or bus error.
    pub fn compute_live_checksum(&mut self, set: &RegisterSet, outer: Option<u32>) -> Result<u32> {
        self.cache.compute_live_checksum(self.bus.as_mut(), set, outer)
    }

    /// See [`RegisterCache::flush_deferred`]
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn flush_deferred(&mut self) -> Result<usize> {
        self.cache.flush_deferred(self.bus.as_mut())
    }

    /// See [`RegisterCache::restore`]
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn restore(&mut self, set: &RegisterSet) -> Result<()> {
        self.cache.restore(self.bus.as_mut(), set)
    }

    /// See [`RegisterCache::is_valid`]
    ///
    /// # Errors
    ///
    /// Returns an index error.
    pub fn is_valid(&self, set: &RegisterSet, idx: &[u32]) -> Result<bool> {
        self.cache.is_valid(set, idx)
    }

    /// See [`RegisterCache::invalidate`]
    ///
    /// # Errors
    ///
    /// Returns an index error.
    pub fn invalidate(&mut self, set: &RegisterSet, idx: &[u32]) -> Result<()> {
        self.cache.invalidate(set, idx)
    }

    /// See [`CrmEngine::start`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm`, `OperationTimedOut` or a bus error.
    pub fn crm_start(&mut self, first: u32, last: u32, continuous: bool) -> Result<()> {
        self.crm.start(self.bus.as_mut(), first, last, continuous)
    }

    /// See [`CrmEngine::stop`]
    ///
    /// # Errors
    ///
    /// Returns `OperationTimedOut` or a bus error.
    pub fn crm_stop(&mut self) -> Result<()> {
        self.crm.stop(self.bus.as_mut())
    }

    /// See [`CrmEngine::reset`]
    ///
    /// # Errors
    ///
    /// Returns a bus error.
    pub fn crm_reset(&mut self) -> Result<()> {
        self.crm.reset(self.bus.as_mut())
    }

    /// Reset the CRM and repopulate its monitor table
    ///
    /// # Errors
    ///
    /// Returns an encoding or bus error.
    pub fn crm_reinit(&mut self, set_checksums: bool) -> Result<()> {
        self.crm.reset(self.bus.as_mut())?;
        self.crm.init_table(self.bus.as_mut(), &self.cache, set_checksums)
    }

    /// See [`CrmEngine::mask_interrupts`]
    ///
    /// # Errors
    ///
    /// Returns a bus error.
    pub fn crm_mask_interrupts(&mut self, mask: u64, masked: bool) -> Result<()> {
        self.crm.mask_interrupts(self.bus.as_mut(), mask, masked)
    }

    /// See [`CrmEngine::enable_slot`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` or a bus error.
    pub fn crm_enable_slot(&mut self, slot: u32) -> Result<()> {
        self.crm.enable_slot(self.bus.as_mut(), slot)
    }

    /// See [`CrmEngine::disable_slot`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` or a bus error.
    pub fn crm_disable_slot(&mut self, slot: u32) -> Result<()> {
        self.crm.disable_slot(self.bus.as_mut(), slot)
    }

    /// See [`CrmEngine::update_checksum`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` or a bus error.
    pub fn crm_update_checksum(&mut self, slot: u32) -> Result<u32> {
        self.crm.update_checksum(self.bus.as_mut(), &self.cache, slot)
    }

    /// See [`CrmEngine::read_slot`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` or a bus error.
    pub fn crm_read_slot(&mut self, slot: u32) -> Result<CrmMonitorConfig> {
        self.crm.read_slot(self.bus.as_mut(), slot)
    }

    /// See [`CrmEngine::pending_interrupts`]
    ///
    /// # Errors
    ///
    /// Returns a bus error.
    pub fn crm_pending_interrupts(&mut self) -> Result<u64> {
        self.crm.pending_interrupts(self.bus.as_mut())
    }
}
