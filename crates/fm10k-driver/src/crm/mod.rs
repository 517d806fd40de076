//! CRM (consistency/rate monitor) engine control
//!
//! The CRM walks its slot table autonomously once started, recomputing the
//! checksum of each monitored block and raising the slot's interrupt-pending
//! bit on a mismatch with the slot's `param`. This module owns the software
//! side of that contract:
//!
//! - monitor-table bring-up from a [`MonitoredBlock`] plan
//! - the `Stopped`/`Running` state machine with bounded polling
//! - per-slot interrupt masking
//! - checksum resynchronisation after the cache mutates a monitored block
//!
//! Like the cache, every method takes the bus explicitly and expects the
//! caller to hold the register-space lock.

mod encode;

pub use encode::{init_config, CrmGeometry};

use crate::bus::RegisterBus;
use crate::cache::{Dimensions, RegisterCache, RegisterSet};
use crate::error::{Result, SwitchError};
use crate::poll::{poll_until, CRM_POLL};
use fm10k_chip::crm::{CrmCommand, CrmMonitorConfig};
use fm10k_chip::regs::{self, crm_ctrl, crm_status};
use tracing::{debug, info, warn};

/// Engine run state as tracked by software
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrmState {
    /// Not scanning (initial and after shutdown)
    #[default]
    Stopped,
    /// Scanning the configured slot range
    Running,
}

impl std::fmt::Display for CrmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Register block checksummed by one CRM slot
#[derive(Debug, Clone, Copy)]
pub struct MonitoredBlock {
    /// Register set the block belongs to
    pub set: &'static RegisterSet,
    /// Outer index of a two-index set, `None` for the whole set
    pub outer: Option<u32>,
}

impl MonitoredBlock {
    /// The whole of `set`
    pub const fn whole(set: &'static RegisterSet) -> Self {
        Self { set, outer: None }
    }

    /// Outer slice `outer` of a two-index `set`
    pub const fn slice(set: &'static RegisterSet, outer: u32) -> Self {
        Self {
            set,
            outer: Some(outer),
        }
    }

    /// Word address of the first register in the block
    ///
    /// # Errors
    ///
    /// Returns an index error if `outer` does not fit the set.
    pub fn base(&self) -> Result<u32> {
        match self.outer {
            None => Ok(self.set.base),
            Some(o) => self.set.address(&[0, o]),
        }
    }

    /// Logical geometry handed to the encoder
    pub fn geometry(&self) -> CrmGeometry {
        let w = self.set.width;
        match (self.set.dims, self.outer) {
            (Dimensions::Scalar, _) => CrmGeometry::one_d(w, 1, w),
            (Dimensions::OneIndex(d) | Dimensions::TwoIndices(d, _), Some(_)) | (Dimensions::OneIndex(d), None) => {
                CrmGeometry::one_d(w, d.count, d.stride)
            }
            (Dimensions::TwoIndices(inner, outer), None) => {
                CrmGeometry::two_d(w, [inner.count, outer.count], [inner.stride, outer.stride])
            }
        }
    }

    /// Whether entry `idx` of `set` lies in this block
    pub fn covers(&self, set: &RegisterSet, idx: &[u32]) -> bool {
        if self.set.base != set.base {
            return false;
        }
        match self.outer {
            None => true,
            Some(o) => idx.get(1) == Some(&o),
        }
    }

    /// Encode the block as a checksum slot with operand `param`
    ///
    /// # Errors
    ///
    /// Returns the encoder's error for a geometry the CRM cannot walk.
    pub fn encode(&self, param: u32) -> Result<CrmMonitorConfig> {
        let mut cfg = init_config(CrmCommand::Checksum, self.base()?, &self.geometry())?;
        cfg.param = param;
        Ok(cfg)
    }
}

/// Software state of the CRM
#[derive(Debug)]
pub struct CrmEngine {
    state: CrmState,
    /// Bit per slot, set = interrupt masked
    masked: u64,
    plan: Vec<MonitoredBlock>,
}

impl CrmEngine {
    /// Engine for `plan`, slot `i` monitoring `plan[i]`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the plan has more blocks than the CRM has
    /// slots, or names a set that is not cacheable or fails validation.
    pub fn new(plan: Vec<MonitoredBlock>) -> Result<Self> {
        if plan.len() > regs::CRM_SLOT_COUNT as usize {
            return Err(SwitchError::invalid_argument(format!(
                "{} monitored blocks for {} CRM slots",
                plan.len(),
                regs::CRM_SLOT_COUNT
            )));
        }
        for block in &plan {
            if !block.set.cacheable {
                return Err(SwitchError::invalid_argument(format!(
                    "{} is not cacheable and cannot back a CRM checksum",
                    block.set.name
                )));
            }
            block.set.validate()?;
        }
        Ok(Self {
            state: CrmState::Stopped,
            masked: u64::MAX,
            plan,
        })
    }

    /// Current run state
    pub const fn state(&self) -> CrmState {
        self.state
    }

    /// Adopt the run state and interrupt mask the hardware currently reports
    ///
    /// Used when attaching to a device this engine did not bring up.
    ///
    /// # Errors
    ///
    /// Returns a bus error.
    pub fn refresh_state(&mut self, bus: &mut dyn RegisterBus) -> Result<CrmState> {
        self.state = if running(bus)? {
            CrmState::Running
        } else {
            CrmState::Stopped
        };
        self.masked = bus.read64(regs::CRM_IM)?;
        Ok(self.state)
    }

    /// Slots whose interrupt is unmasked, one bit per slot
    pub const fn enabled_slots(&self) -> u64 {
        !self.masked
    }

    /// Slot assignment
    pub fn plan(&self) -> &[MonitoredBlock] {
        &self.plan
    }

    /// Block checksummed by `slot`
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` if `slot` is not populated by the plan.
    pub fn monitored_block(&self, slot: u32) -> Result<&MonitoredBlock> {
        self.plan.get(slot as usize).ok_or(SwitchError::InvalidCrm {
            slot,
            max: self.last_planned_slot(),
        })
    }

    /// Slot whose block contains entry `idx` of `set`
    pub fn slot_for(&self, set: &RegisterSet, idx: &[u32]) -> Option<u32> {
        let slot = self.plan.iter().position(|b| b.covers(set, idx))?;
        u32::try_from(slot).ok()
    }

    /// Return the CRM to a quiescent state
    ///
    /// Masks every interrupt, stops the engine (ignoring a timeout), acknowledges
    /// everything pending and zeroes `CRM_CTRL`/`CRM_STATUS`.
    ///
    /// # Errors
    ///
    /// Returns the first bus error other than from the stop request.
    pub fn reset(&mut self, bus: &mut dyn RegisterBus) -> Result<()> {
        bus.write64(regs::CRM_IM, u64::MAX)?;
        self.masked = u64::MAX;

        if let Err(e) = stop_engine(bus) {
            warn!("CRM reset: stop failed, continuing: {e}");
        }

        bus.write64(regs::CRM_IP, u64::MAX)?;
        bus.write32(regs::CRM_CTRL, 0)?;
        bus.write32(regs::CRM_STATUS, 0)?;
        self.state = CrmState::Stopped;
        info!("CRM reset");
        Ok(())
    }

    /// Populate the whole slot table from the plan
    ///
    /// Every block is encoded before anything is written. With
    /// `set_checksums`, each slot's `param` is the XOR of its block as read
    /// from hardware; otherwise it is zero. Unplanned slots are cleared. On
    /// any failure the CRM is [`reset`](Self::reset) and the error returned.
    ///
    /// # Errors
    ///
    /// Returns the first encoding or bus error.
    pub fn init_table(&mut self, bus: &mut dyn RegisterBus, cache: &RegisterCache, set_checksums: bool) -> Result<()> {
        let result = self.populate_table(bus, cache, set_checksums);
        if let Err(e) = &result {
            warn!("CRM monitor table init failed: {e}");
            if let Err(reset_err) = self.reset(bus) {
                warn!("CRM reset after failed init also failed: {reset_err}");
            }
        }
        result
    }

    fn populate_table(&self, bus: &mut dyn RegisterBus, cache: &RegisterCache, set_checksums: bool) -> Result<()> {
        let mut configs = self
            .plan
            .iter()
            .map(|block| block.encode(0))
            .collect::<Result<Vec<_>>>()?;

        if set_checksums {
            for (cfg, block) in configs.iter_mut().zip(&self.plan) {
                cfg.param = cache.compute_live_checksum(bus, block.set, block.outer)?;
            }
        }

        for slot in 0..regs::CRM_SLOT_COUNT {
            let cfg = configs.get(slot as usize).copied().unwrap_or(CrmMonitorConfig::CLEARED);
            self.write_slot(bus, slot, &cfg)?;
        }
        info!(
            "CRM monitor table: {} checksum slots{}",
            configs.len(),
            if set_checksums { ", params from hardware" } else { "" }
        );
        Ok(())
    }

    /// Write one slot's command, register, param and period records
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` for a slot beyond the table, or a bus error.
    pub fn write_slot(&self, bus: &mut dyn RegisterBus, slot: u32, cfg: &CrmMonitorConfig) -> Result<()> {
        check_slot(slot, regs::CRM_SLOT_COUNT - 1)?;
        bus.write_mult(regs::crm_command(slot), &cfg.command_words())?;
        bus.write_mult(regs::crm_register(slot), &cfg.register_words())?;
        bus.write32(regs::crm_param(slot), cfg.param)?;
        // Period 0: scan at the maximum rate
        bus.write_mult(regs::crm_period(slot), &[0, 0])?;
        if cfg.scan_count() != 0 {
            debug!(
                "CRM slot {slot}: {:?} {} x {} words @ {:#08x}, param {:#010x}",
                cfg.command,
                cfg.scan_count(),
                cfg.words_per_register(),
                cfg.base_address,
                cfg.param
            );
        }
        Ok(())
    }

    /// Read a slot back from hardware
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` for a slot beyond the table, or a bus error.
    pub fn read_slot(&self, bus: &mut dyn RegisterBus, slot: u32) -> Result<CrmMonitorConfig> {
        check_slot(slot, regs::CRM_SLOT_COUNT - 1)?;
        let mut cmd = [0u32; 2];
        let mut reg = [0u32; 2];
        bus.read_mult(regs::crm_command(slot), &mut cmd)?;
        bus.read_mult(regs::crm_register(slot), &mut reg)?;
        let param = bus.read32(regs::crm_param(slot))?;
        Ok(CrmMonitorConfig::from_words(cmd, reg, param))
    }

    /// Start scanning slots `first..=last`
    ///
    /// Does nothing if already running. On timeout the run request is
    /// withdrawn and the state stays `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` for a bad range, `OperationTimedOut` if the engine
    /// never reports running, or a bus error.
    pub fn start(&mut self, bus: &mut dyn RegisterBus, first: u32, last: u32, continuous: bool) -> Result<()> {
        if self.state == CrmState::Running {
            debug!("CRM already running");
            return Ok(());
        }
        check_slot(last, regs::CRM_SLOT_COUNT - 1)?;
        check_slot(first, last)?;

        let status = crm_status::COMMAND_INDEX.set(0, u64::from(first));
        bus.write32(regs::CRM_STATUS, low_word(status))?;

        let mut ctrl = crm_ctrl::RUN.set(0, 1);
        ctrl = crm_ctrl::REPEAT.set(ctrl, u64::from(continuous));
        ctrl = crm_ctrl::FIRST_COMMAND_INDEX.set(ctrl, u64::from(first));
        ctrl = crm_ctrl::LAST_COMMAND_INDEX.set(ctrl, u64::from(last));
        bus.write32(regs::CRM_CTRL, low_word(ctrl))?;

        match poll_until(CRM_POLL, "CRM start", || running(bus)) {
            Ok(polls) => {
                self.state = CrmState::Running;
                info!(
                    "CRM running: slots {first}..={last}{} ({polls} polls)",
                    if continuous { ", continuous" } else { "" }
                );
                Ok(())
            }
            Err(e) => {
                if let Err(withdraw) = bus.write32(regs::CRM_CTRL, 0) {
                    warn!("CRM start: could not withdraw run request: {withdraw}");
                }
                Err(e)
            }
        }
    }

    /// Stop scanning
    ///
    /// Does nothing if already stopped. On timeout the state stays `Running`.
    ///
    /// # Errors
    ///
    /// Returns `OperationTimedOut` if the engine keeps reporting running, or a
    /// bus error.
    pub fn stop(&mut self, bus: &mut dyn RegisterBus) -> Result<()> {
        if self.state == CrmState::Stopped {
            debug!("CRM already stopped");
            return Ok(());
        }
        stop_engine(bus)?;
        self.state = CrmState::Stopped;
        info!("CRM stopped");
        Ok(())
    }

    /// Mask (`masked = true`) or unmask the interrupts of the slots in `mask`
    ///
    /// Unmasking first acknowledges anything already pending on those slots.
    ///
    /// # Errors
    ///
    /// Returns a bus error.
    pub fn mask_interrupts(&mut self, bus: &mut dyn RegisterBus, mask: u64, masked: bool) -> Result<()> {
        let next = if masked {
            self.masked | mask
        } else {
            bus.write64(regs::CRM_IP, mask)?;
            self.masked & !mask
        };
        bus.write64(regs::CRM_IM, next)?;
        self.masked = next;
        debug!("CRM_IM <- {next:#018x}");
        Ok(())
    }

    /// Unmask one monitored slot's interrupt
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` above the GLORT CAM slot, or a bus error.
    pub fn enable_slot(&mut self, bus: &mut dyn RegisterBus, slot: u32) -> Result<()> {
        check_slot(slot, regs::CRM_GLORT_CAM_SLOT)?;
        self.mask_interrupts(bus, 1 << slot, false)
    }

    /// Mask one monitored slot's interrupt
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` above the GLORT CAM slot, or a bus error.
    pub fn disable_slot(&mut self, bus: &mut dyn RegisterBus, slot: u32) -> Result<()> {
        check_slot(slot, regs::CRM_GLORT_CAM_SLOT)?;
        self.mask_interrupts(bus, 1 << slot, true)
    }

    /// Recompute `slot`'s checksum from the shadow and rewrite its `param`
    ///
    /// Returns the new checksum.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCrm` for an unplanned slot, or a bus error.
    pub fn update_checksum(&self, bus: &mut dyn RegisterBus, cache: &RegisterCache, slot: u32) -> Result<u32> {
        let block = self.monitored_block(slot)?;
        let sum = cache.compute_checksum(block.set, block.outer)?;
        bus.write32(regs::crm_param(slot), sum)?;
        debug!("CRM slot {slot}: param <- {sum:#010x}");
        Ok(sum)
    }

    /// Interrupt-pending vector, one bit per slot
    ///
    /// # Errors
    ///
    /// Returns a bus error.
    pub fn pending_interrupts(&self, bus: &mut dyn RegisterBus) -> Result<u64> {
        bus.read64(regs::CRM_IP)
    }

    fn last_planned_slot(&self) -> u32 {
        u32::try_from(self.plan.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }
}

fn check_slot(slot: u32, max: u32) -> Result<()> {
    if slot > max {
        return Err(SwitchError::InvalidCrm { slot, max });
    }
    Ok(())
}

/// Clear `Run` and wait for `Running` to drop
fn stop_engine(bus: &mut dyn RegisterBus) -> Result<()> {
    let ctrl = u64::from(bus.read32(regs::CRM_CTRL)?);
    bus.write32(regs::CRM_CTRL, low_word(crm_ctrl::RUN.set(ctrl, 0)))?;
    poll_until(CRM_POLL, "CRM stop", || running(bus).map(|r| !r))?;
    Ok(())
}

fn running(bus: &mut dyn RegisterBus) -> Result<bool> {
    let status = u64::from(bus.read32(regs::CRM_STATUS)?);
    Ok(crm_status::RUNNING.get(status) != 0)
}

#[allow(clippy::cast_possible_truncation)]
const fn low_word(reg: u64) -> u32 {
    reg as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareBus;
    use crate::cache::Dim;
    use crate::config::SwitchConfig;

    static TABLE: RegisterSet = RegisterSet {
        name: "TABLE",
        base: 0x2000,
        width: 2,
        dims: Dimensions::TwoIndices(Dim::new(16, 2), Dim::new(4, 0x40)),
        cacheable: true,
        tracks_validity: false,
        default_value: None,
    };

    static LIST: RegisterSet = RegisterSet {
        name: "LIST",
        base: 0x3000,
        width: 1,
        dims: Dimensions::OneIndex(Dim::new(8, 1)),
        cacheable: true,
        tracks_validity: false,
        default_value: None,
    };

    fn setup() -> (SoftwareBus, RegisterCache, CrmEngine) {
        let plan = vec![
            MonitoredBlock::slice(&TABLE, 0),
            MonitoredBlock::slice(&TABLE, 1),
            MonitoredBlock::whole(&LIST),
        ];
        let cache = RegisterCache::new(&[&TABLE, &LIST], &SwitchConfig::default()).unwrap();
        (SoftwareBus::new(), cache, CrmEngine::new(plan).unwrap())
    }

    #[test]
    fn init_writes_plan_and_clears_the_rest() {
        let (mut bus, cache, mut crm) = setup();
        bus.poke(regs::crm_param(10), 0x55);
        crm.init_table(&mut bus, &cache, false).unwrap();

        let slot1 = crm.read_slot(&mut bus, 1).unwrap();
        assert_eq!(slot1.command, CrmCommand::Checksum);
        assert_eq!(slot1.base_address, 0x2040);
        assert_eq!(slot1.scan_count(), 16);
        assert_eq!(slot1.words_per_register(), 2);

        let slot10 = crm.read_slot(&mut bus, 10).unwrap();
        assert_eq!(slot10, CrmMonitorConfig::CLEARED);
    }

    #[test]
    fn init_computes_params_from_hardware() {
        let (mut bus, cache, mut crm) = setup();
        bus.poke(0x3002, 0x0F0F);
        bus.poke(0x3005, 0x00FF);
        crm.init_table(&mut bus, &cache, true).unwrap();
        assert_eq!(crm.read_slot(&mut bus, 2).unwrap().param, 0x0FF0);
        assert_eq!(crm.read_slot(&mut bus, 0).unwrap().param, 0);
    }

    #[test]
    fn unencodable_plan_resets_instead_of_half_writing() {
        static ODD: RegisterSet = RegisterSet {
            name: "ODD",
            base: 0x5000,
            width: 1,
            dims: Dimensions::OneIndex(Dim::new(8, 2)),
            cacheable: true,
            tracks_validity: false,
            default_value: None,
        };
        let cache = RegisterCache::new(&[&LIST, &ODD], &SwitchConfig::default()).unwrap();
        let mut crm = CrmEngine::new(vec![MonitoredBlock::whole(&LIST), MonitoredBlock::whole(&ODD)]).unwrap();
        let mut bus = SoftwareBus::new();

        let err = crm.init_table(&mut bus, &cache, false).unwrap_err();
        assert!(matches!(err, SwitchError::Unsupported { .. }));
        // Nothing written to the slot table, interrupts masked
        assert_eq!(bus.peek(regs::crm_command(0)), 0);
        assert_eq!(bus.peek(regs::CRM_IM), u32::MAX);
        assert_eq!(crm.state(), CrmState::Stopped);
    }

    #[test]
    fn plan_must_name_cacheable_valid_sets() {
        static PLAIN: RegisterSet = RegisterSet {
            name: "PLAIN",
            cacheable: false,
            ..LIST_LAYOUT
        };
        static OVERLAPPING: RegisterSet = RegisterSet {
            name: "OVERLAPPING",
            dims: Dimensions::OneIndex(Dim::new(8, 0)),
            ..LIST_LAYOUT
        };
        const LIST_LAYOUT: RegisterSet = RegisterSet {
            name: "LIST_LAYOUT",
            base: 0x6000,
            width: 1,
            dims: Dimensions::OneIndex(Dim::new(8, 1)),
            cacheable: true,
            tracks_validity: false,
            default_value: None,
        };
        assert!(matches!(
            CrmEngine::new(vec![MonitoredBlock::whole(&LIST), MonitoredBlock::whole(&PLAIN)]),
            Err(SwitchError::InvalidArgument { .. })
        ));
        assert!(matches!(
            CrmEngine::new(vec![MonitoredBlock::whole(&OVERLAPPING)]),
            Err(SwitchError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (mut bus, _cache, mut crm) = setup();
        crm.start(&mut bus, 0, 2, true).unwrap();
        assert_eq!(crm.state(), CrmState::Running);
        assert!(bus.crm_running());

        bus.reset_stats();
        crm.start(&mut bus, 0, 2, true).unwrap();
        assert_eq!(bus.stats().writes + bus.stats().reads, 0);

        crm.stop(&mut bus).unwrap();
        assert_eq!(crm.state(), CrmState::Stopped);
        bus.reset_stats();
        crm.stop(&mut bus).unwrap();
        assert_eq!(bus.stats().writes + bus.stats().reads, 0);
    }

    #[test]
    fn start_programs_range_and_repeat() {
        let (mut bus, _cache, mut crm) = setup();
        crm.start(&mut bus, 1, 2, false).unwrap();
        let ctrl = u64::from(bus.peek(regs::CRM_CTRL));
        assert_eq!(crm_ctrl::REPEAT.get(ctrl), 0);
        assert_eq!(crm_ctrl::FIRST_COMMAND_INDEX.get(ctrl), 1);
        assert_eq!(crm_ctrl::LAST_COMMAND_INDEX.get(ctrl), 2);
        let status = u64::from(bus.peek(regs::CRM_STATUS));
        assert_eq!(crm_status::COMMAND_INDEX.get(status), 1);
    }

    #[test]
    fn attach_adopts_hardware_state() {
        let (mut bus, _cache, mut crm) = setup();
        crm.start(&mut bus, 0, 2, true).unwrap();
        crm.enable_slot(&mut bus, 2).unwrap();

        let mut attached = CrmEngine::new(vec![]).unwrap();
        assert_eq!(attached.refresh_state(&mut bus).unwrap(), CrmState::Running);
        assert_eq!(attached.enabled_slots(), crm.enabled_slots());
        attached.stop(&mut bus).unwrap();
        assert!(!bus.crm_running());
    }

    #[test]
    fn start_waits_for_running() {
        let (mut bus, _cache, mut crm) = setup();
        bus.set_crm_latency(5);
        crm.start(&mut bus, 0, 0, true).unwrap();
        assert_eq!(crm.state(), CrmState::Running);
    }

    #[test]
    fn bad_range_is_rejected_before_any_write() {
        let (mut bus, _cache, mut crm) = setup();
        assert!(matches!(crm.start(&mut bus, 0, 64, true), Err(SwitchError::InvalidCrm { slot: 64, .. })));
        assert!(matches!(crm.start(&mut bus, 3, 2, true), Err(SwitchError::InvalidCrm { slot: 3, max: 2 })));
        assert_eq!(bus.stats().writes, 0);
    }

    #[test]
    fn interrupt_mask_tracks_slots() {
        let (mut bus, _cache, mut crm) = setup();
        crm.reset(&mut bus).unwrap();
        assert_eq!(crm.enabled_slots(), 0);

        bus.poke(regs::CRM_IP, 0b110);
        crm.enable_slot(&mut bus, 1).unwrap();
        assert_eq!(crm.enabled_slots(), 0b10);
        assert_eq!(bus.pending(), 0b100);
        assert_eq!(bus.peek(regs::CRM_IM), !0b10);

        // Masking leaves pending bits alone
        crm.disable_slot(&mut bus, 2).unwrap();
        assert_eq!(bus.pending(), 0b100);
        crm.disable_slot(&mut bus, 1).unwrap();
        assert_eq!(crm.enabled_slots(), 0);

        assert!(matches!(
            crm.enable_slot(&mut bus, 33),
            Err(SwitchError::InvalidCrm { slot: 33, max: 32 })
        ));
    }

    #[test]
    fn update_checksum_tracks_shadow() {
        let (mut bus, mut cache, mut crm) = setup();
        crm.init_table(&mut bus, &cache, true).unwrap();
        cache.write_single(&mut bus, &TABLE, &[3, 1], &[0xAA, 0x0F], true).unwrap();
        assert_eq!(crm.update_checksum(&mut bus, &cache, 1).unwrap(), 0xA5);
        assert_eq!(bus.peek(regs::crm_param(1)), 0xA5);
        assert_eq!(bus.peek(regs::crm_param(0)), 0);
        assert!(matches!(
            crm.update_checksum(&mut bus, &cache, 3),
            Err(SwitchError::InvalidCrm { slot: 3, max: 2 })
        ));
    }

    #[test]
    fn slot_lookup_both_ways() {
        let (_bus, _cache, crm) = setup();
        assert_eq!(crm.slot_for(&TABLE, &[7, 1]), Some(1));
        assert_eq!(crm.slot_for(&TABLE, &[7, 3]), None);
        assert_eq!(crm.slot_for(&LIST, &[4]), Some(2));
        assert_eq!(crm.monitored_block(2).unwrap().set.name, "LIST");
    }

    #[test]
    fn whole_table_geometry() {
        let whole = MonitoredBlock::whole(&TABLE).geometry();
        assert_eq!(whole, CrmGeometry::two_d(2, [16, 4], [2, 0x40]));
        let cfg = MonitoredBlock::whole(&TABLE).encode(7).unwrap();
        assert_eq!(cfg.param, 7);
        assert_eq!(cfg.footprint(), Some((0x2000, 0x2000 + 3 * 0x40 + 31)));
    }
}
