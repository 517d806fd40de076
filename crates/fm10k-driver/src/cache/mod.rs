//! Register cache engine
//!
//! Keeps a host shadow of every register set in the descriptor table and the
//! device in step. All operations take the bus explicitly; the caller (the
//! [`Switch`](crate::Switch) guard) holds the register-space lock for the
//! duration of the call.
//!
//! # Consistency rules
//!
//! - Writes reach hardware first and the shadow only on success, so a bus
//!   error never leaves the shadow ahead of the device.
//! - With write deferral enabled, non-forced writes update the shadow only and
//!   mark the entry dirty; [`RegisterCache::flush_deferred`] pushes them.
//! - Every index is validated before any bus or shadow access.

mod descriptor;
mod shadow;

pub use descriptor::{DefaultValueFn, Dim, Dimensions, RegisterSet};
pub use shadow::{Bitmap, Shadow};

use crate::bus::RegisterBus;
use crate::config::{CacheMode, SwitchConfig};
use crate::error::{Result, SwitchError};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Shadows for a fixed table of register sets
#[derive(Debug)]
pub struct RegisterCache {
    sets: Vec<&'static RegisterSet>,
    /// Keyed by base address
    shadows: BTreeMap<u32, Shadow>,
    mode: CacheMode,
    defer_writes: bool,
    fast_bringup: bool,
}

impl RegisterCache {
    /// Allocate zeroed shadows for `sets`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a descriptor fails validation or two
    /// descriptors share a base address.
    pub fn new(sets: &[&'static RegisterSet], config: &SwitchConfig) -> Result<Self> {
        let mut shadows = BTreeMap::new();
        for set in sets {
            set.validate()?;
            let shadow = Shadow::new(set.entry_count() as usize, set.width as usize, set.tracks_validity);
            if shadows.insert(set.base, shadow).is_some() {
                return Err(SwitchError::invalid_argument(format!(
                    "{}: base address {:#08x} already registered",
                    set.name, set.base
                )));
            }
        }
        debug!("RegisterCache: {} register sets", sets.len());
        Ok(Self {
            sets: sets.to_vec(),
            shadows,
            mode: config.cache_mode,
            defer_writes: config.defer_writes,
            fast_bringup: config.fast_bringup,
        })
    }

    /// Register sets this cache shadows
    pub fn sets(&self) -> &[&'static RegisterSet] {
        &self.sets
    }

    /// Current read path
    pub const fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Change the read path
    pub fn set_mode(&mut self, mode: CacheMode) {
        self.mode = mode;
    }

    /// Enable or disable write deferral (pending entries stay dirty)
    pub fn set_defer_writes(&mut self, on: bool) {
        self.defer_writes = on;
    }

    /// Shadow of `set`
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegisterSet` if the cache was not built with `set`
    /// (a descriptor at a registered base but with another layout included).
    pub fn shadow(&self, set: &RegisterSet) -> Result<&Shadow> {
        self.check_registered(set)?;
        self.shadows.get(&set.base).ok_or_else(|| unknown(set))
    }

    fn shadow_mut(&mut self, set: &RegisterSet) -> Result<&mut Shadow> {
        self.check_registered(set)?;
        self.shadows.get_mut(&set.base).ok_or_else(|| unknown(set))
    }

    fn check_registered(&self, set: &RegisterSet) -> Result<()> {
        if self.sets.iter().any(|s| s.same_layout(set)) {
            Ok(())
        } else {
            Err(unknown(set))
        }
    }

    /// Read one entry
    ///
    /// In live mode, and for entries not yet valid, the entry is read from
    /// hardware and the shadow refreshed first. A dirty entry is always
    /// served from the shadow: its pending write is newer than the device.
    ///
    /// # Errors
    ///
    /// Returns an index error or the bus error of the hardware read.
    pub fn read_single(&mut self, bus: &mut dyn RegisterBus, set: &RegisterSet, idx: &[u32]) -> Result<Vec<u32>> {
        let n = set.entry_index(idx)?;
        let live = self.mode == CacheMode::Live;
        let shadow = self.shadow_mut(set)?;
        if !shadow.is_dirty(n) && (live || !shadow.is_valid(n)) {
            return fetch_from_hw(bus, set, idx, n, shadow);
        }
        Ok(shadow.entry(n).to_vec())
    }

    /// Write one entry
    ///
    /// The hardware write is skipped only when `force_hw` is false and write
    /// deferral is enabled; the entry is then left dirty for
    /// [`flush_deferred`](Self::flush_deferred).
    ///
    /// # Errors
    ///
    /// Returns an index error, `InvalidArgument` if `words` is not one
    /// register wide, or the bus error of the hardware write (shadow untouched).
    pub fn write_single(
        &mut self,
        bus: &mut dyn RegisterBus,
        set: &RegisterSet,
        idx: &[u32],
        words: &[u32],
        force_hw: bool,
    ) -> Result<()> {
        let n = set.entry_index(idx)?;
        check_width(set, words.len(), 1)?;
        let addr = set.address(idx)?;
        let deferred = self.defer_writes && !force_hw;
        let shadow = self.shadow_mut(set)?;
        if !deferred {
            bus.write_mult(addr, words)?;
        }
        shadow.store(n, words);
        shadow.set_valid(n, true);
        shadow.set_dirty(n, deferred);
        debug!("{}{idx:?} @ {addr:#08x} <- {words:08x?}{}", set.name, if deferred { " (deferred)" } else { "" });
        Ok(())
    }

    /// Merge `data` into one entry under `mask` and write the result back
    ///
    /// Computes `(old & !mask) | (data & mask)` per word from the shadow and
    /// issues a single write, deferred under the same rule as
    /// [`write_single`](Self::write_single). Returns the merged value.
    ///
    /// # Errors
    ///
    /// Same as [`read_single`](Self::read_single) and
    /// [`write_single`](Self::write_single).
    pub fn read_modify_write(
        &mut self,
        bus: &mut dyn RegisterBus,
        set: &RegisterSet,
        idx: &[u32],
        data: &[u32],
        mask: &[u32],
        force_hw: bool,
    ) -> Result<Vec<u32>> {
        let n = set.entry_index(idx)?;
        check_width(set, data.len(), 1)?;
        check_width(set, mask.len(), 1)?;
        let shadow = self.shadow_mut(set)?;
        let old = if shadow.is_valid(n) {
            shadow.entry(n).to_vec()
        } else {
            // No meaningful shadow yet: merge against the device contents
            fetch_from_hw(bus, set, idx, n, shadow)?
        };
        let merged: Vec<u32> = old
            .iter()
            .zip(data.iter().zip(mask))
            .map(|(&o, (&d, &m))| (o & !m) | (d & m))
            .collect();
        self.write_single(bus, set, idx, &merged, force_hw)?;
        Ok(merged)
    }

    /// Read consecutive entries along the inner index, starting at `first`
    ///
    /// `out.len()` must be a multiple of the register width; the whole range
    /// is validated before any access.
    ///
    /// # Errors
    ///
    /// Returns an index error or the first bus error.
    pub fn read_multi(
        &mut self,
        bus: &mut dyn RegisterBus,
        set: &RegisterSet,
        first: &[u32],
        out: &mut [u32],
    ) -> Result<()> {
        let count = self.check_run(set, first, out.len())?;
        let width = set.width as usize;
        let mut idx = first.to_vec();
        for (i, chunk) in (0..count).zip(out.chunks_exact_mut(width)) {
            #[allow(clippy::cast_possible_truncation)]
            let inner = first[0] + i as u32;
            idx[0] = inner;
            chunk.copy_from_slice(&self.read_single(bus, set, &idx)?);
        }
        Ok(())
    }

    /// Write consecutive entries along the inner index, starting at `first`
    ///
    /// # Errors
    ///
    /// Returns an index error or the first bus error; entries before the
    /// failing one stay written.
    pub fn write_multi(
        &mut self,
        bus: &mut dyn RegisterBus,
        set: &RegisterSet,
        first: &[u32],
        words: &[u32],
        force_hw: bool,
    ) -> Result<()> {
        let count = self.check_run(set, first, words.len())?;
        let width = set.width as usize;
        let mut idx = first.to_vec();
        for (i, chunk) in (0..count).zip(words.chunks_exact(width)) {
            #[allow(clippy::cast_possible_truncation)]
            let inner = first[0] + i as u32;
            idx[0] = inner;
            self.write_single(bus, set, &idx, chunk, force_hw)?;
        }
        Ok(())
    }

    /// Seed the shadow of `set` at bring-up
    ///
    /// With fast bring-up and a default-value generator, every word is
    /// evaluated without touching hardware (validity-tracked entries stay
    /// invalid). Validity-tracked sets without a generator are left invalid
    /// and read lazily. Everything else is read from hardware.
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn populate_defaults(&mut self, bus: &mut dyn RegisterBus, set: &RegisterSet) -> Result<()> {
        let fast = self.fast_bringup;
        let shadow = self.shadow_mut(set)?;
        let width = set.width as usize;
        let mut words = vec![0u32; width];

        match set.default_value {
            Some(default) if fast => {
                for (n, addr) in set.entry_addresses().enumerate() {
                    for (w, a) in words.iter_mut().zip(addr..) {
                        *w = default(a);
                    }
                    shadow.store(n, &words);
                    shadow.set_dirty(n, false);
                }
                debug!("{}: seeded {} entries from defaults", set.name, set.entry_count());
            }
            None if fast && set.tracks_validity => {
                debug!("{}: left invalid until first access", set.name);
            }
            _ => {
                for (n, addr) in set.entry_addresses().enumerate() {
                    bus.read_mult(addr, &mut words)?;
                    shadow.store(n, &words);
                    shadow.set_valid(n, true);
                    shadow.set_dirty(n, false);
                }
                debug!("{}: read {} entries from hardware", set.name, set.entry_count());
            }
        }
        Ok(())
    }

    /// [`populate_defaults`](Self::populate_defaults) for every set
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn populate_all(&mut self, bus: &mut dyn RegisterBus) -> Result<()> {
        let sets = self.sets.clone();
        for set in sets {
            self.populate_defaults(bus, set)?;
        }
        info!(
            "Register cache populated: {} sets ({})",
            self.sets.len(),
            if self.fast_bringup { "fast bring-up" } else { "hardware reads" }
        );
        Ok(())
    }

    /// XOR of every shadow word in `set`, or in outer slice `outer` of a
    /// two-index set
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `outer` is given for a set without an
    /// outer index, or `InvalidRegisterSet` if it is out of range.
    pub fn compute_checksum(&self, set: &RegisterSet, outer: Option<u32>) -> Result<u32> {
        let range = entry_range(set, outer)?;
        let shadow = self.shadow(set)?;
        Ok(shadow.entries(range).iter().fold(0, |acc, w| acc ^ w))
    }

    /// Same as [`compute_checksum`](Self::compute_checksum), reading hardware
    ///
    /// # Errors
    ///
    /// Index errors as for `compute_checksum`, or the first bus error.
    pub fn compute_live_checksum(&self, bus: &mut dyn RegisterBus, set: &RegisterSet, outer: Option<u32>) -> Result<u32> {
        let range = entry_range(set, outer)?;
        self.shadow(set)?;
        let mut words = vec![0u32; set.width as usize];
        let mut sum = 0;
        for n in range {
            bus.read_mult(set.address(&set.indices_of(n))?, &mut words)?;
            sum = words.iter().fold(sum, |acc, w| acc ^ w);
        }
        Ok(sum)
    }

    /// Push every deferred entry to hardware, in set and entry order
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns the first bus error; entries written before it are no longer dirty.
    pub fn flush_deferred(&mut self, bus: &mut dyn RegisterBus) -> Result<usize> {
        let mut flushed = 0;
        for set in &self.sets {
            let Some(shadow) = self.shadows.get_mut(&set.base) else {
                continue;
            };
            for n in shadow.dirty_entries() {
                bus.write_mult(set.address(&set.indices_of(n))?, shadow.entry(n))?;
                shadow.set_dirty(n, false);
                flushed += 1;
            }
        }
        if flushed > 0 {
            info!("Flushed {flushed} deferred register writes");
        }
        Ok(flushed)
    }

    /// Number of entries waiting for [`flush_deferred`](Self::flush_deferred)
    pub fn pending_writes(&self) -> usize {
        self.shadows.values().map(Shadow::dirty_count).sum()
    }

    /// Rewrite the whole shadow of `set` to hardware (after a chip reset)
    ///
    /// Invalid entries of validity-tracked sets are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn restore(&mut self, bus: &mut dyn RegisterBus, set: &RegisterSet) -> Result<()> {
        let shadow = self.shadow_mut(set)?;
        let mut written = 0usize;
        for (n, addr) in set.entry_addresses().enumerate() {
            if !shadow.is_valid(n) {
                continue;
            }
            bus.write_mult(addr, shadow.entry(n))?;
            shadow.set_dirty(n, false);
            written += 1;
        }
        info!("{}: restored {written} entries", set.name);
        Ok(())
    }

    /// Whether entry `idx` holds meaningful data
    ///
    /// # Errors
    ///
    /// Returns an index error.
    pub fn is_valid(&self, set: &RegisterSet, idx: &[u32]) -> Result<bool> {
        let n = set.entry_index(idx)?;
        Ok(self.shadow(set)?.is_valid(n))
    }

    /// Mark entry `idx` invalid so the next read goes to hardware
    ///
    /// # Errors
    ///
    /// Returns an index error, or `InvalidArgument` if `set` does not track validity.
    pub fn invalidate(&mut self, set: &RegisterSet, idx: &[u32]) -> Result<()> {
        if !set.tracks_validity {
            return Err(SwitchError::invalid_argument(format!("{} does not track validity", set.name)));
        }
        let n = set.entry_index(idx)?;
        self.shadow_mut(set)?.set_valid(n, false);
        Ok(())
    }

    /// Validate a run of entries along the inner index; returns its length
    fn check_run(&self, set: &RegisterSet, first: &[u32], len: usize) -> Result<usize> {
        set.entry_index(first)?;
        self.shadow(set)?;
        let Some(inner) = set.dims.dim(0) else {
            return Err(SwitchError::invalid_argument(format!("{} has no index to step", set.name)));
        };
        let width = set.width as usize;
        if len == 0 || len % width != 0 {
            return Err(SwitchError::invalid_argument(format!(
                "{}: buffer of {len} words is not a whole number of {width}-word entries",
                set.name
            )));
        }
        let count = len / width;
        if first[0] as usize + count > inner.count as usize {
            return Err(SwitchError::invalid_register_set(
                set.name,
                format!("entries {}..{} exceed {}", first[0], first[0] as usize + count, inner.count),
            ));
        }
        Ok(count)
    }
}

/// Read entry `n` from the device into `shadow`, which is then valid and clean
fn fetch_from_hw(
    bus: &mut dyn RegisterBus,
    set: &RegisterSet,
    idx: &[u32],
    n: usize,
    shadow: &mut Shadow,
) -> Result<Vec<u32>> {
    let mut words = vec![0u32; set.width as usize];
    bus.read_mult(set.address(idx)?, &mut words)?;
    shadow.store(n, &words);
    shadow.set_valid(n, true);
    shadow.set_dirty(n, false);
    Ok(words)
}

fn unknown(set: &RegisterSet) -> SwitchError {
    SwitchError::invalid_register_set(set.name, "not part of this cache")
}

fn check_width(set: &RegisterSet, len: usize, entries: usize) -> Result<()> {
    let expected = set.width as usize * entries;
    if len != expected {
        return Err(SwitchError::invalid_argument(format!(
            "{}: expected {expected} words, got {len}",
            set.name
        )));
    }
    Ok(())
}

/// Flat entry range of the whole set or one outer slice
fn entry_range(set: &RegisterSet, outer: Option<u32>) -> Result<std::ops::Range<usize>> {
    match (set.dims, outer) {
        (_, None) => Ok(0..set.entry_count() as usize),
        (Dimensions::TwoIndices(inner, _), Some(o)) => {
            let start = set.entry_index(&[0, o])?;
            Ok(start..start + inner.count as usize)
        }
        (_, Some(_)) => Err(SwitchError::invalid_argument(format!(
            "{} has no outer index",
            set.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SoftwareBus;

    fn seeded(addr: u32) -> u32 {
        addr ^ 0xA5A5_0000
    }

    static LINEAR: RegisterSet = RegisterSet {
        name: "LINEAR",
        base: 0x100,
        width: 1,
        dims: Dimensions::OneIndex(Dim::new(32, 1)),
        cacheable: true,
        tracks_validity: false,
        default_value: None,
    };

    static WIDE: RegisterSet = RegisterSet {
        name: "WIDE",
        base: 0x400,
        width: 2,
        dims: Dimensions::TwoIndices(Dim::new(4, 2), Dim::new(3, 0x10)),
        cacheable: false,
        tracks_validity: false,
        default_value: Some(seeded),
    };

    static KEYS: RegisterSet = RegisterSet {
        name: "KEYS",
        base: 0x800,
        width: 2,
        dims: Dimensions::OneIndex(Dim::new(8, 2)),
        cacheable: true,
        tracks_validity: true,
        default_value: None,
    };

    fn cache(config: &SwitchConfig) -> RegisterCache {
        RegisterCache::new(&[&LINEAR, &WIDE, &KEYS], config).unwrap()
    }

    #[test]
    fn write_then_read_returns_written_words() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        c.write_single(&mut bus, &WIDE, &[3, 2], &[1, 2], true).unwrap();
        assert_eq!(c.read_single(&mut bus, &WIDE, &[3, 2]).unwrap(), vec![1, 2]);
        assert_eq!(bus.peek(0x400 + 6 + 0x20), 1);
        assert_eq!(bus.peek(0x400 + 7 + 0x20), 2);
    }

    #[test]
    fn fast_read_does_not_touch_hardware() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        c.write_single(&mut bus, &LINEAR, &[5], &[0xDEAD_BEEF], true).unwrap();
        bus.reset_stats();
        assert_eq!(c.read_single(&mut bus, &LINEAR, &[5]).unwrap(), vec![0xDEAD_BEEF]);
        assert_eq!(bus.stats().reads, 0);
    }

    #[test]
    fn live_read_refreshes_shadow() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default().with_cache_mode(CacheMode::Live));
        bus.poke(0x105, 42);
        assert_eq!(c.read_single(&mut bus, &LINEAR, &[5]).unwrap(), vec![42]);
        assert_eq!(c.shadow(&LINEAR).unwrap().entry(5), &[42]);
    }

    #[test]
    fn out_of_range_index_fails_without_access() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        let err = c.write_single(&mut bus, &LINEAR, &[32], &[1], true).unwrap_err();
        assert!(matches!(err, SwitchError::InvalidRegisterSet { .. }));
        assert_eq!(bus.stats().writes, 0);
    }

    #[test]
    fn wrong_width_is_invalid_argument() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        let err = c.write_single(&mut bus, &WIDE, &[0, 0], &[1], true).unwrap_err();
        assert!(matches!(err, SwitchError::InvalidArgument { .. }));
    }

    #[test]
    fn bus_failure_leaves_shadow_untouched() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        c.write_single(&mut bus, &LINEAR, &[1], &[7], true).unwrap();
        bus.inject_fault(0x101);
        assert!(c.write_single(&mut bus, &LINEAR, &[1], &[9], true).is_err());
        assert_eq!(c.shadow(&LINEAR).unwrap().entry(1), &[7]);
    }

    #[test]
    fn rmw_merges_under_mask() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        c.write_single(&mut bus, &WIDE, &[1, 0], &[0xFFFF_0000, 0x1234_5678], true).unwrap();
        let merged = c
            .read_modify_write(&mut bus, &WIDE, &[1, 0], &[0x0000_00AB, 0], &[0x0000_00FF, 0], false)
            .unwrap();
        assert_eq!(merged, vec![0xFFFF_00AB, 0x1234_5678]);
        assert_eq!(bus.peek(0x402), 0xFFFF_00AB);
    }

    #[test]
    fn rmw_issues_one_write_and_no_reads_in_fast_mode() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        bus.reset_stats();
        c.read_modify_write(&mut bus, &LINEAR, &[0], &[1], &[1], false).unwrap();
        assert_eq!(bus.stats().reads, 0);
        assert_eq!(bus.stats().writes, 1);
    }

    #[test]
    fn deferred_writes_wait_for_flush() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default().with_defer_writes(true));
        c.write_single(&mut bus, &LINEAR, &[3], &[0x33], false).unwrap();
        c.write_single(&mut bus, &LINEAR, &[4], &[0x44], true).unwrap();
        assert_eq!(bus.peek(0x103), 0);
        assert_eq!(bus.peek(0x104), 0x44);
        assert_eq!(c.pending_writes(), 1);

        assert_eq!(c.flush_deferred(&mut bus).unwrap(), 1);
        assert_eq!(bus.peek(0x103), 0x33);
        assert_eq!(c.pending_writes(), 0);
    }

    #[test]
    fn live_read_keeps_a_pending_deferred_write() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default().with_defer_writes(true));
        c.write_single(&mut bus, &LINEAR, &[3], &[0x11], true).unwrap();
        c.set_mode(CacheMode::Live);
        c.write_single(&mut bus, &LINEAR, &[3], &[0x33], false).unwrap();

        bus.reset_stats();
        assert_eq!(c.read_single(&mut bus, &LINEAR, &[3]).unwrap(), vec![0x33]);
        assert_eq!(bus.stats().reads, 0);
        assert_eq!(c.pending_writes(), 1);

        c.flush_deferred(&mut bus).unwrap();
        assert_eq!(bus.peek(0x103), 0x33);
        // Clean again, so live reads go back to the device
        bus.poke(0x103, 0x44);
        assert_eq!(c.read_single(&mut bus, &LINEAR, &[3]).unwrap(), vec![0x44]);
    }

    #[test]
    fn forced_rmw_bypasses_deferral() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default().with_defer_writes(true));
        c.read_modify_write(&mut bus, &LINEAR, &[2], &[0xF0], &[0xFF], false).unwrap();
        assert_eq!(bus.peek(0x102), 0);
        assert_eq!(c.pending_writes(), 1);

        c.read_modify_write(&mut bus, &LINEAR, &[2], &[0x0F], &[0x0F], true).unwrap();
        assert_eq!(bus.peek(0x102), 0xFF);
        assert_eq!(c.pending_writes(), 0);
    }

    #[test]
    fn rmw_of_invalid_entry_merges_device_contents() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::simulation());
        bus.poke(0x806, 0xAB00);
        let merged = c.read_modify_write(&mut bus, &KEYS, &[3], &[0xCD, 0], &[0xFF, 0], true).unwrap();
        assert_eq!(merged, vec![0xABCD, 0]);
        assert!(c.is_valid(&KEYS, &[3]).unwrap());
    }

    #[test]
    fn fast_bringup_evaluates_defaults() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::simulation());
        c.populate_defaults(&mut bus, &WIDE).unwrap();
        assert_eq!(bus.stats().reads, 0);
        let shadow = c.shadow(&WIDE).unwrap();
        for (n, addr) in WIDE.entry_addresses().enumerate() {
            assert_eq!(shadow.entry(n), &[seeded(addr), seeded(addr + 1)]);
        }
    }

    #[test]
    fn hardware_bringup_reads_every_entry() {
        let mut bus = SoftwareBus::new();
        bus.power_on(&[&WIDE]);
        let mut c = cache(&SwitchConfig::default());
        c.populate_defaults(&mut bus, &WIDE).unwrap();
        assert_eq!(bus.stats().reads, u64::from(WIDE.entry_count() * WIDE.width));
        let shadow = c.shadow(&WIDE).unwrap();
        for (n, addr) in WIDE.entry_addresses().enumerate() {
            assert_eq!(shadow.entry(n)[1], seeded(addr + 1));
        }
    }

    #[test]
    fn invalid_entries_are_read_lazily() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::simulation());
        c.populate_defaults(&mut bus, &KEYS).unwrap();
        assert!(!c.is_valid(&KEYS, &[2]).unwrap());

        bus.poke(0x804, 0xAB);
        assert_eq!(c.read_single(&mut bus, &KEYS, &[2]).unwrap(), vec![0xAB, 0]);
        assert!(c.is_valid(&KEYS, &[2]).unwrap());

        c.invalidate(&KEYS, &[2]).unwrap();
        assert!(!c.is_valid(&KEYS, &[2]).unwrap());
        assert!(c.invalidate(&LINEAR, &[0]).is_err());
    }

    #[test]
    fn checksum_xors_every_word() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        c.write_single(&mut bus, &WIDE, &[0, 1], &[0xF0, 0x0F], true).unwrap();
        c.write_single(&mut bus, &WIDE, &[2, 1], &[0x01, 0x00], true).unwrap();
        c.write_single(&mut bus, &WIDE, &[0, 2], &[0x100, 0], true).unwrap();
        assert_eq!(c.compute_checksum(&WIDE, Some(1)).unwrap(), 0xFE);
        assert_eq!(c.compute_checksum(&WIDE, Some(0)).unwrap(), 0);
        assert_eq!(c.compute_checksum(&WIDE, None).unwrap(), 0x1FE);
        assert_eq!(c.compute_live_checksum(&mut bus, &WIDE, Some(1)).unwrap(), 0xFE);
        assert!(c.compute_checksum(&LINEAR, Some(0)).is_err());
        assert!(c.compute_checksum(&WIDE, Some(3)).is_err());
    }

    #[test]
    fn multi_entry_access_is_validated_up_front() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        c.write_multi(&mut bus, &LINEAR, &[30], &[1, 2], true).unwrap();
        let err = c.write_multi(&mut bus, &LINEAR, &[31], &[1, 2], true).unwrap_err();
        assert!(matches!(err, SwitchError::InvalidRegisterSet { .. }));
        assert_eq!(c.shadow(&LINEAR).unwrap().entry(31), &[2]);

        let mut out = [0u32; 4];
        c.read_multi(&mut bus, &WIDE, &[2, 1], &mut out).unwrap();
        assert!(c.read_multi(&mut bus, &WIDE, &[2, 1], &mut [0u32; 3]).is_err());
    }

    #[test]
    fn restore_rewrites_valid_entries() {
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::simulation());
        c.write_single(&mut bus, &KEYS, &[1], &[5, 6], true).unwrap();
        bus.poke(0x802, 0);
        bus.reset_stats();
        c.restore(&mut bus, &KEYS).unwrap();
        assert_eq!(bus.peek(0x802), 5);
        // Only the one valid entry was rewritten
        assert_eq!(bus.stats().writes, 2);
    }

    #[test]
    fn foreign_register_set_is_rejected() {
        static OTHER: RegisterSet = RegisterSet { name: "OTHER", base: 0x9000, ..LINEAR_TEMPLATE };
        const LINEAR_TEMPLATE: RegisterSet = RegisterSet {
            name: "T",
            base: 0,
            width: 1,
            dims: Dimensions::Scalar,
            cacheable: false,
            tracks_validity: false,
            default_value: None,
        };
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        assert!(matches!(
            c.read_single(&mut bus, &OTHER, &[]),
            Err(SwitchError::InvalidRegisterSet { name: "OTHER", .. })
        ));
    }

    #[test]
    fn same_base_with_other_layout_is_rejected() {
        static LONGER: RegisterSet = RegisterSet {
            name: "LONGER",
            base: 0x100,
            width: 1,
            dims: Dimensions::OneIndex(Dim::new(64, 1)),
            cacheable: true,
            tracks_validity: false,
            default_value: None,
        };
        let mut bus = SoftwareBus::new();
        let mut c = cache(&SwitchConfig::default());
        assert!(matches!(
            c.read_single(&mut bus, &LONGER, &[40]),
            Err(SwitchError::InvalidRegisterSet { name: "LONGER", .. })
        ));
        assert!(c.write_single(&mut bus, &LONGER, &[40], &[1], true).is_err());
        assert!(c.compute_checksum(&LONGER, None).is_err());
        assert_eq!(bus.stats().writes, 0);
    }
}
