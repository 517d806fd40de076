//! Register cache and CRM engine control for the FM10000 switch.
//!
//! The control plane mirrors thousands of switch registers in host memory and
//! lets the on-chip CRM (consistency/rate monitor) re-scan the critical ones
//! autonomously, raising an interrupt when a table no longer matches the
//! checksum software expects. This crate keeps both sides in step.
//!
//! # Layers
//!
//! ```text
//! Switch ── Mutex<SwitchRegs> ── RegisterCache  (shadows, validity, deferral)
//!                              ├─ CrmEngine      (slot table, run state, IM/IP)
//!                              └─ Box<dyn RegisterBus>
//!                                   ├─ MmioBus      (PCI BAR mmap)
//!                                   └─ SoftwareBus  (model for CI/simulation)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use fm10k_driver::{tables, SoftwareBus, Switch, SwitchConfig};
//!
//! # fn main() -> fm10k_driver::Result<()> {
//! let sw = Switch::init(Box::new(SoftwareBus::new()), SwitchConfig::simulation())?;
//! let mut regs = sw.lock();
//! regs.write_and_resync(&tables::GLORT_CAM, &[7], &[0x00FF_0042])?;
//! regs.crm_enable_slot(fm10k_chip::regs::CRM_GLORT_CAM_SLOT)?;
//! regs.crm_start(0, fm10k_chip::regs::CRM_GLORT_CAM_SLOT, true)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod bus;
pub mod cache;
mod config;
pub mod crm;
mod error;
mod poll;
mod switch;
pub mod tables;

pub use backends::{BusStats, MmioBus, SoftwareBus};
pub use bus::{select_bus, BusSelection, BusType, RegisterBus};
pub use cache::{DefaultValueFn, Dim, Dimensions, RegisterCache, RegisterSet};
pub use config::{CacheMode, SwitchConfig};
pub use crm::{init_config, CrmEngine, CrmGeometry, CrmState, MonitoredBlock};
pub use error::{Result, SwitchError};
pub use poll::{poll_until, PollPolicy, CRM_POLL};
pub use switch::{Switch, SwitchRegs};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        tables, CacheMode, CrmGeometry, CrmState, RegisterBus, RegisterSet, Result, SoftwareBus,
        Switch, SwitchConfig, SwitchError,
    };
}
