//! Register bus implementations
//!
//! Two backends available:
//! - **Mmio**: memory-mapped switch BAR through PCI sysfs (real hardware)
//! - **Software**: sparse register model with a simulated CRM (CI, no hardware)

pub mod mmio;
pub mod software;

pub use mmio::MmioBus;
pub use software::{BusStats, SoftwareBus};
