//! Error types for switch register and CRM operations

use thiserror::Error;

/// Result type alias for switch operations
pub type Result<T> = std::result::Result<T, SwitchError>;

/// Errors that can occur during register cache and CRM operations
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Malformed geometry, wrong index count or mismatched buffer length
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong
        reason: String,
    },

    /// Geometry the CRM hardware encoding cannot represent
    #[error("Unsupported: {reason}")]
    Unsupported {
        /// What cannot be encoded
        reason: String,
    },

    /// CRM slot index outside the valid range
    #[error("Invalid CRM slot {slot} (valid range 0..={max})")]
    InvalidCrm {
        /// Requested slot
        slot: u32,
        /// Largest valid slot
        max: u32,
    },

    /// Register set unknown to the cache, or entry index out of range
    #[error("Invalid register set {name}: {reason}")]
    InvalidRegisterSet {
        /// Register set name
        name: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Bounded polling exhausted without the expected state change
    #[error("Operation timed out: {operation} after {attempts} polls")]
    OperationTimedOut {
        /// Operation that was waiting
        operation: &'static str,
        /// Polls performed
        attempts: u32,
    },

    /// Management bus transaction failed
    #[error("Bus error at {addr:#08x}: {reason}")]
    Bus {
        /// Word address of the failing access
        addr: u32,
        /// Reason for failure
        reason: String,
    },

    /// I/O error while opening or mapping a device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl SwitchError {
    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an unsupported geometry error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }

    /// Create an invalid register set error
    pub fn invalid_register_set(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRegisterSet {
            name,
            reason: reason.into(),
        }
    }

    /// Create a bus error
    pub fn bus(addr: u32, reason: impl Into<String>) -> Self {
        Self::Bus {
            addr,
            reason: reason.into(),
        }
    }

    /// Whether this is a polling timeout (fatal to the call, not to the device)
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::OperationTimedOut { .. })
    }
}
