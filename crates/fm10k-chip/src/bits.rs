//! Bit-range helpers for hardware record layouts.
//!
//! Multi-word registers are handled as `u64` values assembled from their
//! 32-bit words, least significant word first.

/// A contiguous bit range inside a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Least significant bit position.
    pub lsb: u32,
    /// Width in bits (1..=32).
    pub width: u32,
}

impl Field {
    /// Define a field starting at `lsb`, `width` bits wide.
    #[must_use]
    pub const fn new(lsb: u32, width: u32) -> Self {
        Self { lsb, width }
    }

    /// Largest value the field can hold.
    #[must_use]
    pub const fn max(self) -> u64 {
        (1u64 << self.width) - 1
    }

    /// Extract the field from `reg`.
    #[must_use]
    pub const fn get(self, reg: u64) -> u64 {
        (reg >> self.lsb) & self.max()
    }

    /// Return `reg` with the field replaced by `value` (truncated to width).
    #[must_use]
    pub const fn set(self, reg: u64, value: u64) -> u64 {
        let mask = self.max() << self.lsb;
        (reg & !mask) | ((value << self.lsb) & mask)
    }

    /// Whether `value` fits without truncation.
    #[must_use]
    pub const fn fits(self, value: u64) -> bool {
        value <= self.max()
    }
}

/// Assemble a 64-bit register from its two 32-bit words.
#[must_use]
pub const fn join_words(lo: u32, hi: u32) -> u64 {
    (lo as u64) | ((hi as u64) << 32)
}

/// Split a 64-bit register into its two 32-bit words (low word first).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn split_words(value: u64) -> [u32; 2] {
    [value as u32, (value >> 32) as u32]
}
