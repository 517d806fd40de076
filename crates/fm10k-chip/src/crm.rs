//! CRM (consistency/rate monitor) record layout.
//!
//! Each monitor slot is described by four hardware records:
//!
//! ```text
//! CRM_COMMAND  (2 words)  Command[2:0]  DataIndex[13:3]  Count[37:14]
//! CRM_REGISTER (2 words)  BaseAddress[23:0]  Size[25:24]
//!                         BlockSize1Shift[29:26]  Stride1Shift[33:30]
//!                         BlockSize2Shift[37:34]  Stride2Shift[41:38]
//! CRM_PARAM    (1 word)   command operand (expected checksum, threshold)
//! CRM_PERIOD   (2 words)  scan-rate divisor, 0 = maximum rate
//! ```
//!
//! Shift fields hold powers of two. `0x0F` marks an unused dimension. The
//! stride fields store "shift minus one": a stored value `s` means a physical
//! stride of `2^(s+1)` words.

use crate::bits::{join_words, split_words, Field};

/// Shift value marking an unused dimension.
pub const SHIFT_UNUSED: u8 = 0x0F;

/// `CRM_COMMAND` field definitions.
pub mod command {
    use crate::bits::Field;

    /// Opcode.
    pub const COMMAND: Field = Field::new(0, 3);
    /// Index into `CRM_DATA` for commands that keep per-register state.
    pub const DATA_INDEX: Field = Field::new(3, 11);
    /// Registers scanned per pass.
    pub const COUNT: Field = Field::new(14, 24);
}

/// `CRM_REGISTER` field definitions.
pub mod register {
    use crate::bits::Field;

    /// Word address of the first register.
    pub const BASE_ADDRESS: Field = Field::new(0, 24);
    /// Register width in words, minus one.
    pub const SIZE: Field = Field::new(24, 2);
    /// log2 of the inner block size, in registers.
    pub const BLOCK_SIZE1_SHIFT: Field = Field::new(26, 4);
    /// log2 of the inner block stride in words, minus one.
    pub const STRIDE1_SHIFT: Field = Field::new(30, 4);
    /// log2 of the outer block size, in inner blocks.
    pub const BLOCK_SIZE2_SHIFT: Field = Field::new(34, 4);
    /// log2 of the outer block stride in words, minus one.
    pub const STRIDE2_SHIFT: Field = Field::new(38, 4);
}

/// Monitor slot opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CrmCommand {
    /// Initialize `CRM_DATA` from the scanned registers. Also the cleared-slot value.
    #[default]
    Initialize = 0,
    /// Copy scanned registers into `CRM_DATA`.
    Copy = 1,
    /// Interrupt when a counter advances faster than `param` per period.
    CountRateTooFast = 2,
    /// Interrupt when a register differs from its `CRM_DATA` copy.
    MonitorChange = 3,
    /// Track the maximum value seen.
    SaveMax = 4,
    /// Interrupt when a counter advances slower than `param` per period.
    CountRateTooSlow = 5,
    /// Interrupt when a register is greater than or equal to `param`.
    CountGreaterOrEqual = 6,
    /// Interrupt when the XOR of all scanned words differs from `param`.
    Checksum = 7,
}

impl CrmCommand {
    /// Decode the 3-bit opcode field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Self::Initialize,
            1 => Self::Copy,
            2 => Self::CountRateTooFast,
            3 => Self::MonitorChange,
            4 => Self::SaveMax,
            5 => Self::CountRateTooSlow,
            6 => Self::CountGreaterOrEqual,
            _ => Self::Checksum,
        }
    }
}

/// One monitor slot's configuration, as written to the hardware records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrmMonitorConfig {
    /// Opcode.
    pub command: CrmCommand,
    /// `CRM_DATA` index used by stateful commands.
    pub data_index: u16,
    /// Outer repetitions of the base geometry.
    pub reg_count: u32,
    /// Registers scanned per repetition.
    pub entry_count: u32,
    /// Word address of the first register.
    pub base_address: u32,
    /// Register width in words, minus one.
    pub reg_size: u8,
    /// log2 of the inner block size, or [`SHIFT_UNUSED`].
    pub size1_shift: u8,
    /// Stored inner stride shift (physical stride `2^(s+1)`), or [`SHIFT_UNUSED`].
    pub stride1_shift: u8,
    /// log2 of the outer block size, or [`SHIFT_UNUSED`].
    pub size2_shift: u8,
    /// Stored outer stride shift, or [`SHIFT_UNUSED`].
    pub stride2_shift: u8,
    /// Command operand.
    pub param: u32,
}

impl Default for CrmMonitorConfig {
    /// An inert, cleared slot: every field zero.
    fn default() -> Self {
        Self::CLEARED
    }
}

impl CrmMonitorConfig {
    /// A cleared slot. Count zero makes it inert.
    pub const CLEARED: Self = Self {
        command: CrmCommand::Initialize,
        data_index: 0,
        reg_count: 0,
        entry_count: 0,
        base_address: 0,
        reg_size: 0,
        size1_shift: 0,
        stride1_shift: 0,
        size2_shift: 0,
        stride2_shift: 0,
        param: 0,
    };

    /// Registers the hardware scans per pass (`CRM_COMMAND.Count`).
    #[must_use]
    pub const fn scan_count(&self) -> u64 {
        self.entry_count as u64 * self.reg_count as u64
    }

    /// Words per scanned register.
    #[must_use]
    pub const fn words_per_register(&self) -> u32 {
        self.reg_size as u32 + 1
    }

    /// Pack into the two `CRM_COMMAND` words.
    #[must_use]
    pub fn command_words(&self) -> [u32; 2] {
        let mut reg = command::COMMAND.set(0, self.command as u64);
        reg = command::DATA_INDEX.set(reg, u64::from(self.data_index));
        reg = command::COUNT.set(reg, self.scan_count());
        split_words(reg)
    }

    /// Pack into the two `CRM_REGISTER` words.
    #[must_use]
    pub fn register_words(&self) -> [u32; 2] {
        let fields: [(Field, u64); 6] = [
            (register::BASE_ADDRESS, u64::from(self.base_address)),
            (register::SIZE, u64::from(self.reg_size)),
            (register::BLOCK_SIZE1_SHIFT, u64::from(self.size1_shift)),
            (register::STRIDE1_SHIFT, u64::from(self.stride1_shift)),
            (register::BLOCK_SIZE2_SHIFT, u64::from(self.size2_shift)),
            (register::STRIDE2_SHIFT, u64::from(self.stride2_shift)),
        ];
        split_words(fields.iter().fold(0, |reg, (f, v)| f.set(reg, *v)))
    }

    /// Decode a slot read back from hardware.
    ///
    /// The hardware keeps only the product of `entry_count` and `reg_count`,
    /// so the decoded record reports the whole count with `reg_count = 1`
    /// (zero for a cleared slot).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_words(command_words: [u32; 2], register_words: [u32; 2], param: u32) -> Self {
        let cmd = join_words(command_words[0], command_words[1]);
        let reg = join_words(register_words[0], register_words[1]);
        let count = command::COUNT.get(cmd) as u32;
        Self {
            command: CrmCommand::from_bits(command::COMMAND.get(cmd) as u8),
            data_index: command::DATA_INDEX.get(cmd) as u16,
            reg_count: u32::from(count != 0),
            entry_count: count,
            base_address: register::BASE_ADDRESS.get(reg) as u32,
            reg_size: register::SIZE.get(reg) as u8,
            size1_shift: register::BLOCK_SIZE1_SHIFT.get(reg) as u8,
            stride1_shift: register::STRIDE1_SHIFT.get(reg) as u8,
            size2_shift: register::BLOCK_SIZE2_SHIFT.get(reg) as u8,
            stride2_shift: register::STRIDE2_SHIFT.get(reg) as u8,
            param,
        }
    }

    /// Start address of every register the hardware visits in one pass, in
    /// scan order.
    ///
    /// Register `k` sits at position `k mod 2^size1` in its inner block; inner
    /// blocks are `2^(stride1+1)` words apart, and groups of `2^size2` inner
    /// blocks are `2^(stride2+1)` words apart.
    pub fn scan_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        let words = u64::from(self.words_per_register());
        let inner = self.inner_block();
        let outer = self.outer_block();
        let base = u64::from(self.base_address);
        (0..self.scan_count()).map(move |k| {
            let addr = match inner {
                None => base + k * words,
                Some((size1, stride1)) => {
                    let pos = k % size1;
                    let block = k / size1;
                    match outer {
                        None => base + block * stride1 + pos * words,
                        Some((size2, stride2)) => {
                            base + (block / size2) * stride2
                                + (block % size2) * stride1
                                + pos * words
                        }
                    }
                }
            };
            #[allow(clippy::cast_possible_truncation)]
            let addr = addr as u32;
            addr
        })
    }

    /// Inclusive word range covered by one pass, or `None` for an inert slot.
    #[must_use]
    pub fn footprint(&self) -> Option<(u32, u32)> {
        let words = self.words_per_register();
        self.scan_addresses().fold(None, |acc, a| {
            let last = a + words - 1;
            Some(match acc {
                None => (a, last),
                Some((lo, hi)) => (lo.min(a), hi.max(last)),
            })
        })
    }

    fn inner_block(&self) -> Option<(u64, u64)> {
        (self.size1_shift != SHIFT_UNUSED && self.stride1_shift != SHIFT_UNUSED)
            .then(|| (1u64 << self.size1_shift, 1u64 << (self.stride1_shift + 1)))
    }

    fn outer_block(&self) -> Option<(u64, u64)> {
        (self.size2_shift != SHIFT_UNUSED && self.stride2_shift != SHIFT_UNUSED)
            .then(|| (1u64 << self.size2_shift, 1u64 << (self.stride2_shift + 1)))
    }
}
