//! Register map for the FM10000 switch.
//!
//! All addresses are **32-bit word addresses** as seen on the management
//! bus. Multi-word registers occupy consecutive word addresses, least
//! significant word first. Table geometry is given as entry counts and
//! per-entry strides in words.
//!
//! ```text
//! 0x0E0000  EPL_LANE_CFG       9 EPLs × 4 lanes, 1 word
//! 0x0F0000  CRM block          monitor table, control, interrupts
//! 0xC00000  FFU_SLICE_TCAM     32 slices × 1024 entries, 4 words
//! 0xC02000  FFU_SLICE_SRAM     32 slices × 1024 entries, 2 words
//! 0xC80000  FFU_MASTER_VALID   scalar, 2 words
//! 0xCE0000  GLORT_CAM          256 entries, 1 word
//! 0xCE0200  GLORT_RAM          256 entries, 2 words
//! 0xCF0000  PARSER_PORT_CFG_1  48 ports, 2 words
//! 0xD40000  INGRESS_VID_TABLE  4096 entries, 3 words padded to 4
//! 0xD50000  EGRESS_VID_TABLE   4096 entries, 2 words
//! ```

// ── Ports and lanes ──────────────────────────────────────────────────────────

/// EPL (Ethernet port logic) block count.
pub const EPL_COUNT: u32 = 9;
/// Lanes per EPL.
pub const LANES_PER_EPL: u32 = 4;
/// Logical ports configured through the parser.
pub const PORT_COUNT: u32 = 48;

/// Per-lane configuration, `EPL_LANE_CFG(epl, lane)`.
pub const EPL_LANE_CFG_BASE: u32 = 0x0E_0000;
/// Word stride between lanes.
pub const EPL_LANE_CFG_LANE_STRIDE: u32 = 0x80;
/// Word stride between EPLs.
pub const EPL_LANE_CFG_EPL_STRIDE: u32 = 0x400;

/// Per-port parser configuration, `PARSER_PORT_CFG_1(port)`.
pub const PARSER_PORT_CFG_1_BASE: u32 = 0xCF_0000;
/// Words per entry.
pub const PARSER_PORT_CFG_1_WIDTH: u32 = 2;

// ── FFU (ACL) tables ─────────────────────────────────────────────────────────

/// Number of FFU slices. Each slice has its own TCAM and action SRAM.
pub const FFU_SLICE_COUNT: u32 = 32;
/// Entries per slice TCAM/SRAM.
pub const FFU_SLICE_ENTRIES: u32 = 1024;
/// Word stride between consecutive slices.
pub const FFU_SLICE_STRIDE: u32 = 0x4000;

/// `FFU_SLICE_TCAM(slice, entry)` base.
pub const FFU_SLICE_TCAM_BASE: u32 = 0xC0_0000;
/// Words per TCAM entry (key, key-invert, key-top pair).
pub const FFU_SLICE_TCAM_WIDTH: u32 = 4;

/// `FFU_SLICE_SRAM(slice, entry)` base.
pub const FFU_SLICE_SRAM_BASE: u32 = 0xC0_2000;
/// Words per action SRAM entry.
pub const FFU_SLICE_SRAM_WIDTH: u32 = 2;

/// Global slice-valid bitmap (two words).
pub const FFU_MASTER_VALID: u32 = 0xC8_0000;

/// Address of `FFU_SLICE_TCAM(slice, entry)` word 0.
#[must_use]
pub const fn ffu_slice_tcam(slice: u32, entry: u32) -> u32 {
    FFU_SLICE_TCAM_BASE + slice * FFU_SLICE_STRIDE + entry * FFU_SLICE_TCAM_WIDTH
}

// ── GLORT tables ─────────────────────────────────────────────────────────────

/// Global resource tag CAM entries.
pub const GLORT_CAM_ENTRIES: u32 = 256;
/// `GLORT_CAM(entry)` base. One word: Key[15:0], KeyInvert[31:16].
pub const GLORT_CAM_BASE: u32 = 0xCE_0000;
/// `GLORT_RAM(entry)` base.
pub const GLORT_RAM_BASE: u32 = 0xCE_0200;
/// Words per GLORT RAM entry.
pub const GLORT_RAM_WIDTH: u32 = 2;

// ── VLAN tables ──────────────────────────────────────────────────────────────

/// VLAN IDs.
pub const VLAN_COUNT: u32 = 4096;
/// `INGRESS_VID_TABLE(vid)` base. Three words, padded to a four-word stride.
pub const INGRESS_VID_TABLE_BASE: u32 = 0xD4_0000;
/// Logical words per ingress VID entry.
pub const INGRESS_VID_TABLE_WIDTH: u32 = 3;
/// Physical stride of ingress VID entries.
pub const INGRESS_VID_TABLE_STRIDE: u32 = 4;
/// `EGRESS_VID_TABLE(vid)` base.
pub const EGRESS_VID_TABLE_BASE: u32 = 0xD5_0000;
/// Words per egress VID entry.
pub const EGRESS_VID_TABLE_WIDTH: u32 = 2;

// ── CRM block ────────────────────────────────────────────────────────────────

/// CRM register block base.
pub const CRM_BASE: u32 = 0x0F_0000;

/// Hardware monitor slots (`CRM_COMMAND` entries).
pub const CRM_SLOT_COUNT: u32 = 64;

/// Slot holding the GLORT CAM checksum rule; slots below it hold one
/// per-slice FFU TCAM checksum each.
pub const CRM_GLORT_CAM_SLOT: u32 = FFU_SLICE_COUNT;

/// `CRM_DATA(index)` scratch table base (two words per entry).
pub const CRM_DATA_BASE: u32 = CRM_BASE;
/// `CRM_DATA` entries.
pub const CRM_DATA_ENTRIES: u32 = 1024;

/// Engine control register.
pub const CRM_CTRL: u32 = CRM_BASE + 0x0800;
/// Engine status register.
pub const CRM_STATUS: u32 = CRM_BASE + 0x0801;
/// Free-running scan timer (two words).
pub const CRM_TIME: u32 = CRM_BASE + 0x0802;
/// Interrupt pending, one bit per slot (two words, write 1 to clear).
pub const CRM_IP: u32 = CRM_BASE + 0x0804;
/// Interrupt mask, one bit per slot (two words, 1 = masked).
pub const CRM_IM: u32 = CRM_BASE + 0x0806;

/// `CRM_COMMAND(slot)` base (two words per slot).
pub const CRM_COMMAND_BASE: u32 = CRM_BASE + 0x1000;
/// `CRM_REGISTER(slot)` base (two words per slot).
pub const CRM_REGISTER_BASE: u32 = CRM_BASE + 0x1080;
/// `CRM_PERIOD(slot)` base (two words per slot).
pub const CRM_PERIOD_BASE: u32 = CRM_BASE + 0x1100;
/// `CRM_PARAM(slot)` base (one word per slot).
pub const CRM_PARAM_BASE: u32 = CRM_BASE + 0x1180;

/// Address of `CRM_COMMAND(slot)` word 0.
#[must_use]
pub const fn crm_command(slot: u32) -> u32 {
    CRM_COMMAND_BASE + 2 * slot
}

/// Address of `CRM_REGISTER(slot)` word 0.
#[must_use]
pub const fn crm_register(slot: u32) -> u32 {
    CRM_REGISTER_BASE + 2 * slot
}

/// Address of `CRM_PERIOD(slot)` word 0.
#[must_use]
pub const fn crm_period(slot: u32) -> u32 {
    CRM_PERIOD_BASE + 2 * slot
}

/// Address of `CRM_PARAM(slot)`.
#[must_use]
pub const fn crm_param(slot: u32) -> u32 {
    CRM_PARAM_BASE + slot
}

/// `CRM_CTRL` field definitions.
pub mod crm_ctrl {
    use crate::bits::Field;

    /// Start the engine.
    pub const RUN: Field = Field::new(0, 1);
    /// Restart from `FIRST_COMMAND_INDEX` after the last slot (continuous run).
    pub const REPEAT: Field = Field::new(1, 1);
    /// First slot executed in a pass.
    pub const FIRST_COMMAND_INDEX: Field = Field::new(2, 6);
    /// Last slot executed in a pass.
    pub const LAST_COMMAND_INDEX: Field = Field::new(8, 6);
}

/// `CRM_STATUS` field definitions.
pub mod crm_status {
    use crate::bits::Field;

    /// Engine is scanning.
    pub const RUNNING: Field = Field::new(0, 1);
    /// Slot currently executing; software seeds it before a run.
    pub const COMMAND_INDEX: Field = Field::new(1, 6);
}
