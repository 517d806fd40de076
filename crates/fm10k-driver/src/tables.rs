//! FM10000 register set table and CRM monitor plan
//!
//! Every table the control plane shadows is described once here. The CRM
//! monitor plan assigns one checksum slot per FFU slice TCAM and one to the
//! GLORT CAM, in slot order.

use crate::cache::{Dim, Dimensions, RegisterSet};
use crate::crm::MonitoredBlock;
use fm10k_chip::regs;

fn zero(_addr: u32) -> u32 {
    0
}

/// Key 0 with every key bit inverted: matches nothing
fn glort_cam_default(_addr: u32) -> u32 {
    0xFFFF_0000
}

/// Word 1 enables the parser on the port
fn parser_port_default(addr: u32) -> u32 {
    u32::from((addr - regs::PARSER_PORT_CFG_1_BASE) % regs::PARSER_PORT_CFG_1_WIDTH == 1)
}

/// Lane number in bits 1:0, lane powered down (bit 8)
fn epl_lane_default(addr: u32) -> u32 {
    let lane = (addr - regs::EPL_LANE_CFG_BASE) % regs::EPL_LANE_CFG_EPL_STRIDE / regs::EPL_LANE_CFG_LANE_STRIDE;
    0x100 | lane
}

/// `FFU_SLICE_TCAM[slice][entry]`
pub static FFU_SLICE_TCAM: RegisterSet = RegisterSet {
    name: "FFU_SLICE_TCAM",
    base: regs::FFU_SLICE_TCAM_BASE,
    width: regs::FFU_SLICE_TCAM_WIDTH,
    dims: Dimensions::TwoIndices(
        Dim::new(regs::FFU_SLICE_ENTRIES, regs::FFU_SLICE_TCAM_WIDTH),
        Dim::new(regs::FFU_SLICE_COUNT, regs::FFU_SLICE_STRIDE),
    ),
    cacheable: true,
    tracks_validity: true,
    default_value: None,
};

/// `FFU_SLICE_SRAM[slice][entry]`
pub static FFU_SLICE_SRAM: RegisterSet = RegisterSet {
    name: "FFU_SLICE_SRAM",
    base: regs::FFU_SLICE_SRAM_BASE,
    width: regs::FFU_SLICE_SRAM_WIDTH,
    dims: Dimensions::TwoIndices(
        Dim::new(regs::FFU_SLICE_ENTRIES, regs::FFU_SLICE_SRAM_WIDTH),
        Dim::new(regs::FFU_SLICE_COUNT, regs::FFU_SLICE_STRIDE),
    ),
    cacheable: false,
    tracks_validity: false,
    default_value: Some(zero),
};

/// `FFU_MASTER_VALID`
pub static FFU_MASTER_VALID: RegisterSet = RegisterSet {
    name: "FFU_MASTER_VALID",
    base: regs::FFU_MASTER_VALID,
    width: 2,
    dims: Dimensions::Scalar,
    cacheable: false,
    tracks_validity: false,
    default_value: Some(zero),
};

/// `GLORT_CAM[entry]`
pub static GLORT_CAM: RegisterSet = RegisterSet {
    name: "GLORT_CAM",
    base: regs::GLORT_CAM_BASE,
    width: 1,
    dims: Dimensions::OneIndex(Dim::new(regs::GLORT_CAM_ENTRIES, 1)),
    cacheable: true,
    tracks_validity: false,
    default_value: Some(glort_cam_default),
};

/// `GLORT_RAM[entry]`
pub static GLORT_RAM: RegisterSet = RegisterSet {
    name: "GLORT_RAM",
    base: regs::GLORT_RAM_BASE,
    width: regs::GLORT_RAM_WIDTH,
    dims: Dimensions::OneIndex(Dim::new(regs::GLORT_CAM_ENTRIES, regs::GLORT_RAM_WIDTH)),
    cacheable: false,
    tracks_validity: false,
    default_value: Some(zero),
};

/// `INGRESS_VID_TABLE[vid]`, no reset value: always read from hardware
pub static INGRESS_VID_TABLE: RegisterSet = RegisterSet {
    name: "INGRESS_VID_TABLE",
    base: regs::INGRESS_VID_TABLE_BASE,
    width: regs::INGRESS_VID_TABLE_WIDTH,
    dims: Dimensions::OneIndex(Dim::new(regs::VLAN_COUNT, regs::INGRESS_VID_TABLE_STRIDE)),
    cacheable: false,
    tracks_validity: false,
    default_value: None,
};

/// `EGRESS_VID_TABLE[vid]`
pub static EGRESS_VID_TABLE: RegisterSet = RegisterSet {
    name: "EGRESS_VID_TABLE",
    base: regs::EGRESS_VID_TABLE_BASE,
    width: regs::EGRESS_VID_TABLE_WIDTH,
    dims: Dimensions::OneIndex(Dim::new(regs::VLAN_COUNT, regs::EGRESS_VID_TABLE_WIDTH)),
    cacheable: false,
    tracks_validity: false,
    default_value: Some(zero),
};

/// `PARSER_PORT_CFG_1[port]`
pub static PARSER_PORT_CFG_1: RegisterSet = RegisterSet {
    name: "PARSER_PORT_CFG_1",
    base: regs::PARSER_PORT_CFG_1_BASE,
    width: regs::PARSER_PORT_CFG_1_WIDTH,
    dims: Dimensions::OneIndex(Dim::new(regs::PORT_COUNT, regs::PARSER_PORT_CFG_1_WIDTH)),
    cacheable: false,
    tracks_validity: false,
    default_value: Some(parser_port_default),
};

/// `EPL_LANE_CFG[epl][lane]`
pub static EPL_LANE_CFG: RegisterSet = RegisterSet {
    name: "EPL_LANE_CFG",
    base: regs::EPL_LANE_CFG_BASE,
    width: 1,
    dims: Dimensions::TwoIndices(
        Dim::new(regs::LANES_PER_EPL, regs::EPL_LANE_CFG_LANE_STRIDE),
        Dim::new(regs::EPL_COUNT, regs::EPL_LANE_CFG_EPL_STRIDE),
    ),
    cacheable: false,
    tracks_validity: false,
    default_value: Some(epl_lane_default),
};

/// Every shadowed register set, in bring-up order
pub static REGISTER_SETS: [&RegisterSet; 9] = [
    &EPL_LANE_CFG,
    &PARSER_PORT_CFG_1,
    &FFU_SLICE_TCAM,
    &FFU_SLICE_SRAM,
    &FFU_MASTER_VALID,
    &GLORT_CAM,
    &GLORT_RAM,
    &INGRESS_VID_TABLE,
    &EGRESS_VID_TABLE,
];

/// Look up a register set by name (case-insensitive)
pub fn find(name: &str) -> Option<&'static RegisterSet> {
    REGISTER_SETS.iter().copied().find(|s| s.name.eq_ignore_ascii_case(name))
}

/// CRM slot assignment: slot `s < 32` checksums TCAM slice `s`, slot 32 the GLORT CAM
pub fn crm_monitor_plan() -> Vec<MonitoredBlock> {
    (0..regs::FFU_SLICE_COUNT)
        .map(|slice| MonitoredBlock::slice(&FFU_SLICE_TCAM, slice))
        .chain(std::iter::once(MonitoredBlock::whole(&GLORT_CAM)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_descriptor_validates() {
        for set in REGISTER_SETS {
            set.validate().unwrap();
        }
    }

    #[test]
    fn register_sets_do_not_overlap() {
        let mut ranges: Vec<(u32, u32, &str)> = REGISTER_SETS
            .iter()
            .map(|s| {
                let lo = s.base;
                let hi = s.word_addresses().max().unwrap_or(lo);
                (lo, hi, s.name)
            })
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            // FFU TCAM and SRAM interleave per slice; check word sets instead
            if pair[0].1 >= pair[1].0 {
                let a = find(pair[0].2).unwrap();
                let b = find(pair[1].2).unwrap();
                let words: std::collections::BTreeSet<u32> = a.word_addresses().collect();
                assert!(b.word_addresses().all(|w| !words.contains(&w)), "{} / {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn plan_puts_glort_cam_after_slices() {
        let plan = crm_monitor_plan();
        assert_eq!(plan.len() as u32, regs::CRM_GLORT_CAM_SLOT + 1);
        assert_eq!(plan[5].outer, Some(5));
        assert_eq!(plan[regs::CRM_GLORT_CAM_SLOT as usize].set.name, "GLORT_CAM");
    }

    #[test]
    fn defaults_depend_on_address() {
        assert_eq!(epl_lane_default(EPL_LANE_CFG.address(&[3, 2]).unwrap()), 0x103);
        assert_eq!(parser_port_default(PARSER_PORT_CFG_1.address(&[7]).unwrap() + 1), 1);
        assert_eq!(find("glort_cam").map(|s| s.base), Some(regs::GLORT_CAM_BASE));
    }
}
