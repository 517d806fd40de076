//! Silicon model for the FM10000 multi-port switch.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the parts of the chip the control plane mirrors and
//! monitors: word addresses of the cached register tables, the CRM
//! (consistency/rate monitor) register block and its bit-exact record layout,
//! and the address sequence the CRM walks for an encoded monitor record.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`bits`] | `Field` helper for packing/unpacking bit ranges |
//! | [`regs`] | Word-address register map and table geometry constants |
//! | [`crm`] | CRM opcodes, `CrmMonitorConfig`, record packing, scan model |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bits;
pub mod crm;
pub mod regs;
