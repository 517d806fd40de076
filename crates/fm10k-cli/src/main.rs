//! `fm10k`: register cache and CRM debugging for FM10000 switches.
//!
//! ```text
//! USAGE:
//!   fm10k regsets                         List shadowed register sets
//!   fm10k encode <base> <words> ...       Encode a geometry as a CRM slot
//!   fm10k simulate [--corrupt]            End-to-end CRM run on the software model
//!   fm10k crm status <pcie-addr>          CRM state, pending interrupts, slots
//!   fm10k crm start <pcie-addr>           Start a CRM scan (debug)
//!   fm10k crm stop <pcie-addr>            Stop the CRM (debug)
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fm10k_chip::crm::CrmCommand;
use fm10k_chip::regs;
use fm10k_driver::{
    init_config, select_bus, tables, BusSelection, CacheMode, CrmEngine, CrmGeometry, RegisterBus,
    SoftwareBus, Switch, SwitchConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fm10k", about = "FM10000 register cache and CRM CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List every shadowed register set and its CRM coverage.
    Regsets,
    /// Encode a register block geometry into CRM_COMMAND/CRM_REGISTER words.
    Encode {
        /// Word address of the first register (e.g. 0x200).
        #[arg(value_parser = parse_u32)]
        base: u32,
        /// 32-bit words per register.
        words: u32,
        /// Entry counts, innermost first (one to three values).
        #[arg(long, num_args = 1..=3, required = true, value_delimiter = ',')]
        sizes: Vec<u32>,
        /// Word strides, innermost first (one per size).
        #[arg(long, num_args = 1..=3, required = true, value_delimiter = ',', value_parser = parse_u32)]
        strides: Vec<u32>,
    },
    /// Bring up a simulated switch, start the CRM and run one scan pass.
    Simulate {
        #[command(flatten)]
        knobs: Knobs,
        /// Corrupt one GLORT CAM entry behind the cache's back before scanning.
        #[arg(long)]
        corrupt: bool,
    },
    /// Debug-only CRM control on a mapped device.
    Crm {
        #[command(subcommand)]
        action: CrmAction,
    },
}

#[derive(Subcommand)]
enum CrmAction {
    /// Show run state, interrupt mask/pending vectors and populated slots.
    Status {
        /// PCIe address (e.g. 0000:01:00.0).
        device: String,
    },
    /// Start scanning a slot range.
    Start {
        /// PCIe address (e.g. 0000:01:00.0).
        device: String,
        /// First slot.
        #[arg(long, default_value_t = 0)]
        first: u32,
        /// Last slot.
        #[arg(long, default_value_t = regs::CRM_GLORT_CAM_SLOT)]
        last: u32,
        /// Scan once instead of continuously.
        #[arg(long)]
        once: bool,
    },
    /// Stop scanning.
    Stop {
        /// PCIe address (e.g. 0000:01:00.0).
        device: String,
    },
}

/// Overrides on top of `FM10K_*` environment configuration.
#[derive(Args)]
struct Knobs {
    /// Cache read path: live or fast.
    #[arg(long)]
    cache_mode: Option<CacheMode>,
    /// Read every shadow from the model instead of evaluating defaults.
    #[arg(long)]
    hardware_bringup: bool,
    /// Hold non-forced writes until flushed.
    #[arg(long)]
    defer_writes: bool,
    /// Skip computing CRM checksum params at init.
    #[arg(long)]
    no_checksums: bool,
}

impl Knobs {
    fn config(&self) -> Result<SwitchConfig> {
        let mut cfg = SwitchConfig::from_env()?.with_fast_bringup(!self.hardware_bringup);
        if let Some(mode) = self.cache_mode {
            cfg = cfg.with_cache_mode(mode);
        }
        if self.defer_writes {
            cfg = cfg.with_defer_writes(true);
        }
        if self.no_checksums {
            cfg = cfg.with_crm_checksums(false);
        }
        Ok(cfg)
    }
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("{s:?}: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Regsets => cmd_regsets(),
        Cmd::Encode {
            base,
            words,
            sizes,
            strides,
        } => cmd_encode(base, words, &sizes, &strides)?,
        Cmd::Simulate { knobs, corrupt } => cmd_simulate(&knobs, corrupt)?,
        Cmd::Crm { action } => cmd_crm(action)?,
    }

    Ok(())
}

fn cmd_regsets() {
    let plan = tables::crm_monitor_plan();
    println!("{:<20} {:>10} {:>6} {:>12}  CRM", "Name", "Base", "Width", "Entries");
    for set in tables::REGISTER_SETS {
        let slots: Vec<String> = (0u32..)
            .zip(&plan)
            .filter(|(_, b)| b.set.base == set.base)
            .map(|(slot, _)| slot.to_string())
            .collect();
        let crm = match slots.as_slice() {
            [] => "-".to_string(),
            [one] => format!("slot {one}"),
            [first, .., last] => format!("slots {first}..={last}"),
        };
        println!(
            "{:<20} {:>#10x} {:>6} {:>12}  {crm}",
            set.name,
            set.base,
            set.width,
            set.entry_count()
        );
    }
}

fn cmd_encode(base: u32, words: u32, sizes: &[u32], strides: &[u32]) -> Result<()> {
    if sizes.len() != strides.len() {
        bail!("{} sizes but {} strides", sizes.len(), strides.len());
    }
    let mut g = CrmGeometry::one_d(words, 0, 0);
    g.sizes[..sizes.len()].copy_from_slice(sizes);
    g.strides[..strides.len()].copy_from_slice(strides);

    let cfg = init_config(CrmCommand::Checksum, base, &g)?;
    let [c0, c1] = cfg.command_words();
    let [r0, r1] = cfg.register_words();

    println!("Geometry     : {words} words, sizes {sizes:?}, strides {strides:?}");
    println!("Register size: {} (+1 words)", cfg.reg_size);
    println!("Count        : {}", cfg.scan_count());
    println!(
        "Shifts       : size1={:#x} stride1={:#x} size2={:#x} stride2={:#x}",
        cfg.size1_shift, cfg.stride1_shift, cfg.size2_shift, cfg.stride2_shift
    );
    if let Some((lo, hi)) = cfg.footprint() {
        println!("Footprint    : {lo:#08x}..={hi:#08x}");
    }
    println!("CRM_COMMAND  : {c1:08x}_{c0:08x}");
    println!("CRM_REGISTER : {r1:08x}_{r0:08x}");
    Ok(())
}

fn cmd_simulate(knobs: &Knobs, corrupt: bool) -> Result<()> {
    let bus = SoftwareBus::new();
    bus.power_on(&tables::REGISTER_SETS);

    let cfg = knobs.config()?.with_crm_autostart(true);
    println!("Config       : {cfg:?}");
    let sw = Switch::init(Box::new(bus.clone()), cfg).context("switch bring-up")?;

    {
        let mut regs = sw.lock();
        regs.write_and_resync(&tables::FFU_SLICE_TCAM, &[0, 0], &[0x0A0B_0C0D, 0, 0xFFFF, 0])?;
        regs.write_and_resync(&tables::GLORT_CAM, &[1], &[0x0000_1001])?;
        let flushed = regs.flush_deferred()?;
        if flushed > 0 {
            println!("Flushed      : {flushed} deferred writes");
        }
        println!("CRM          : {}", regs.crm_state());
    }

    if corrupt {
        let addr = tables::GLORT_CAM.address(&[200])?;
        bus.poke(addr, bus.peek(addr) ^ 0x0000_0100);
        println!("Corrupted    : GLORT_CAM[200] @ {addr:#08x}");
    }

    let raised = bus.scan_crm();
    let pending = sw.lock().crm_pending_interrupts()?;
    println!("Scan raised  : {raised:#018x}");
    println!("CRM_IP       : {pending:#018x}");

    let stats = bus.stats();
    println!("Bus traffic  : {} reads, {} writes", stats.reads, stats.writes);
    sw.shutdown()?;
    Ok(())
}

fn cmd_crm(action: CrmAction) -> Result<()> {
    let device = match &action {
        CrmAction::Status { device }
        | CrmAction::Start { device, .. }
        | CrmAction::Stop { device } => device.clone(),
    };
    let mut bus = select_bus(BusSelection::Mmio, &device)
        .with_context(|| format!("mapping switch registers of {device}"))?;
    let mut crm = CrmEngine::new(tables::crm_monitor_plan())?;
    let state = crm.refresh_state(bus.as_mut())?;
    info!(%device, bus = %bus.bus_type(), %state, "attached to CRM");

    match action {
        CrmAction::Status { .. } => crm_status(&crm, bus.as_mut())?,
        CrmAction::Start {
            first, last, once, ..
        } => {
            crm.start(bus.as_mut(), first, last, !once)?;
            println!("CRM running: slots {first}..={last}");
        }
        CrmAction::Stop { .. } => {
            crm.stop(bus.as_mut())?;
            println!("CRM stopped");
        }
    }
    Ok(())
}

fn crm_status(crm: &CrmEngine, bus: &mut dyn RegisterBus) -> Result<()> {
    println!("State        : {}", crm.state());
    println!("Enabled      : {:#018x}", crm.enabled_slots());
    println!("Pending      : {:#018x}", crm.pending_interrupts(bus)?);
    for slot in 0..regs::CRM_SLOT_COUNT {
        let cfg = crm.read_slot(bus, slot)?;
        if cfg.scan_count() == 0 {
            continue;
        }
        println!(
            "  slot {slot:>2}: {:?} {} x {} words @ {:#08x} param {:#010x}",
            cfg.command,
            cfg.scan_count(),
            cfg.words_per_register(),
            cfg.base_address,
            cfg.param
        );
    }
    Ok(())
}
