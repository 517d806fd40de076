//! Switch bring-up and cache configuration
//!
//! Defaults suit production bring-up: reads served from the shadow, every
//! write pushed to hardware immediately, shadows seeded from hardware, and
//! CRM checksums computed at init. Environment overrides let lab setups
//! trade accuracy for bring-up time without a rebuild.

use crate::error::{Result, SwitchError};
use tracing::debug;

/// Where single-entry reads are served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read hardware on every access and refresh the shadow
    Live,
    /// Serve reads from the shadow
    #[default]
    Fast,
}

impl std::str::FromStr for CacheMode {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "fast" | "shadow" => Ok(Self::Fast),
            other => Err(SwitchError::invalid_argument(format!(
                "unknown cache mode {other:?} (expected live or fast)"
            ))),
        }
    }
}

/// Switch configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchConfig {
    /// Read path for single-entry reads
    pub cache_mode: CacheMode,

    /// Hold non-forced writes in the shadow until `flush_deferred`
    pub defer_writes: bool,

    /// Seed shadows from default-value generators instead of hardware reads
    pub fast_bringup: bool,

    /// Compute CRM checksum parameters from hardware at monitor-table init
    pub crm_set_checksums: bool,

    /// Enable all populated CRM slots and start a continuous scan at init
    pub crm_autostart: bool,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Fast,
            defer_writes: false,
            fast_bringup: false,
            crm_set_checksums: true,
            crm_autostart: false,
        }
    }
}

impl SwitchConfig {
    /// Configuration from defaults overridden by `FM10K_*` environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `FM10K_CACHE_MODE` | `cache_mode` (`live` / `fast`) |
    /// | `FM10K_DEFER_WRITES` | `defer_writes` |
    /// | `FM10K_FAST_BRINGUP` | `fast_bringup` |
    /// | `FM10K_CRM_CHECKSUMS` | `crm_set_checksums` |
    /// | `FM10K_CRM_AUTOSTART` | `crm_autostart` |
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unparseable value.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Ok(mode) = std::env::var("FM10K_CACHE_MODE") {
            cfg.cache_mode = mode.parse()?;
        }
        if let Some(v) = env_flag("FM10K_DEFER_WRITES")? {
            cfg.defer_writes = v;
        }
        if let Some(v) = env_flag("FM10K_FAST_BRINGUP")? {
            cfg.fast_bringup = v;
        }
        if let Some(v) = env_flag("FM10K_CRM_CHECKSUMS")? {
            cfg.crm_set_checksums = v;
        }
        if let Some(v) = env_flag("FM10K_CRM_AUTOSTART")? {
            cfg.crm_autostart = v;
        }
        debug!("Switch config from environment: {cfg:?}");
        Ok(cfg)
    }

    /// Fastest bring-up for simulation: defaults instead of reads, no init checksums
    pub const fn simulation() -> Self {
        Self {
            cache_mode: CacheMode::Fast,
            defer_writes: false,
            fast_bringup: true,
            crm_set_checksums: false,
            crm_autostart: false,
        }
    }

    /// Set the read path
    #[must_use]
    pub const fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Enable or disable write deferral
    #[must_use]
    pub const fn with_defer_writes(mut self, on: bool) -> Self {
        self.defer_writes = on;
        self
    }

    /// Enable or disable default-value bring-up
    #[must_use]
    pub const fn with_fast_bringup(mut self, on: bool) -> Self {
        self.fast_bringup = on;
        self
    }

    /// Enable or disable checksum computation at monitor-table init
    #[must_use]
    pub const fn with_crm_checksums(mut self, on: bool) -> Self {
        self.crm_set_checksums = on;
        self
    }

    /// Enable or disable CRM autostart
    #[must_use]
    pub const fn with_crm_autostart(mut self, on: bool) -> Self {
        self.crm_autostart = on;
        self
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    parse_flag(&raw)
        .map(Some)
        .ok_or_else(|| SwitchError::invalid_argument(format!("{name}={raw:?} is not a boolean")))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
