//! Application configuration.
//!
//! Keys keep the names the quoting parameters have always had
//! (`Ex_Market1`, `starttmAdd`, `VolumeStacking`, ...). Required keys are
//! checked on the raw TOML table first so that a config missing several of
//! them is reported in one error.

use std::collections::HashMap;
use std::time::Duration;

use midspread_core::{Balances, MarketPair, Size, TickSize};
use midspread_executor::{OrderTiming, DEFAULT_PUBLIC_URL};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Keys that must be present in every config file.
pub const REQUIRED_KEYS: &[&str] = &[
    "Ex_Market1",
    "Ex_Market2",
    "min_increment",
    "dust",
    "volume",
    "odepth",
    "starttmAdd",
    "expiretmAdd",
    "price_change",
    "local_defense",
    "reload_time",
    "deep_reload_counter",
    "shallow_depth",
];

/// Paper venue settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Starting holdings by account symbol (e.g. `XXBT = "1.5"`).
    #[serde(default)]
    pub balances: HashMap<String, Decimal>,
}

impl PaperConfig {
    pub fn balances(&self) -> Balances {
        self.balances
            .iter()
            .map(|(symbol, volume)| (symbol.clone(), Size::new(*volume)))
            .collect()
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log the Prometheus text exposition on shutdown.
    #[serde(default = "default_true")]
    pub log_metrics_on_exit: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_metrics_on_exit: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base asset (volume side), e.g. `XETH`.
    #[serde(rename = "Ex_Market1")]
    pub market1: String,

    /// Quote asset (price side), e.g. `ZEUR`.
    #[serde(rename = "Ex_Market2")]
    pub market2: String,

    /// Minimum price increment; also fixes rounding precision.
    pub min_increment: Decimal,

    /// Book levels smaller than `dust * tier volume` are ignored.
    pub dust: Decimal,

    /// Total quoted volume per side.
    pub volume: Decimal,

    /// Depth of the per-cycle book fetch.
    pub odepth: u32,

    /// Order start offset in seconds.
    #[serde(rename = "starttmAdd")]
    pub start_offset_secs: u64,

    /// Order expiry offset in seconds, scaled per tier.
    #[serde(rename = "expiretmAdd")]
    pub expire_offset_secs: u64,

    /// Price guard tolerance (relative).
    pub price_change: Decimal,

    /// Defensive lean strength.
    pub local_defense: Decimal,

    /// Lean feed reload interval in seconds.
    pub reload_time: u64,

    /// Shallow dispatches between two full dispatches.
    pub deep_reload_counter: u32,

    /// Tiers re-quoted in a shallow dispatch.
    pub shallow_depth: usize,

    /// Distribution file path, or `"None"` for a static stack.
    #[serde(rename = "VolumeStacking", default)]
    pub volume_stacking: Option<String>,

    /// Lean feed file.
    #[serde(default = "default_lean_feed")]
    pub lean_feed: String,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Pause between successful cycles.
    #[serde(default = "default_cycle_sleep_ms")]
    pub cycle_sleep_ms: u64,

    /// Pause before restarting a failed cycle.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Number of pooled exchange connections.
    #[serde(default = "default_connections")]
    pub connections: usize,

    #[serde(default = "default_public_url")]
    pub public_url: String,

    #[serde(default)]
    pub paper: PaperConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_true() -> bool {
    true
}

fn default_lean_feed() -> String {
    "config/lean.json".to_string()
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_cycle_sleep_ms() -> u64 {
    1_000
}

fn default_restart_delay_ms() -> u64 {
    2_000
}

fn default_connections() -> usize {
    1
}

fn default_public_url() -> String {
    DEFAULT_PUBLIC_URL.to_string()
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse, check required keys and validate.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !table.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "Missing required keys: {}",
                missing.join(", ")
            )));
        }

        let config: Self = toml::Value::Table(table)
            .try_into()
            .map_err(|e| AppError::Config(format!("Invalid config value: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        self.pair()?;
        self.tick()?;

        let checks: [(bool, &str); 10] = [
            (self.volume > Decimal::ZERO, "volume must be positive"),
            (!self.dust.is_sign_negative(), "dust must not be negative"),
            (self.odepth > 0, "odepth must be at least 1"),
            (
                self.price_change > Decimal::ZERO && self.price_change < Decimal::ONE,
                "price_change must be in (0, 1)",
            ),
            (
                !self.local_defense.is_sign_negative(),
                "local_defense must not be negative",
            ),
            (self.reload_time > 0, "reload_time must be positive"),
            (self.shallow_depth > 0, "shallow_depth must be at least 1"),
            (self.connections > 0, "connections must be at least 1"),
            (self.call_timeout_ms > 0, "call_timeout_ms must be positive"),
            (
                self.expire_offset_secs > 0,
                "expiretmAdd must be positive",
            ),
        ];
        for (ok, message) in checks {
            if !ok {
                return Err(AppError::Config(message.to_string()));
            }
        }
        Ok(())
    }

    pub fn pair(&self) -> AppResult<MarketPair> {
        MarketPair::try_new(&self.market1, &self.market2)
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn tick(&self) -> AppResult<TickSize> {
        TickSize::from_increment(self.min_increment).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Distribution file, if the stack is not static.
    pub fn stacking_path(&self) -> Option<&str> {
        match self.volume_stacking.as_deref().map(str::trim) {
            None | Some("") | Some("None") => None,
            Some(path) => Some(path),
        }
    }

    pub fn timing(&self) -> OrderTiming {
        OrderTiming {
            start_offset_secs: self.start_offset_secs,
            expire_offset_secs: self.expire_offset_secs,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_time)
    }
}
