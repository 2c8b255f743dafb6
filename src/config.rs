//! Configuration types for risk-ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Risk bounds passed into the calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Lowest accepted risk fraction per trade (0.005 = 0.5%)
    #[serde(default = "default_min_risk_pct")]
    pub min_risk_pct: Decimal,

    /// Highest accepted risk fraction per trade (0.06 = 6%)
    #[serde(default = "default_max_risk_pct")]
    pub max_risk_pct: Decimal,

    /// Smallest entry/stop distance that still counts as a real stop
    #[serde(default = "default_min_price_tick")]
    pub min_price_tick: Decimal,
}

fn default_min_risk_pct() -> Decimal {
    Decimal::new(5, 3) // 0.005
}
fn default_max_risk_pct() -> Decimal {
    Decimal::new(6, 2) // 0.06
}
fn default_min_price_tick() -> Decimal {
    Decimal::new(1, 8) // 0.00000001
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_risk_pct: default_min_risk_pct(),
            max_risk_pct: default_max_risk_pct(),
            min_price_tick: default_min_price_tick(),
        }
    }
}

/// Position store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Retries after an optimistic-lock conflict before giving up
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,
}

fn default_max_write_retries() -> u32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_write_retries: default_max_write_retries(),
        }
    }
}

/// Decision cycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Snapshots older than this are a protocol violation
    #[serde(default = "default_max_snapshot_age_secs")]
    pub max_snapshot_age_secs: u64,

    /// Fee rate charged by the paper exchange
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: Decimal,
}

fn default_max_snapshot_age_secs() -> u64 {
    30
}
fn default_paper_fee_rate() -> Decimal {
    Decimal::new(1, 3) // 0.1%
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_snapshot_age_secs: default_max_snapshot_age_secs(),
            paper_fee_rate: default_paper_fee_rate(),
        }
    }
}

/// Historical partition export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_dir")]
    pub output_dir: PathBuf,

    /// Records older than this many hours are archived
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./archive")
}
fn default_retention_hours() -> u64 {
    24
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: default_archive_dir(),
            retention_hours: default_retention_hours(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
