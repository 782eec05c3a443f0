/// Configuration module for revlink.
///
/// Handles loading, validating, and providing default run parameters.
/// Values loaded here can be overridden per run from the command line.
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

// ── Default value functions ──────────────────────────────────────────

fn default_month_count() -> usize {
    12
}

fn default_max_alias_hops() -> usize {
    1
}

fn default_sample_begin() -> String {
    "2011-01-01T00:00:01Z".to_string()
}

fn default_sample_end() -> String {
    "2013-07-12T23:59:59Z".to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Number of monthly counts (M) carried by every time-series row.
    #[serde(default = "default_month_count")]
    pub month_count: usize,

    /// Alias edges followed from the target of a redirect request.
    #[serde(default = "default_max_alias_hops")]
    pub max_alias_hops: usize,

    #[serde(default)]
    pub sample: SampleConfig,
}

/// Revision sampling window, inclusive begin and exclusive end.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SampleConfig {
    #[serde(default = "default_sample_begin")]
    pub begin: String,

    #[serde(default = "default_sample_end")]
    pub end: String,
}

/// A resolved sampling window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin_ms: u64,
    pub end_ms: u64,
}

impl TimeWindow {
    #[must_use]
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms >= self.begin_ms && timestamp_ms < self.end_ms
    }
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            month_count: default_month_count(),
            max_alias_hops: default_max_alias_hops(),
            sample: SampleConfig::default(),
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            begin: default_sample_begin(),
            end: default_sample_end(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the default configuration. A file that exists
    /// but cannot be read or parsed is an error.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("{} not found, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;

        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in {}", config_path.display()))?;

        info!("Loaded configuration from {}", config_path.display());
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.month_count > 0, "month_count must be positive");
        anyhow::ensure!(self.max_alias_hops > 0, "max_alias_hops must be positive");
        let window = self.sample_window()?;
        anyhow::ensure!(
            window.begin_ms < window.end_ms,
            "sample.begin must precede sample.end"
        );
        Ok(())
    }

    /// Parse the sampling bounds into epoch milliseconds.
    pub fn sample_window(&self) -> Result<TimeWindow> {
        Ok(TimeWindow {
            begin_ms: parse_epoch_ms(&self.sample.begin)?,
            end_ms: parse_epoch_ms(&self.sample.end)?,
        })
    }
}

/// Parse an RFC 3339 timestamp into non-negative epoch milliseconds.
fn parse_epoch_ms(value: &str) -> Result<u64> {
    let ts = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid RFC 3339 timestamp: {value}"))?;
    u64::try_from(ts.timestamp_millis())
        .with_context(|| format!("timestamp before the epoch: {value}"))
}

// ── Tests ────────────────────────────────────────────────────────────
