//! Configuration management for Zero services.
//!
//! All Zero services share a unified configuration file at `~/.codecoder/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (ZERO_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ZERO_LOG_LEVEL` → observability.log_level
//! - `ZERO_LOG_FORMAT` → observability.log_format
//! - `ZERO_SCREENER_REGIME` → screener.regime
//! - `ZERO_SCREENER_DB` → screener.db_path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".codecoder"),
            |dirs| dirs.home_dir().join(".codecoder"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Root configuration structure for Zero services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Screener configuration
    #[serde(default)]
    pub screener: Option<ScreenerSection>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("ZERO_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("ZERO_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Ok(regime) = std::env::var("ZERO_SCREENER_REGIME") {
            if let Ok(r) = regime.trim().parse() {
                self.screener.get_or_insert_with(Default::default).regime = Some(r);
            }
        }
        if let Ok(db) = std::env::var("ZERO_SCREENER_DB") {
            self.screener.get_or_insert_with(Default::default).db_path = Some(db);
        }
    }

    /// Screener section, or an empty one when not configured.
    pub fn screener_section(&self) -> ScreenerSection {
        self.screener.clone().unwrap_or_default()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Aliases: "level" for backward compatibility with existing config files
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    /// Aliases: "format" for backward compatibility with existing config files
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to clamp to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Screener service configuration.
///
/// Every field is optional; the screener crate resolves missing values
/// against the active regime profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScreenerSection {
    /// Market regime id (0 = bear, 1 = sideways, 2 = bull)
    #[serde(default)]
    pub regime: Option<i64>,

    /// Number of ranked candidates kept for the intraday pass
    #[serde(default)]
    pub candidate_pool: Option<usize>,

    /// Maximum number of names in the final selection
    #[serde(default)]
    pub output_size: Option<usize>,

    /// Tier-1 count at which the selection is restricted to tier 1
    #[serde(default)]
    pub tier1_quorum: Option<usize>,

    /// Run the intraday structure check on the selection
    #[serde(default)]
    pub intraday_enabled: Option<bool>,

    /// Path to the SQLite market data store
    #[serde(default)]
    pub db_path: Option<String>,
}
