//! System-wide configuration
//!
//! Stored as TOML in `<config_dir>/treesync/config.toml`. A missing file
//! means defaults. `TSYNC_CONFIG_DIR` overrides the directory.

use anyhow::{Context, Result};
use reconciler::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "TSYNC_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub sync: SyncConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// How often `tsync watch` checks the virtual snapshot
    pub interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

impl SystemConfig {
    /// Check every value is within its supported range
    pub fn validate(&self) -> Result<()> {
        if self.sync.yield_interval != 0
            && !(10..=1_000_000).contains(&self.sync.yield_interval)
        {
            anyhow::bail!(
                "sync.yield_interval must be 0 (disabled) or 10-1,000,000, got {}",
                self.sync.yield_interval
            );
        }
        if !(50..=60_000).contains(&self.watch.interval_ms) {
            anyhow::bail!(
                "watch.interval_ms must be 50-60,000, got {}",
                self.watch.interval_ms
            );
        }
        Ok(())
    }
}

/// Directory holding the config file
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|dir| dir.join("treesync"))
}

pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Load the config, falling back to defaults when no file exists
pub fn load() -> Result<SystemConfig> {
    let Some(path) = config_file_path() else {
        return Ok(SystemConfig::default());
    };
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

pub fn save(config: &SystemConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Write the default config if no file exists yet
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config file path")?;
    if !path.exists() {
        save(&SystemConfig::default())?;
    }
    Ok(path)
}

pub fn example_config() -> String {
    r#"# treesync configuration

[sync]
# Nodes processed between cooperative yields (0 disables yielding)
yield_interval = 1000
# Apply patches without asking for confirmation
auto_accept = false

[watch]
# How often `tsync watch` checks the virtual snapshot, in milliseconds
interval_ms = 500
"#
    .to_string()
}
