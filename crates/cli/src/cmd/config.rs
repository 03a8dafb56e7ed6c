//! Configuration management command
//!
//! Provides CLI interface to view and edit system configuration.

use crate::system_config::{self, SystemConfig};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

const KEYS: &[&str] = &["sync.yield_interval", "sync.auto_accept", "watch.interval_ms"];

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path =
        system_config::config_file_path().context("Could not determine config file path")?;

    println!("{}", "System Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[sync]".yellow());
    println!(
        "  {} = {} {}",
        "yield_interval".cyan(),
        config.sync.yield_interval,
        if config.sync.yield_interval == 0 {
            "(yielding disabled)".dimmed().to_string()
        } else {
            format!("(every {} nodes)", config.sync.yield_interval)
                .dimmed()
                .to_string()
        }
    );
    println!("  {} = {}", "auto_accept".cyan(), config.sync.auto_accept);

    println!("\n{}", "[watch]".yellow());
    println!(
        "  {} = {} {}",
        "interval_ms".cyan(),
        config.watch.interval_ms,
        format!("({}ms)", config.watch.interval_ms).dimmed()
    );

    println!("\n{}", "Valid Ranges:".bold());
    println!("  yield_interval: 0 or 10-1,000,000 (0 = never yield)");
    println!("  interval_ms: 50-60,000");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = system_config::load()?;
    println!("{}", get_value(&config, key)?);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = system_config::load()?;
    set_value(&mut config, key, value)?;

    // Validate before saving
    config.validate().context("Invalid configuration value")?;
    system_config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path =
        system_config::config_file_path().context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}

fn get_value(config: &SystemConfig, key: &str) -> Result<String> {
    let value = match key {
        "sync.yield_interval" => config.sync.yield_interval.to_string(),
        "sync.auto_accept" => config.sync.auto_accept.to_string(),
        "watch.interval_ms" => config.watch.interval_ms.to_string(),
        _ => unknown_key(key)?,
    };
    Ok(value)
}

fn set_value(config: &mut SystemConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "sync.yield_interval" => {
            config.sync.yield_interval = value
                .parse()
                .context("Invalid value: must be a non-negative integer")?;
        }
        "sync.auto_accept" => {
            config.sync.auto_accept = value
                .parse()
                .context("Invalid value: must be 'true' or 'false'")?;
        }
        "watch.interval_ms" => {
            config.watch.interval_ms = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        _ => {
            unknown_key(key)?;
        }
    }
    Ok(())
}

fn unknown_key(key: &str) -> Result<String> {
    anyhow::bail!(
        "Unknown config key: {}. Available keys: {}",
        key,
        KEYS.join(", ")
    )
}
