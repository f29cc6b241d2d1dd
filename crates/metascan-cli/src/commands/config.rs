//! Config command implementation.
//!
//! Manages persistent scan settings.

use std::path::Path;

use anyhow::Result;
use metascan_ops::{ScanSettings, KEYS};

use crate::config;

fn display(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Show current settings.
pub fn show(settings: &ScanSettings, explicit: Option<&Path>) -> Result<()> {
    println!("Metascan Settings");
    println!("{:-<40}", "");

    for key in KEYS {
        let value = settings.get(key).unwrap_or_default();
        println!("{:<10} {}", format!("{}:", key), display(&value));
    }

    if let Some(path) = config::settings_path(explicit) {
        println!("\nSettings file: {}", path.display());
    }

    Ok(())
}

/// Set a settings value and save.
pub fn set(
    settings: &mut ScanSettings,
    explicit: Option<&Path>,
    key: &str,
    value: &str,
) -> Result<()> {
    if !KEYS.contains(&key) {
        anyhow::bail!("Unknown settings key: {}. Valid keys: {}", key, KEYS.join(", "));
    }
    settings.set(key, value)?;
    config::save(settings, explicit)?;
    println!("Set {} to: {}", key, display(&settings.get(key).unwrap_or_default()));
    Ok(())
}

/// Get a settings value.
pub fn get(settings: &ScanSettings, key: &str) -> Result<()> {
    match settings.get(key) {
        Some(value) => println!("{}", display(&value)),
        None => anyhow::bail!("Unknown settings key: {}", key),
    }
    Ok(())
}

/// Reset settings to defaults and save.
pub fn reset(settings: &mut ScanSettings, explicit: Option<&Path>, key: Option<&str>) -> Result<()> {
    settings.reset(key)?;
    config::save(settings, explicit)?;
    match key {
        Some(key) => println!("Reset {} to default", key),
        None => println!("Settings reset to defaults"),
    }
    Ok(())
}
