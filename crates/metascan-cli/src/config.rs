//! Settings loading for the CLI.
//!
//! The user settings file lives in the platform config directory unless
//! `--settings` (or `METASCAN_SETTINGS`) points elsewhere.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metascan_ops::ScanSettings;

/// Resolve the settings file in effect.
pub fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(ScanSettings::config_file_path)
}

/// Load settings from `.env`, the settings file and `METASCAN_*` variables.
pub fn load(explicit: Option<&Path>) -> Result<ScanSettings> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    match explicit {
        Some(path) => {
            let settings = if path.exists() {
                ScanSettings::load_from(path)
                    .with_context(|| format!("Failed to load settings from {}", path.display()))?
            } else {
                ScanSettings::default()
            };
            settings
                .with_overrides(|name| std::env::var(name).ok())
                .context("Invalid METASCAN_* environment override")
        }
        None => ScanSettings::load().context("Failed to load settings"),
    }
}

/// Persist settings to the file they were loaded from.
pub fn save(settings: &ScanSettings, explicit: Option<&Path>) -> Result<()> {
    match explicit {
        Some(path) => settings
            .save_to(path)
            .with_context(|| format!("Failed to write settings to {}", path.display())),
        None => settings.save().context("Failed to write settings"),
    }
}
