//! CLI command implementations.

pub mod config;
pub mod query;
pub mod scan;
pub mod stats;

use std::path::Path;

use anyhow::{Context, Result};
use metascan_ops::{ScanSettings, SerializerKind, Store};

/// Pick the serializer for `path`: explicit flag, then file extension, then settings.
pub fn resolve_format(
    settings: &ScanSettings,
    path: &Path,
    explicit: Option<&str>,
) -> Result<SerializerKind> {
    if let Some(format) = explicit {
        return Ok(format.parse()?);
    }
    match SerializerKind::from_path(path) {
        Some(kind) => Ok(kind),
        None => Ok(settings.serializer_kind()?),
    }
}

/// Load a saved index.
pub fn load_store(settings: &ScanSettings, path: &Path, format: Option<&str>) -> Result<Store> {
    let kind = resolve_format(settings, path, format)?;
    kind.serializer()
        .read(path)
        .with_context(|| format!("Failed to load index from {}", path.display()))
}
