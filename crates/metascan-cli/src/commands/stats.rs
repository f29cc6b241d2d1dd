//! Stats command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use humansize::{format_size, DECIMAL};
use metascan_ops::ScanSettings;

use super::{load_store, resolve_format};

/// Print per-index counts for a saved index file.
pub fn execute(settings: &ScanSettings, file: &Path, format: Option<&str>) -> Result<()> {
    let kind = resolve_format(settings, file, format)?;
    let store = load_store(settings, file, Some(kind.as_str()))?;
    let size = std::fs::metadata(file)
        .with_context(|| format!("Failed to stat {}", file.display()))?
        .len();

    println!("Metascan Index");
    println!("{:-<40}", "");
    println!("File:     {}", file.display());
    println!("Format:   {}", kind);
    println!("Size:     {}", format_size(size, DECIMAL));
    println!();

    for (scanner, index) in store.iter() {
        println!("{}", scanner);
        println!("  keys:   {}", index.len());
        println!("  values: {}", index.value_count());
    }

    println!();
    println!(
        "Total:    {} keys, {} values",
        store.key_count(),
        store.value_count()
    );
    Ok(())
}
