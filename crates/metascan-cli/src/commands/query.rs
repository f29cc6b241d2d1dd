//! Query command implementation.

use std::path::Path;

use anyhow::Result;
use metascan_ops::{scanner_by_name, ScanSettings, Store};

use super::load_store;

/// How a key is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Values stored directly under the key.
    Direct,
    /// Values reachable from the key.
    Transitive,
    /// Keys that hold the given value.
    Reverse,
}

impl QueryMode {
    pub fn from_flags(transitive: bool, reverse: bool) -> Self {
        if reverse {
            QueryMode::Reverse
        } else if transitive {
            QueryMode::Transitive
        } else {
            QueryMode::Direct
        }
    }
}

/// Name of the index to read: the stored one, or a reference scanner that
/// simply emitted nothing.
fn resolve_index_name(store: &Store, requested: &str) -> Option<String> {
    if store.index(requested).is_some() {
        return Some(requested.to_string());
    }
    scanner_by_name(requested).map(|scanner| scanner.name().to_string())
}

/// Print one result per line, sorted.
pub fn execute(
    settings: &ScanSettings,
    file: &Path,
    format: Option<&str>,
    scanner: &str,
    key: &str,
    mode: QueryMode,
) -> Result<()> {
    let store = load_store(settings, file, format)?;
    let Some(index) = resolve_index_name(&store, scanner) else {
        let known: Vec<&str> = store.scanners().collect();
        anyhow::bail!(
            "Index {} not found in {} (available: {})",
            scanner,
            file.display(),
            known.join(", ")
        );
    };

    let results = match mode {
        QueryMode::Direct => store.get(&index, key),
        QueryMode::Transitive => store.get_transitive_closure(&index, key),
        QueryMode::Reverse => store.keys_for(&index, key),
    };

    for value in results {
        println!("{}", value);
    }
    Ok(())
}
