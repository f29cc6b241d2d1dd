//! Scan results: the merged store plus recoverable diagnostics.

use std::fmt;

use metascan_core::{InputLocation, Store};
use serde::{Deserialize, Serialize};

/// Category of a recovered failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An input location could not be read; it contributed nothing.
    InputUnreadable,
    /// An entry inside a readable input could not be decoded; the rest of
    /// the input was scanned.
    EntrySkipped,
    /// A scanner failed on one class; only that contribution was dropped.
    ScannerExecution,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::InputUnreadable => write!(f, "input-unreadable"),
            DiagnosticKind::EntrySkipped => write!(f, "entry-skipped"),
            DiagnosticKind::ScannerExecution => write!(f, "scanner-execution"),
        }
    }
}

/// A recoverable failure recorded during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Location being processed when the failure happened.
    pub location: InputLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn input_unreadable(location: &InputLocation, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::InputUnreadable,
            location: location.clone(),
            scanner: None,
            class_name: None,
            message: message.into(),
        }
    }

    pub fn entry_skipped(
        location: &InputLocation,
        origin: impl fmt::Display,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            kind: DiagnosticKind::EntrySkipped,
            location: location.clone(),
            scanner: None,
            class_name: None,
            message: format!("{}: {}", origin, reason),
        }
    }

    pub fn scanner_execution(
        location: &InputLocation,
        scanner: impl Into<String>,
        class_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::ScannerExecution,
            location: location.clone(),
            scanner: Some(scanner.into()),
            class_name: Some(class_name.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.location)?;
        if let Some(scanner) = &self.scanner {
            write!(f, " scanner={}", scanner)?;
        }
        if let Some(class_name) = &self.class_name {
            write!(f, " class={}", class_name)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Counters gathered while scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Input locations processed (including unreadable ones).
    pub inputs: usize,
    /// Class descriptors produced by the adapter.
    pub classes: usize,
    /// Entries accepted into the store, before deduplication.
    pub entries: usize,
    /// Entries dropped by a scanner result filter or the input filter.
    pub filtered: usize,
}

impl ScanStats {
    pub(crate) fn absorb(&mut self, other: ScanStats) {
        self.inputs += other.inputs;
        self.classes += other.classes;
        self.entries += other.entries;
        self.filtered += other.filtered;
    }
}

/// Output of [`crate::ScanOrchestrator::scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// The merged store, owned by the caller from here on.
    pub store: Store,
    /// Recovered failures, in input order.
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
}

impl ScanOutcome {
    /// Whether every input and scanner completed without recovered failures.
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics of one kind.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_store(self) -> Store {
        self.store
    }
}
