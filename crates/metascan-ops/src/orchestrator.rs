//! ScanOrchestrator - runs a configured scan and persists its results.
//!
//! One work unit is one input location. Each unit produces a partial store
//! and its own diagnostics; partials are merged in configured input order
//! once every unit has finished, so the merged store (and its serialized
//! form) does not depend on how units were scheduled.

use std::path::Path;
use std::time::Instant;

use metascan_core::{ClassDescriptor, InputLocation, Store};
use tracing::{debug, debug_span, info, info_span};

use crate::config::Configuration;
use crate::error::{OpsError, OpsResult};
use crate::report::{Diagnostic, ScanOutcome, ScanStats};
use crate::serializer::Serializer;

/// Runs scans for one frozen [`Configuration`].
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    config: Configuration,
}

/// What a single input location contributed.
#[derive(Debug, Default)]
struct InputContribution {
    store: Store,
    diagnostics: Vec<Diagnostic>,
    stats: ScanStats,
}

impl ScanOrchestrator {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Scan every configured input location and merge the results.
    ///
    /// Unreadable inputs and failing scanners are recovered and reported as
    /// diagnostics. Only an unusable configuration fails the call.
    pub fn scan(&self) -> OpsResult<ScanOutcome> {
        let locations: Vec<&InputLocation> = self.config.locations().iter().collect();
        if locations.is_empty() {
            return Err(OpsError::configuration("no input locations configured"));
        }

        let strategy = self.config.strategy();
        let span = info_span!("scan", inputs = locations.len(), strategy = %strategy);
        let _guard = span.enter();
        let started = Instant::now();

        let contributions = strategy.run(&locations, |location| self.scan_input(location))?;

        let mut outcome = ScanOutcome::default();
        for contribution in contributions {
            outcome.store.merge(&contribution.store);
            outcome.diagnostics.extend(contribution.diagnostics);
            outcome.stats.absorb(contribution.stats);
        }

        info!(
            inputs = outcome.stats.inputs,
            classes = outcome.stats.classes,
            keys = outcome.store.key_count(),
            values = outcome.store.value_count(),
            diagnostics = outcome.diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan finished"
        );
        Ok(outcome)
    }

    fn scan_input(&self, location: &InputLocation) -> InputContribution {
        let span = debug_span!("input", location = %location);
        let _guard = span.enter();

        let mut contribution = InputContribution::default();
        contribution.stats.inputs = 1;

        let listing = match self.config.adapter().list_classes(location) {
            Ok(listing) => listing,
            Err(err) => {
                debug!(location = %location, error = %err, "Skipping unreadable input");
                contribution
                    .diagnostics
                    .push(Diagnostic::input_unreadable(location, err.to_string()));
                return contribution;
            }
        };

        for skipped in &listing.skipped {
            contribution.diagnostics.push(Diagnostic::entry_skipped(
                location,
                &skipped.origin,
                &skipped.reason,
            ));
        }

        contribution.stats.classes = listing.classes.len();
        for class in &listing.classes {
            self.scan_class(location, class, &mut contribution);
        }

        debug!(
            classes = contribution.stats.classes,
            entries = contribution.stats.entries,
            filtered = contribution.stats.filtered,
            "Scanned input"
        );
        contribution
    }

    fn scan_class(
        &self,
        location: &InputLocation,
        class: &ClassDescriptor,
        contribution: &mut InputContribution,
    ) {
        let filter = self.config.filter();
        if !filter.accepts(&class.name) {
            debug!(class = %class.name, "Class rejected by input filter");
            return;
        }

        for scanner in self.config.scanners() {
            let entries = match scanner.scan(class) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!(
                        scanner = scanner.name(),
                        class = %class.name,
                        error = %err,
                        "Scanner failed, dropping its contribution"
                    );
                    contribution.diagnostics.push(Diagnostic::scanner_execution(
                        location,
                        scanner.name(),
                        &class.name,
                        err.message,
                    ));
                    continue;
                }
            };

            for (key, value) in entries {
                let accepted = scanner.accepts_result(&key)
                    && (value == class.name || filter.accepts(&value));
                if accepted {
                    contribution.store.insert(scanner.name(), key, value);
                    contribution.stats.entries += 1;
                } else {
                    contribution.stats.filtered += 1;
                }
            }
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load a persisted store with the configured serializer.
    pub fn collect(&self, source: &Path) -> OpsResult<Store> {
        self.config.serializer().read(source)
    }

    /// Persist a store with the configured serializer.
    pub fn save(&self, store: &Store, destination: &Path) -> OpsResult<()> {
        self.save_with(store, destination, self.config.serializer().as_ref())
    }

    /// Persist a store with an explicit serializer.
    pub fn save_with(
        &self,
        store: &Store,
        destination: &Path,
        serializer: &dyn Serializer,
    ) -> OpsResult<()> {
        serializer.write(store, destination)
    }

    /// Render a store to text with the configured serializer.
    pub fn serialize(&self, store: &Store) -> OpsResult<String> {
        self.config.serializer().encode(store)
    }

    /// Parse text produced by [`Self::serialize`].
    pub fn deserialize(&self, input: &str) -> OpsResult<Store> {
        self.config.serializer().decode(input)
    }
}
