//! Scan configuration and its builder.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;
use metascan_core::{InputFilter, InputLocation};

use crate::adapter::{ClassFileAdapter, MetadataAdapter};
use crate::error::{OpsError, OpsResult};
use crate::executor::ExecutionStrategy;
use crate::scanner::{default_scanners, Scanner};
use crate::serializer::{Serializer, XmlSerializer};

/// Immutable snapshot of everything a scan needs.
///
/// Produced by [`ConfigurationBuilder::build`]; cheap to clone since the
/// pluggable parts are shared behind `Arc`.
#[derive(Debug, Clone)]
pub struct Configuration {
    scanners: Vec<Arc<dyn Scanner>>,
    locations: IndexSet<InputLocation>,
    adapter: Arc<dyn MetadataAdapter>,
    filter: InputFilter,
    serializer: Arc<dyn Serializer>,
    strategy: ExecutionStrategy,
}

impl Configuration {
    /// Start from the defaults.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn scanners(&self) -> &[Arc<dyn Scanner>] {
        &self.scanners
    }

    /// Scanner names in configured order.
    pub fn scanner_names(&self) -> impl Iterator<Item = &str> {
        self.scanners.iter().map(|s| s.name())
    }

    /// Input locations, deduplicated, in insertion order.
    pub fn locations(&self) -> &IndexSet<InputLocation> {
        &self.locations
    }

    pub fn adapter(&self) -> &Arc<dyn MetadataAdapter> {
        &self.adapter
    }

    pub fn filter(&self) -> &InputFilter {
        &self.filter
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }
}

/// Fluent builder for [`Configuration`].
///
/// Every setter replaces the field it targets; nothing is appended.
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    scanners: Vec<Arc<dyn Scanner>>,
    locations: IndexSet<InputLocation>,
    adapter: Option<Arc<dyn MetadataAdapter>>,
    filter: InputFilter,
    serializer: Option<Arc<dyn Serializer>>,
    strategy: ExecutionStrategy,
}

impl ConfigurationBuilder {
    /// Builder with the reference scanners, adapter and serializer, an
    /// accept-all filter and sequential execution.
    pub fn new() -> Self {
        Self {
            scanners: default_scanners(),
            locations: IndexSet::new(),
            adapter: Some(Arc::new(ClassFileAdapter::new())),
            filter: InputFilter::accept_all(),
            serializer: Some(Arc::new(XmlSerializer)),
            strategy: ExecutionStrategy::Sequential,
        }
    }

    /// Builder with no scanners, adapter or serializer.
    pub fn bare() -> Self {
        Self {
            scanners: Vec::new(),
            locations: IndexSet::new(),
            adapter: None,
            filter: InputFilter::accept_all(),
            serializer: None,
            strategy: ExecutionStrategy::Sequential,
        }
    }

    pub fn set_scanners<I>(mut self, scanners: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Scanner>>,
    {
        self.scanners = scanners.into_iter().collect();
        self
    }

    /// Replace the input locations. Duplicates collapse onto their first occurrence.
    pub fn set_locations<I, L>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<InputLocation>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Alias of [`Self::set_locations`].
    pub fn set_urls<I, L>(self, urls: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<InputLocation>,
    {
        self.set_locations(urls)
    }

    pub fn set_metadata_adapter(mut self, adapter: Arc<dyn MetadataAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn filter_inputs_by(mut self, filter: InputFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn set_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn set_execution_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Process inputs on a pool of `workers` threads.
    pub fn use_parallel_executor(self, workers: usize) -> Self {
        self.set_execution_strategy(ExecutionStrategy::Parallel { workers })
    }

    /// Process inputs on a pool sized to the available hardware parallelism.
    pub fn use_parallel_executor_auto(self) -> Self {
        self.set_execution_strategy(ExecutionStrategy::available_parallelism())
    }

    /// Validate and freeze the configuration.
    ///
    /// Empty locations are accepted here so the configuration can be used
    /// for loading a persisted store; [`crate::ScanOrchestrator::scan`] rejects them.
    pub fn build(self) -> OpsResult<Configuration> {
        if self.scanners.is_empty() {
            return Err(OpsError::configuration("at least one scanner is required"));
        }

        let mut seen = HashSet::new();
        for scanner in &self.scanners {
            if !seen.insert(scanner.name()) {
                return Err(OpsError::configuration(format!(
                    "duplicate scanner name: {}",
                    scanner.name()
                )));
            }
        }

        let adapter = self
            .adapter
            .ok_or_else(|| OpsError::configuration("no metadata adapter configured"))?;
        let serializer = self
            .serializer
            .ok_or_else(|| OpsError::configuration("no serializer configured"))?;
        self.strategy.validate()?;

        Ok(Configuration {
            scanners: self.scanners,
            locations: self.locations,
            adapter,
            filter: self.filter,
            serializer,
            strategy: self.strategy,
        })
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryAdapter;
    use crate::scanner::{SubTypeScanner, TypeAnnotationScanner};
    use crate::serializer::JsonSerializer;
    use metascan_core::{SUB_TYPES, TYPE_ANNOTATIONS};

    #[test]
    fn test_defaults() {
        let config = ConfigurationBuilder::new().build().unwrap();
        let names: Vec<&str> = config.scanner_names().collect();
        assert_eq!(names, vec![SUB_TYPES, TYPE_ANNOTATIONS]);
        assert_eq!(config.adapter().name(), "classfile");
        assert_eq!(config.serializer().name(), "xml");
        assert_eq!(config.strategy(), ExecutionStrategy::Sequential);
        assert!(config.filter().accepts("anything"));
        assert!(config.locations().is_empty());
    }

    #[test]
    fn test_locations_deduplicated_in_order() {
        let config = ConfigurationBuilder::new()
            .set_locations(["b.jar", "a.jar", "b.jar", "c"])
            .build()
            .unwrap();
        let locations: Vec<String> = config.locations().iter().map(|l| l.to_string()).collect();
        assert_eq!(locations, vec!["b.jar", "a.jar", "c"]);
    }

    #[test]
    fn test_setters_replace() {
        let config = ConfigurationBuilder::new()
            .set_urls(vec!["one.jar", "two.jar"])
            .set_urls(vec!["three.jar"])
            .set_scanners(vec![Arc::new(TypeAnnotationScanner::new()) as Arc<dyn Scanner>])
            .build()
            .unwrap();
        assert_eq!(config.locations().len(), 1);
        assert_eq!(config.scanners().len(), 1);
        assert_eq!(config.scanners()[0].name(), TYPE_ANNOTATIONS);
    }

    #[test]
    fn test_empty_scanners_rejected() {
        let err = ConfigurationBuilder::new()
            .set_scanners(Vec::new())
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_scanner_names_rejected() {
        let err = ConfigurationBuilder::new()
            .set_scanners(vec![
                Arc::new(SubTypeScanner::new()) as Arc<dyn Scanner>,
                Arc::new(SubTypeScanner::including_object()),
            ])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate scanner name: SubTypes"));
    }

    #[test]
    fn test_bare_requires_capabilities() {
        let scanners = || default_scanners();
        let err = ConfigurationBuilder::bare()
            .set_scanners(scanners())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("adapter"));

        let err = ConfigurationBuilder::bare()
            .set_scanners(scanners())
            .set_metadata_adapter(Arc::new(InMemoryAdapter::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("serializer"));

        let config = ConfigurationBuilder::bare()
            .set_scanners(scanners())
            .set_metadata_adapter(Arc::new(InMemoryAdapter::new()))
            .set_serializer(Arc::new(JsonSerializer))
            .build()
            .unwrap();
        assert_eq!(config.serializer().name(), "json");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ConfigurationBuilder::new()
            .use_parallel_executor(0)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let config = ConfigurationBuilder::new()
            .use_parallel_executor(4)
            .build()
            .unwrap();
        assert_eq!(config.strategy().workers(), 4);
        assert!(ConfigurationBuilder::new()
            .use_parallel_executor_auto()
            .build()
            .is_ok());
    }
}
