//! Scanner strategies: each turns one class descriptor into index entries.

use std::fmt;
use std::sync::Arc;

use metascan_core::{ClassDescriptor, InputFilter, SUB_TYPES, TYPE_ANNOTATIONS};

use crate::error::ScannerError;

/// Name of the class every JVM type ultimately extends.
pub const JAVA_LANG_OBJECT: &str = "java.lang.Object";

/// A stateless strategy producing `(key, value)` pairs for a named index.
///
/// Scanners are shared between worker threads and must not keep state across calls.
pub trait Scanner: Send + Sync + fmt::Debug {
    /// Index name the entries are stored under. Unique within a configuration.
    fn name(&self) -> &str;

    /// Emit `(key, value)` pairs for one class.
    fn scan(&self, class: &ClassDescriptor) -> Result<Vec<(String, String)>, ScannerError>;

    /// Scanner-level filter over emitted keys, applied before the global input filter.
    fn accepts_result(&self, _key: &str) -> bool {
        true
    }
}

/// Indexes supertype to subtype for the declared superclass and every interface.
///
/// By default `java.lang.Object` is not recorded as a key, since every class would appear under it.
#[derive(Debug, Clone)]
pub struct SubTypeScanner {
    result_filter: InputFilter,
}

impl SubTypeScanner {
    pub fn new() -> Self {
        Self {
            result_filter: InputFilter::excluding(JAVA_LANG_OBJECT),
        }
    }

    /// Keep `java.lang.Object` as a key as well.
    pub fn including_object() -> Self {
        Self {
            result_filter: InputFilter::accept_all(),
        }
    }

    /// Replace the result filter applied to supertype keys.
    pub fn filter_results_by(mut self, filter: InputFilter) -> Self {
        self.result_filter = filter;
        self
    }
}

impl Default for SubTypeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for SubTypeScanner {
    fn name(&self) -> &str {
        SUB_TYPES
    }

    fn scan(&self, class: &ClassDescriptor) -> Result<Vec<(String, String)>, ScannerError> {
        Ok(class
            .supertypes()
            .map(|supertype| (supertype.to_string(), class.name.clone()))
            .collect())
    }

    fn accepts_result(&self, key: &str) -> bool {
        self.result_filter.accepts(key)
    }
}

/// Indexes annotation type to annotated class.
#[derive(Debug, Clone, Default)]
pub struct TypeAnnotationScanner {
    result_filter: InputFilter,
}

impl TypeAnnotationScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only record annotation types accepted by `filter`.
    pub fn filter_results_by(mut self, filter: InputFilter) -> Self {
        self.result_filter = filter;
        self
    }
}

impl Scanner for TypeAnnotationScanner {
    fn name(&self) -> &str {
        TYPE_ANNOTATIONS
    }

    fn scan(&self, class: &ClassDescriptor) -> Result<Vec<(String, String)>, ScannerError> {
        Ok(class
            .annotations
            .iter()
            .map(|annotation| (annotation.type_name.clone(), class.name.clone()))
            .collect())
    }

    fn accepts_result(&self, key: &str) -> bool {
        self.result_filter.accepts(key)
    }
}

/// The scanners active when none are configured explicitly.
pub fn default_scanners() -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(SubTypeScanner::new()),
        Arc::new(TypeAnnotationScanner::new()),
    ]
}

/// Resolve a reference scanner by its index name (case-insensitive).
pub fn scanner_by_name(name: &str) -> Option<Arc<dyn Scanner>> {
    if name.eq_ignore_ascii_case(SUB_TYPES) {
        Some(Arc::new(SubTypeScanner::new()))
    } else if name.eq_ignore_ascii_case(TYPE_ANNOTATIONS) {
        Some(Arc::new(TypeAnnotationScanner::new()))
    } else {
        None
    }
}
