//! Metascan Operations Layer
//!
//! This crate runs the metadata scanning pipeline over a frozen
//! [`Configuration`] and exposes the results as a [`Store`] of inverted
//! indexes. It is consumed by the CLI and can be embedded directly.
//!
//! ## Architecture
//!
//! Each pluggable concern is a trait injected as `Arc<dyn Trait>`:
//! - **MetadataAdapter**: reads class descriptors from one input location
//! - **Scanner**: turns one class descriptor into index entries
//! - **Serializer**: persists and restores a store
//!
//! The [`ScanOrchestrator`] fans out over input locations, sequentially or on
//! a per-call worker pool, and merges per-input results in input order.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use metascan_ops::{ConfigurationBuilder, ScanOrchestrator, MetadataIndex};
//!
//! fn main() -> metascan_ops::OpsResult<()> {
//!     let config = ConfigurationBuilder::new()
//!         .set_locations(["target/classes", "lib/app.jar"])
//!         .use_parallel_executor(4)
//!         .build()?;
//!
//!     let orchestrator = ScanOrchestrator::new(config);
//!     let outcome = orchestrator.scan()?;
//!     for diagnostic in &outcome.diagnostics {
//!         eprintln!("{}", diagnostic);
//!     }
//!
//!     let index = MetadataIndex::new(&outcome.store);
//!     println!("{:?}", index.subtypes_of("com.acme.Service"));
//!
//!     orchestrator.save(&outcome.store, "metascan.xml".as_ref())?;
//!     Ok(())
//! }
//! ```

mod adapter;
mod config;
mod error;
mod executor;
mod orchestrator;
mod query;
mod report;
mod scanner;
mod serializer;
mod settings;

pub mod test_fixtures;

// Re-export public API
pub use adapter::{
    parse_class, ClassFileAdapter, ClassListing, ClassParseError, InMemoryAdapter,
    MetadataAdapter, SkippedEntry,
};
pub use config::{Configuration, ConfigurationBuilder};
pub use error::{AdapterError, OpsError, OpsResult, ScannerError};
pub use executor::ExecutionStrategy;
pub use orchestrator::ScanOrchestrator;
pub use query::MetadataIndex;
pub use report::{Diagnostic, DiagnosticKind, ScanOutcome, ScanStats};
pub use scanner::{
    default_scanners, scanner_by_name, Scanner, SubTypeScanner, TypeAnnotationScanner,
    JAVA_LANG_OBJECT,
};
pub use serializer::{JsonSerializer, Serializer, SerializerKind, XmlSerializer};
pub use settings::{ScanSettings, ENV_EXCLUDE, ENV_FORMAT, ENV_INCLUDE, ENV_THREADS, KEYS};

pub use metascan_core::{
    AnnotationDescriptor, ClassDescriptor, FilterBuilder, FilterRule, Index, IndexEntry,
    InputFilter, InputLocation, Store, SUB_TYPES, TYPE_ANNOTATIONS,
};
