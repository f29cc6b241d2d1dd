//! Core domain types shared across the metascan workspace.
//!
//! Everything here is plain data: descriptors produced by metadata adapters,
//! the merged [`Store`] of scanner indexes, and the [`InputFilter`] predicate
//! that decides which discovered names take part in indexing.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod filter;
mod store;

pub use filter::{FilterBuilder, FilterRule, InputFilter};
pub use store::{Index, Store};

/// Index name used by the subtype scanner.
pub const SUB_TYPES: &str = "SubTypes";

/// Index name used by the type annotation scanner.
pub const TYPE_ANNOTATIONS: &str = "TypeAnnotations";

// =============================================================================
// Descriptors
// =============================================================================

/// An annotation present on a class, with its declared element values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDescriptor {
    /// Fully-qualified annotation type name.
    pub type_name: String,
    /// Element name to rendered value.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, String>,
}

impl AnnotationDescriptor {
    /// Create a marker annotation with no parameters.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Add an element value.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Look up an element value by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// Declared metadata for one class-like unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Fully-qualified class name, dotted.
    pub name: String,
    /// Fully-qualified superclass name, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    /// Implemented interfaces in declaration order.
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Annotations on the class, unique by type name.
    #[serde(default)]
    pub annotations: Vec<AnnotationDescriptor>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the superclass.
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Append an implemented interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Attach an annotation. A second annotation of the same type replaces the first.
    pub fn annotated(mut self, annotation: AnnotationDescriptor) -> Self {
        self.add_annotation(annotation);
        self
    }

    /// Attach an annotation in place, replacing any existing one of the same type.
    pub fn add_annotation(&mut self, annotation: AnnotationDescriptor) {
        match self
            .annotations
            .iter_mut()
            .find(|a| a.type_name == annotation.type_name)
        {
            Some(existing) => *existing = annotation,
            None => self.annotations.push(annotation),
        }
    }

    /// Declared supertypes: the superclass first, then interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .iter()
            .map(String::as_str)
            .chain(self.interfaces.iter().map(String::as_str))
    }

    /// Package portion of the class name (empty for the default package).
    pub fn package(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(pkg, _)| pkg)
            .unwrap_or("")
    }
}

/// A single (scanner, key, value) triple emitted during scanning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    pub scanner: String,
    pub key: String,
    pub value: String,
}

impl IndexEntry {
    pub fn new(
        scanner: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            scanner: scanner.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Input locations
// =============================================================================

/// Opaque handle to one unit of scannable content (archive, directory, class file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputLocation {
    path: PathBuf,
}

impl InputLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Split a platform classpath string (`:` or `;` separated) into locations.
    pub fn from_classpath(classpath: &str) -> Vec<InputLocation> {
        std::env::split_paths(classpath)
            .filter(|p| !p.as_os_str().is_empty())
            .map(InputLocation::new)
            .collect()
    }

    /// Whether the location looks like a jar or zip archive.
    pub fn is_archive(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false)
    }

    /// Every jar or zip archive directly inside `dir`, sorted by path.
    pub fn archives_in(dir: impl AsRef<Path>) -> std::io::Result<Vec<InputLocation>> {
        let mut archives = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let location = InputLocation::new(entry?.path());
            if location.is_archive() && location.path.is_file() {
                archives.push(location);
            }
        }
        archives.sort();
        Ok(archives)
    }
}

impl fmt::Display for InputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for InputLocation {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for InputLocation {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for InputLocation {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for InputLocation {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}
