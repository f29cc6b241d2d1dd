//! Metadata adapters: turn one input location into class descriptors.

mod classfile;

use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use indexmap::IndexMap;
use metascan_core::{ClassDescriptor, InputLocation};
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::AdapterError;

pub use classfile::{parse_class, ClassParseError};

/// Largest read-ahead buffer reserved from an archive entry's declared size.
const MAX_ENTRY_PREALLOCATION: usize = 1 << 20;

/// An item inside a readable location that could not be turned into a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// File path, or `archive!/entry` for archive members.
    pub origin: String,
    pub reason: String,
}

/// Classes found in one location, plus the entries skipped along the way.
#[derive(Debug, Clone, Default)]
pub struct ClassListing {
    pub classes: Vec<ClassDescriptor>,
    pub skipped: Vec<SkippedEntry>,
}

impl ClassListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every entry of the location was read.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, origin: impl Into<String>, reason: impl fmt::Display) {
        let origin = origin.into();
        debug!(origin = %origin, reason = %reason, "Skipping unreadable entry");
        self.skipped.push(SkippedEntry {
            origin,
            reason: reason.to_string(),
        });
    }

    fn push_parsed(&mut self, bytes: &[u8], origin: String) {
        match parse_class(bytes) {
            Ok(Some(class)) => self.classes.push(class),
            Ok(None) => debug!(origin = %origin, "Skipping module descriptor"),
            Err(err) => self.skip(origin, err),
        }
    }
}

impl From<Vec<ClassDescriptor>> for ClassListing {
    fn from(classes: Vec<ClassDescriptor>) -> Self {
        Self {
            classes,
            skipped: Vec::new(),
        }
    }
}

/// Capability that extracts class-level metadata from an input location.
///
/// Implementations must be safe to call from several worker threads at once.
pub trait MetadataAdapter: Send + Sync + fmt::Debug {
    /// Short name, used in logs.
    fn name(&self) -> &str;

    /// List every class declared in the location.
    ///
    /// Fails when the location itself cannot be read. Entries inside it that
    /// cannot be decoded are reported in [`ClassListing::skipped`].
    fn list_classes(&self, location: &InputLocation) -> Result<ClassListing, AdapterError>;
}

/// Reads compiled JVM classes from directories, jar/zip archives or single `.class` files.
///
/// A location that cannot be opened fails as a whole. Inside a readable
/// directory or archive, malformed or unreadable class files are listed as skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassFileAdapter;

impl ClassFileAdapter {
    pub fn new() -> Self {
        Self
    }

    fn scan_directory(&self, root: &Path) -> Result<ClassListing, AdapterError> {
        let mut listing = ClassListing::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(AdapterError::unreadable(root, err.to_string()));
                }
                Err(err) => {
                    let origin = err.path().unwrap_or(root).display().to_string();
                    listing.skip(origin, err);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !is_class_file(path) {
                continue;
            }
            match fs::read(path) {
                Ok(bytes) => listing.push_parsed(&bytes, path.display().to_string()),
                Err(err) => listing.skip(path.display().to_string(), err),
            }
        }
        Ok(listing)
    }

    fn scan_archive(&self, path: &Path) -> Result<ClassListing, AdapterError> {
        let file = File::open(path).map_err(|source| AdapterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| AdapterError::Archive {
                path: path.to_path_buf(),
                source,
            })?;

        let mut listing = ClassListing::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|source| AdapterError::Archive {
                    path: path.to_path_buf(),
                    source,
                })?;
            if entry.is_dir() || !entry.name().ends_with(".class") {
                continue;
            }
            let name = format!("{}!/{}", path.display(), entry.name());
            let declared = usize::try_from(entry.size()).unwrap_or(usize::MAX);
            let mut bytes = Vec::with_capacity(declared.min(MAX_ENTRY_PREALLOCATION));
            match entry.read_to_end(&mut bytes) {
                Ok(_) => listing.push_parsed(&bytes, name),
                Err(err) => listing.skip(name, err),
            }
        }
        Ok(listing)
    }

    fn scan_class_file(&self, path: &Path) -> Result<ClassListing, AdapterError> {
        let bytes = fs::read(path).map_err(|source| AdapterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = parse_class(&bytes).map_err(|source| AdapterError::ClassFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(ClassListing::from(parsed.into_iter().collect::<Vec<_>>()))
    }
}

impl MetadataAdapter for ClassFileAdapter {
    fn name(&self) -> &str {
        "classfile"
    }

    fn list_classes(&self, location: &InputLocation) -> Result<ClassListing, AdapterError> {
        let path = location.path();
        if !path.exists() {
            return Err(AdapterError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let listing = if path.is_dir() {
            self.scan_directory(path)?
        } else if location.is_archive() {
            self.scan_archive(path)?
        } else if is_class_file(path) {
            self.scan_class_file(path)?
        } else {
            return Err(AdapterError::unreadable(
                path,
                "expected a directory, a .jar/.zip archive or a .class file",
            ));
        };

        debug!(
            location = %location,
            classes = listing.classes.len(),
            skipped = listing.skipped.len(),
            "Listed classes"
        );
        Ok(listing)
    }
}

fn is_class_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("class"))
        .unwrap_or(false)
}

/// Adapter serving descriptors from memory, keyed by location.
///
/// Useful for embedding callers that already hold metadata, and for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdapter {
    locations: IndexMap<InputLocation, Result<Vec<ClassDescriptor>, String>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `classes` for `location`.
    pub fn with_location(
        mut self,
        location: impl Into<InputLocation>,
        classes: Vec<ClassDescriptor>,
    ) -> Self {
        self.locations.insert(location.into(), Ok(classes));
        self
    }

    /// Make `location` fail as unreadable.
    pub fn with_unreadable(
        mut self,
        location: impl Into<InputLocation>,
        message: impl Into<String>,
    ) -> Self {
        self.locations.insert(location.into(), Err(message.into()));
        self
    }

    /// Every registered location, in registration order.
    pub fn locations(&self) -> impl Iterator<Item = &InputLocation> {
        self.locations.keys()
    }
}

impl MetadataAdapter for InMemoryAdapter {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn list_classes(&self, location: &InputLocation) -> Result<ClassListing, AdapterError> {
        match self.locations.get(location) {
            Some(Ok(classes)) => Ok(ClassListing::from(classes.clone())),
            Some(Err(message)) => Err(AdapterError::unreadable(location.path(), message.clone())),
            None => Err(AdapterError::NotFound {
                path: location.path().to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{write_jar, ClassFileWriter};
    use tempfile::TempDir;

    #[test]
    fn test_scan_class_directory() {
        let dir = TempDir::new().unwrap();
        ClassFileWriter::new("com/acme/B")
            .superclass("com/acme/A")
            .write_to_dir(dir.path())
            .unwrap();
        ClassFileWriter::new("com/acme/A").write_to_dir(dir.path()).unwrap();
        fs::write(dir.path().join("com/acme/readme.txt"), "not a class").unwrap();

        let listing = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(dir.path()))
            .unwrap();
        let names: Vec<&str> = listing.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["com.acme.A", "com.acme.B"]);
        assert!(listing.is_complete());
    }

    #[test]
    fn test_malformed_class_in_directory_is_skipped() {
        let dir = TempDir::new().unwrap();
        ClassFileWriter::new("ok/Good").write_to_dir(dir.path()).unwrap();
        fs::write(dir.path().join("ok/Bad.class"), b"garbage").unwrap();

        let listing = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(dir.path()))
            .unwrap();
        assert_eq!(listing.classes.len(), 1);
        assert_eq!(listing.classes[0].name, "ok.Good");
        assert_eq!(listing.skipped.len(), 1);
        assert!(listing.skipped[0].origin.ends_with("Bad.class"));
        assert!(listing.skipped[0].reason.contains("magic"));
    }

    #[test]
    fn test_malformed_archive_entry_is_skipped() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("mixed.jar");
        write_jar(
            &jar,
            &[ClassFileWriter::new("lib/Good")],
            &[("lib/Broken.class", b"\xCA\xFE\xBA\xBE\x00")],
        )
        .unwrap();

        let listing = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(&jar))
            .unwrap();
        assert_eq!(listing.classes.len(), 1);
        assert_eq!(listing.skipped.len(), 1);
        assert!(listing.skipped[0].origin.ends_with("mixed.jar!/lib/Broken.class"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_directory_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        ClassFileWriter::new("a/Hidden").write_to_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory.
        let listable = fs::read_dir(&locked).is_ok();
        let result = ClassFileAdapter::new().list_classes(&InputLocation::new(&locked));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if !listable {
            assert!(matches!(result, Err(AdapterError::Unreadable { .. })));
        }
    }

    #[test]
    fn test_scan_jar() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[
                ClassFileWriter::new("lib/Api").access_flags(0x0601),
                ClassFileWriter::new("lib/Impl").interface("lib/Api"),
            ],
            &[("lib/notes.txt", b"hello")],
        )
        .unwrap();

        let listing = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(&jar))
            .unwrap();
        assert_eq!(listing.classes.len(), 2);
        assert_eq!(listing.classes[1].interfaces, vec!["lib.Api"]);
        assert!(listing.is_complete());
    }

    #[test]
    fn test_corrupt_jar_is_error() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("broken.jar");
        fs::write(&jar, b"this is not a zip").unwrap();

        let err = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(&jar))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Archive { .. }));
    }

    #[test]
    fn test_missing_location_is_error() {
        let err = ClassFileAdapter::new()
            .list_classes(&InputLocation::new("/definitely/not/here.jar"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::NotFound { .. }));
    }

    #[test]
    fn test_single_class_file() {
        let dir = TempDir::new().unwrap();
        let path = ClassFileWriter::new("Solo").write_to_dir(dir.path()).unwrap();
        let listing = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(&path))
            .unwrap();
        assert_eq!(listing.classes[0].name, "Solo");

        let bad = dir.path().join("Bad.class");
        fs::write(&bad, b"\xCA\xFE").unwrap();
        let err = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(&bad))
            .unwrap_err();
        assert!(matches!(err, AdapterError::ClassFile { .. }));
    }

    #[test]
    fn test_unsupported_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hi").unwrap();
        let err = ClassFileAdapter::new()
            .list_classes(&InputLocation::new(&path))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unreadable { .. }));
    }

    #[test]
    fn test_in_memory_adapter() {
        let adapter = InMemoryAdapter::new()
            .with_location("a", vec![ClassDescriptor::new("x.A")])
            .with_unreadable("b", "corrupt");

        assert_eq!(adapter.list_classes(&"a".into()).unwrap().classes.len(), 1);
        assert!(matches!(
            adapter.list_classes(&"b".into()),
            Err(AdapterError::Unreadable { .. })
        ));
        assert!(matches!(
            adapter.list_classes(&"c".into()),
            Err(AdapterError::NotFound { .. })
        ));
        assert_eq!(adapter.locations().count(), 2);
    }
}
