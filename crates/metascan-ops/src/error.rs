//! Error types for the operations layer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use zip::result::ZipError;

use crate::adapter::ClassParseError;

/// Result type for operations.
pub type OpsResult<T> = Result<T, OpsError>;

/// Fatal errors surfaced to the caller of an operation.
#[derive(Debug, Error)]
pub enum OpsError {
    /// The configuration was rejected at build time or is unusable for the call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Writing a store failed. The in-memory store is untouched.
    #[error("Failed to serialize store with {format} to {destination}: {message}")]
    Serialization {
        format: String,
        destination: String,
        message: String,
    },

    /// Reading a store failed.
    #[error("Failed to deserialize store with {format} from {origin}: {message}")]
    Deserialization {
        format: String,
        origin: String,
        message: String,
    },

    /// Settings file could not be parsed or a key was invalid.
    #[error("Settings error: {0}")]
    Settings(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML reading or writing error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Generic error with context.
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl OpsError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new error with additional context.
    pub fn with_context(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Whether this error was caused by a rejected configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, OpsError::Configuration(_))
    }
}

/// Failure of a metadata adapter to read one input location.
///
/// Recovered by the orchestrator: the location contributes nothing and a
/// diagnostic is recorded.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Input location {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("IO error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive error while reading {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("Malformed class file {path}: {source}")]
    ClassFile {
        path: String,
        #[source]
        source: ClassParseError,
    },

    #[error("Unreadable input {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

impl AdapterError {
    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure of a scanner on a single class descriptor.
#[derive(Debug, Clone, Error)]
#[error("Scanner {scanner} failed on {class_name}: {message}")]
pub struct ScannerError {
    pub scanner: String,
    pub class_name: String,
    pub message: String,
}

impl ScannerError {
    pub fn new(
        scanner: impl Into<String>,
        class_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scanner: scanner.into(),
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = OpsError::Deserialization {
            format: "xml".into(),
            origin: "store.xml".into(),
            message: "unexpected element".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to deserialize store with xml from store.xml: unexpected element"
        );

        let err = ScannerError::new("SubTypes", "com.acme.Foo", "boom");
        assert_eq!(err.to_string(), "Scanner SubTypes failed on com.acme.Foo: boom");
    }

    #[test]
    fn test_is_configuration() {
        assert!(OpsError::configuration("no scanners").is_configuration());
        assert!(!OpsError::with_context("a", "b").is_configuration());
    }
}
