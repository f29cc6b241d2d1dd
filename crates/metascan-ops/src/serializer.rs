//! Store persistence formats.
//!
//! The reference format is a small XML tree:
//!
//! ```text
//! <metascan>
//!   <index name="SubTypes">
//!     <entry>
//!       <key>com.acme.Base</key>
//!       <values>
//!         <value>com.acme.Impl</value>
//!       </values>
//!     </entry>
//!   </index>
//! </metascan>
//! ```
//!
//! Element order follows store insertion order; it carries no meaning on read.
//! Text inside `<key>` and `<value>` is kept verbatim, whitespace included.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use metascan_core::{Index, Store};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info};

use crate::error::{OpsError, OpsResult};

const ROOT: &str = "metascan";
const INDEX: &str = "index";
const ENTRY: &str = "entry";
const KEY: &str = "key";
const VALUES: &str = "values";
const VALUE: &str = "value";

/// Capability that persists and restores a [`Store`].
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Format name, used in errors and logs.
    fn name(&self) -> &str;

    /// Preferred file extension, without the dot.
    fn file_extension(&self) -> &str;

    /// Render a store to text.
    fn encode(&self, store: &Store) -> OpsResult<String>;

    /// Parse text produced by [`Serializer::encode`].
    fn decode(&self, input: &str) -> OpsResult<Store>;

    /// Write a store to `destination`, creating parent directories.
    fn write(&self, store: &Store, destination: &Path) -> OpsResult<()> {
        let serialization_error = |message: String| OpsError::Serialization {
            format: self.name().to_string(),
            destination: destination.display().to_string(),
            message,
        };

        let text = self
            .encode(store)
            .map_err(|err| serialization_error(err.to_string()))?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| serialization_error(err.to_string()))?;
        }
        std::fs::write(destination, text).map_err(|err| serialization_error(err.to_string()))?;

        info!(
            path = %destination.display(),
            format = self.name(),
            keys = store.key_count(),
            values = store.value_count(),
            "Saved store"
        );
        Ok(())
    }

    /// Read a store previously written with [`Serializer::write`].
    fn read(&self, origin: &Path) -> OpsResult<Store> {
        let deserialization_error = |message: String| OpsError::Deserialization {
            format: self.name().to_string(),
            origin: origin.display().to_string(),
            message,
        };

        let text = std::fs::read_to_string(origin)
            .map_err(|err| deserialization_error(err.to_string()))?;
        let store = self
            .decode(&text)
            .map_err(|err| deserialization_error(err.to_string()))?;

        info!(
            path = %origin.display(),
            format = self.name(),
            keys = store.key_count(),
            "Loaded store"
        );
        Ok(store)
    }
}

/// Reference tagged-tree serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlSerializer;

impl Serializer for XmlSerializer {
    fn name(&self) -> &str {
        "xml"
    }

    fn file_extension(&self) -> &str {
        "xml"
    }

    fn encode(&self, store: &Store) -> OpsResult<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;

        for (scanner, index) in store.iter() {
            if index.is_empty() {
                continue;
            }
            let mut section = BytesStart::new(INDEX);
            section.push_attribute(("name", scanner));
            writer.write_event(Event::Start(section))?;

            for (key, values) in index.iter() {
                writer.write_event(Event::Start(BytesStart::new(ENTRY)))?;
                write_text_element(&mut writer, KEY, key)?;
                writer.write_event(Event::Start(BytesStart::new(VALUES)))?;
                for value in values {
                    write_text_element(&mut writer, VALUE, value)?;
                }
                writer.write_event(Event::End(BytesEnd::new(VALUES)))?;
                writer.write_event(Event::End(BytesEnd::new(ENTRY)))?;
            }

            writer.write_event(Event::End(BytesEnd::new(INDEX)))?;
        }

        writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|err| OpsError::with_context("XML output", err.to_string()))
    }

    fn decode(&self, input: &str) -> OpsResult<Store> {
        let mut reader = Reader::from_str(input);
        reader.trim_text(false);

        let mut store = Store::new();
        let mut saw_root = false;
        let mut index: Option<(String, Index)> = None;
        let mut key: Option<String> = None;
        let mut values: Vec<String> = Vec::new();
        let mut text: Option<String> = None;

        loop {
            match reader.read_event()? {
                Event::Start(element) => match element.name().as_ref() {
                    b"metascan" => saw_root = true,
                    b"index" => {
                        let name = element
                            .try_get_attribute("name")
                            .map_err(quick_xml::Error::from)?
                            .ok_or_else(|| malformed("index element without a name"))?
                            .unescape_value()?
                            .into_owned();
                        index = Some((name, Index::new()));
                    }
                    b"entry" => {
                        key = None;
                        values.clear();
                    }
                    b"values" => {}
                    b"key" | b"value" => text = Some(String::new()),
                    other => return Err(unexpected_element(other)),
                },
                Event::Empty(element) => match element.name().as_ref() {
                    b"key" => key = Some(String::new()),
                    b"value" => values.push(String::new()),
                    b"metascan" => saw_root = true,
                    b"values" | b"index" => {}
                    other => return Err(unexpected_element(other)),
                },
                // Indentation between elements arrives here too and is dropped.
                Event::Text(content) => {
                    if let Some(buffer) = text.as_mut() {
                        buffer.push_str(&content.unescape()?);
                    }
                }
                Event::End(element) => match element.name().as_ref() {
                    b"key" => key = text.take(),
                    b"value" => values.extend(text.take()),
                    b"entry" => {
                        let entry_key = key
                            .take()
                            .ok_or_else(|| malformed("entry element without a key"))?;
                        let (_, current) = index
                            .as_mut()
                            .ok_or_else(|| malformed("entry outside of an index element"))?;
                        for value in values.drain(..) {
                            current.insert(entry_key.clone(), value);
                        }
                    }
                    b"index" => {
                        if let Some((name, finished)) = index.take().filter(|(_, i)| !i.is_empty()) {
                            let mut merged = store.index(&name).cloned().unwrap_or_default();
                            merged.merge(&finished);
                            store.set_index(name, merged);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(malformed("missing <metascan> root element"));
        }
        debug!(keys = store.key_count(), "Decoded XML store");
        Ok(store)
    }
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    value: &str,
) -> OpsResult<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn malformed(message: &str) -> OpsError {
    OpsError::with_context("Malformed store document", message)
}

fn unexpected_element(name: &[u8]) -> OpsError {
    malformed(&format!(
        "unexpected element <{}>",
        String::from_utf8_lossy(name)
    ))
}

/// JSON serializer: `{ scanner: { key: [values] } }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn file_extension(&self) -> &str {
        "json"
    }

    fn encode(&self, store: &Store) -> OpsResult<String> {
        Ok(serde_json::to_string_pretty(store)?)
    }

    fn decode(&self, input: &str) -> OpsResult<Store> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Selects one of the bundled serializers by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializerKind {
    #[default]
    Xml,
    Json,
}

impl SerializerKind {
    pub fn serializer(self) -> Arc<dyn Serializer> {
        match self {
            SerializerKind::Xml => Arc::new(XmlSerializer),
            SerializerKind::Json => Arc::new(JsonSerializer),
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SerializerKind::Xml => "xml",
            SerializerKind::Json => "json",
        }
    }
}

impl FromStr for SerializerKind {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(SerializerKind::Xml),
            "json" => Ok(SerializerKind::Json),
            other => Err(OpsError::configuration(format!(
                "Unknown serializer format: {} (expected xml or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
