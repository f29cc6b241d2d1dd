//! Fixtures for tests: assemble real class files, class directories and jars
//! without a Java toolchain.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::FileOptions;
use zip::ZipWriter;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;

/// An annotation element value, encoded the way `javac` does.
#[derive(Debug, Clone)]
pub enum ElementValue {
    Str(String),
    Int(i32),
    Bool(bool),
    /// Enum type (internal name) and constant name.
    Enum(String, String),
    /// Class literal (internal name).
    Class(String),
    Array(Vec<ElementValue>),
    /// Pre-encoded `element_value` bytes, written verbatim.
    Raw(Vec<u8>),
}

type AnnotationFixture = (String, Vec<(String, ElementValue)>);

/// Builder for a minimal but valid class file.
#[derive(Debug, Clone)]
pub struct ClassFileWriter {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    access_flags: u16,
    visible: Vec<AnnotationFixture>,
    invisible: Vec<AnnotationFixture>,
}

impl ClassFileWriter {
    /// Start a class with an internal name such as `com/acme/Foo`, extending `java/lang/Object`.
    pub fn new(internal_name: &str) -> Self {
        Self {
            name: internal_name.to_string(),
            superclass: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            visible: Vec::new(),
            invisible: Vec::new(),
        }
    }

    pub fn superclass(mut self, internal_name: &str) -> Self {
        self.superclass = Some(internal_name.to_string());
        self
    }

    pub fn no_superclass(mut self) -> Self {
        self.superclass = None;
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        self.interfaces.push(internal_name.to_string());
        self
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    /// Add a runtime-visible annotation.
    pub fn annotation(mut self, internal_name: &str, params: Vec<(&str, ElementValue)>) -> Self {
        self.visible.push((
            internal_name.to_string(),
            params.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        ));
        self
    }

    /// Add a class-retention (invisible) marker annotation.
    pub fn invisible_annotation(mut self, internal_name: &str) -> Self {
        self.invisible.push((internal_name.to_string(), Vec::new()));
        self
    }

    /// Relative path of the class file inside a class directory or jar.
    pub fn entry_name(&self) -> String {
        format!("{}.class", self.name)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pool = PoolWriter::default();

        let this_index = pool.class(&self.name);
        let super_index = self.superclass.as_deref().map(|s| pool.class(s)).unwrap_or(0);
        let interface_indexes: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();

        let mut attributes = Vec::new();
        let mut attribute_count = 0u16;
        for (attr_name, annotations) in [
            ("RuntimeVisibleAnnotations", &self.visible),
            ("RuntimeInvisibleAnnotations", &self.invisible),
        ] {
            if annotations.is_empty() {
                continue;
            }
            let name_index = pool.utf8(attr_name);
            let mut body = Vec::new();
            put_u2(&mut body, annotations.len() as u16);
            for (type_name, params) in annotations {
                encode_annotation(&mut pool, &mut body, type_name, params);
            }
            put_u2(&mut attributes, name_index);
            put_u4(&mut attributes, body.len() as u32);
            attributes.extend(body);
            attribute_count += 1;
        }

        let mut out = Vec::new();
        put_u4(&mut out, 0xCAFE_BABE);
        put_u2(&mut out, 0); // minor
        put_u2(&mut out, 52); // major (Java 8)
        put_u2(&mut out, pool.count + 1);
        out.extend(&pool.bytes);
        put_u2(&mut out, self.access_flags);
        put_u2(&mut out, this_index);
        put_u2(&mut out, super_index);
        put_u2(&mut out, interface_indexes.len() as u16);
        for index in interface_indexes {
            put_u2(&mut out, index);
        }
        put_u2(&mut out, 0); // fields
        put_u2(&mut out, 0); // methods
        put_u2(&mut out, attribute_count);
        out.extend(attributes);
        out
    }

    /// Write the class under `root` at its package path and return the file path.
    pub fn write_to_dir(&self, root: &Path) -> io::Result<PathBuf> {
        let path = root.join(self.entry_name());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.to_bytes())?;
        Ok(path)
    }
}

/// Write a jar containing the given classes plus any raw extra entries.
pub fn write_jar(
    path: &Path,
    classes: &[ClassFileWriter],
    extra: &[(&str, &[u8])],
) -> Result<(), ZipError> {
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default();

    writer.start_file("META-INF/MANIFEST.MF", options)?;
    writer.write_all(b"Manifest-Version: 1.0\n")?;

    for class in classes {
        writer.start_file(class.entry_name(), options)?;
        writer.write_all(&class.to_bytes())?;
    }
    for (name, bytes) in extra {
        writer.start_file(*name, options)?;
        writer.write_all(bytes)?;
    }
    writer.finish()?;
    Ok(())
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    count: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
}

impl PoolWriter {
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8_cache.get(value) {
            return *index;
        }
        let encoded = modified_utf8(value);
        self.bytes.push(1);
        put_u2(&mut self.bytes, encoded.len() as u16);
        self.bytes.extend(encoded);
        let index = self.next();
        self.utf8_cache.insert(value.to_string(), index);
        index
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some(index) = self.class_cache.get(internal_name) {
            return *index;
        }
        let name_index = self.utf8(internal_name);
        self.bytes.push(7);
        put_u2(&mut self.bytes, name_index);
        let index = self.next();
        self.class_cache.insert(internal_name.to_string(), index);
        index
    }

    fn integer(&mut self, value: i32) -> u16 {
        self.bytes.push(3);
        put_u4(&mut self.bytes, value as u32);
        self.next()
    }

    fn next(&mut self) -> u16 {
        self.count += 1;
        self.count
    }
}

fn encode_annotation(
    pool: &mut PoolWriter,
    out: &mut Vec<u8>,
    type_name: &str,
    params: &[(String, ElementValue)],
) {
    let type_index = pool.utf8(&format!("L{};", type_name));
    put_u2(out, type_index);
    put_u2(out, params.len() as u16);
    for (name, value) in params {
        let name_index = pool.utf8(name);
        put_u2(out, name_index);
        encode_element(pool, out, value);
    }
}

fn encode_element(pool: &mut PoolWriter, out: &mut Vec<u8>, value: &ElementValue) {
    match value {
        ElementValue::Str(s) => {
            out.push(b's');
            let index = pool.utf8(s);
            put_u2(out, index);
        }
        ElementValue::Int(i) => {
            out.push(b'I');
            let index = pool.integer(*i);
            put_u2(out, index);
        }
        ElementValue::Bool(b) => {
            out.push(b'Z');
            let index = pool.integer(i32::from(*b));
            put_u2(out, index);
        }
        ElementValue::Enum(type_name, constant) => {
            out.push(b'e');
            let type_index = pool.utf8(&format!("L{};", type_name));
            let const_index = pool.utf8(constant);
            put_u2(out, type_index);
            put_u2(out, const_index);
        }
        ElementValue::Class(name) => {
            out.push(b'c');
            let index = pool.utf8(&format!("L{};", name));
            put_u2(out, index);
        }
        ElementValue::Array(values) => {
            out.push(b'[');
            put_u2(out, values.len() as u16);
            for v in values {
                encode_element(pool, out, v);
            }
        }
        ElementValue::Raw(bytes) => out.extend_from_slice(bytes),
    }
}

/// Encode a string the way `javac` stores it in the constant pool.
fn modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
