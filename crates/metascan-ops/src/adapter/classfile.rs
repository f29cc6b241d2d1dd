//! Minimal JVM class file reader.
//!
//! Only the parts needed for a [`ClassDescriptor`] are decoded: the class and
//! super class names, implemented interfaces, and class-level annotations from
//! `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations`. Fields and
//! methods are skipped.

use metascan_core::{AnnotationDescriptor, ClassDescriptor};
use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;
const ACC_MODULE: u16 = 0x8000;

/// Deepest nesting of array and annotation element values that is decoded.
const MAX_ELEMENT_NESTING: usize = 64;

const VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("invalid modified UTF-8 in constant pool at byte {offset}")]
    InvalidModifiedUtf8 { offset: usize },
    #[error("malformed descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("unknown annotation element tag '{0}'")]
    InvalidElementTag(char),
    #[error("annotation element values nested deeper than {limit}")]
    NestingTooDeep { limit: usize },
}

/// Parse a class file. Returns `Ok(None)` for `module-info` classes, which
/// declare no type.
pub fn parse_class(bytes: &[u8]) -> Result<Option<ClassDescriptor>, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let _major_version = reader.read_u2()?;
    let pool = ConstantPool::parse(&mut reader)?;

    let access_flags = reader.read_u2()?;
    if access_flags & ACC_MODULE != 0 {
        return Ok(None);
    }

    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;

    let mut descriptor = ClassDescriptor::new(internal_to_dotted(&pool.class_name(this_class)?));
    if super_class != 0 {
        descriptor.superclass = Some(internal_to_dotted(&pool.class_name(super_class)?));
    }

    let interfaces_count = reader.read_u2()?;
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        descriptor
            .interfaces
            .push(internal_to_dotted(&pool.class_name(index)?));
    }

    let fields_count = reader.read_u2()?;
    for _ in 0..fields_count {
        skip_member(&mut reader)?;
    }

    let methods_count = reader.read_u2()?;
    for _ in 0..methods_count {
        skip_member(&mut reader)?;
    }

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let name = pool.utf8(name_index)?;
        if name == VISIBLE_ANNOTATIONS || name == INVISIBLE_ANNOTATIONS {
            let mut sub_reader = ClassReader::new(reader.read_slice(length)?);
            for annotation in parse_annotations(&mut sub_reader, &pool)? {
                descriptor.add_annotation(annotation);
            }
        } else {
            reader.skip(length)?;
        }
    }

    Ok(Some(descriptor))
}

fn parse_annotations(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<AnnotationDescriptor>, ClassParseError> {
    let count = reader.read_u2()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(parse_annotation(reader, pool, 0)?);
    }
    Ok(annotations)
}

fn parse_annotation(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<AnnotationDescriptor, ClassParseError> {
    let type_index = reader.read_u2()?;
    let mut annotation = AnnotationDescriptor::new(descriptor_to_name(pool.utf8(type_index)?)?);

    let pairs = reader.read_u2()?;
    for _ in 0..pairs {
        let name_index = reader.read_u2()?;
        let name = pool.utf8(name_index)?.to_string();
        let value = parse_element_value(reader, pool, depth)?;
        annotation.parameters.insert(name, value);
    }
    Ok(annotation)
}

/// Decode one `element_value` into its source-like rendering.
///
/// `depth` counts the enclosing array and nested annotation values.
fn parse_element_value(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<String, ClassParseError> {
    if depth >= MAX_ELEMENT_NESTING {
        return Err(ClassParseError::NestingTooDeep {
            limit: MAX_ELEMENT_NESTING,
        });
    }
    let tag = reader.read_u1()? as char;
    match tag {
        'B' | 'D' | 'F' | 'I' | 'J' | 'S' | 's' => {
            let index = reader.read_u2()?;
            pool.render_constant(index)
        }
        'C' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Integer(code) => Ok(char::from_u32(*code as u32)
                    .map(|c| c.to_string())
                    .unwrap_or_default()),
                _ => Err(ClassParseError::InvalidConstantIndex { index }),
            }
        }
        'Z' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Integer(flag) => Ok((*flag != 0).to_string()),
                _ => Err(ClassParseError::InvalidConstantIndex { index }),
            }
        }
        'e' => {
            let type_index = reader.read_u2()?;
            let const_index = reader.read_u2()?;
            Ok(format!(
                "{}.{}",
                descriptor_to_name(pool.utf8(type_index)?)?,
                pool.utf8(const_index)?
            ))
        }
        'c' => {
            let index = reader.read_u2()?;
            let descriptor = pool.utf8(index)?;
            if descriptor == "V" {
                Ok("void".to_string())
            } else {
                descriptor_to_name(descriptor)
            }
        }
        '@' => {
            let nested = parse_annotation(reader, pool, depth + 1)?;
            let params: Vec<String> = nested
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            Ok(format!("@{}({})", nested.type_name, params.join(", ")))
        }
        '[' => {
            let count = reader.read_u2()?;
            let mut values = Vec::new();
            for _ in 0..count {
                values.push(parse_element_value(reader, pool, depth + 1)?);
            }
            Ok(format!("[{}]", values.join(", ")))
        }
        other => Err(ClassParseError::InvalidElementTag(other)),
    }
}

/// `com/acme/Foo` to `com.acme.Foo`.
fn internal_to_dotted(name: &str) -> String {
    name.replace('/', ".")
}

/// Field descriptor to a readable type name: `Lcom/acme/Foo;` to
/// `com.acme.Foo`, `[I` to `int[]`.
fn descriptor_to_name(descriptor: &str) -> Result<String, ClassParseError> {
    let dimensions = descriptor.chars().take_while(|c| *c == '[').count();
    let element = &descriptor[dimensions..];
    let base = match element {
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "D" => "double".to_string(),
        "F" => "float".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "S" => "short".to_string(),
        "Z" => "boolean".to_string(),
        _ => element
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .filter(|s| !s.is_empty())
            .map(internal_to_dotted)
            .ok_or_else(|| ClassParseError::InvalidDescriptor(descriptor.to_string()))?,
    };
    Ok(format!("{}{}", base, "[]".repeat(dimensions)))
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(decode_modified_utf8(bytes)?)
                }
                3 => Constant::Integer(reader.read_u4()? as i32),
                4 => Constant::Float(f32::from_bits(reader.read_u4()?)),
                5 | 6 => {
                    let high = reader.read_u4()? as u64;
                    let low = reader.read_u4()? as u64;
                    let bits = (high << 32) | low;
                    let constant = if tag == 5 {
                        Constant::Long(bits as i64)
                    } else {
                        Constant::Double(f64::from_bits(bits))
                    };
                    // 8-byte constants take two slots
                    entries.push(constant);
                    index += 1;
                    Constant::Unusable
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                other => return Err(ClassParseError::UnsupportedConstant { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<String, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => Ok(self.utf8(*name_index)?.to_string()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn render_constant(&self, index: u16) -> Result<String, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.clone()),
            Constant::Integer(value) => Ok(value.to_string()),
            Constant::Float(value) => Ok(value.to_string()),
            Constant::Long(value) => Ok(value.to_string()),
            Constant::Double(value) => Ok(value.to_string()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        if self.read_u4()? != MAGIC {
            return Err(ClassParseError::InvalidMagic);
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        if self.pos + len > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        self.read_slice(len).map(|_| ())
    }
}

/// Decode a `CONSTANT_Utf8` payload.
///
/// Class files store strings as modified UTF-8: NUL is `C0 80` and
/// supplementary characters are encoded as two three-byte surrogates.
/// Unpaired surrogates, which Java strings may hold, become U+FFFD.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ClassParseError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        let lead = bytes[pos];
        let (unit, width) = match lead {
            0x01..=0x7F => (u16::from(lead), 1),
            0xC0..=0xDF => {
                let second = continuation_bits(bytes, pos + 1)?;
                ((u16::from(lead & 0x1F) << 6) | second, 2)
            }
            0xE0..=0xEF => {
                let second = continuation_bits(bytes, pos + 1)?;
                let third = continuation_bits(bytes, pos + 2)?;
                ((u16::from(lead & 0x0F) << 12) | (second << 6) | third, 3)
            }
            _ => return Err(ClassParseError::InvalidModifiedUtf8 { offset: pos }),
        };
        units.push(unit);
        pos += width;
    }
    Ok(String::from_utf16_lossy(&units))
}

fn continuation_bits(bytes: &[u8], offset: usize) -> Result<u16, ClassParseError> {
    match bytes.get(offset) {
        Some(byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
        _ => Err(ClassParseError::InvalidModifiedUtf8 { offset }),
    }
}

fn skip_member(reader: &mut ClassReader<'_>) -> Result<(), ClassParseError> {
    reader.skip(6)?; // access_flags, name_index, descriptor_index
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        reader.read_u2()?; // attribute_name_index
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
