//! Class-file decoder.
//!
//! Parses the structural parts of a JVM class file (constant pool, header,
//! fields, methods and the attributes that carry metadata) and replays them
//! into a [`ClassVisitor`]. Code, stack maps and every other attribute are
//! skipped by length; nothing is verified or linked.

use thiserror::Error;

use crate::model::{AnnotationRecord, AnnotationValue, ConstantValue, annotation_type_name};
use crate::visitor::{ClassDecl, ClassVisitor, FieldDecl, MethodDecl, VisitError};

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("invalid annotation element tag {tag:#04x}")]
    InvalidElementTag { tag: u8 },
    #[error(transparent)]
    Visit(#[from] VisitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

/// Decode `bytes` and drive `visitor` through the whole class.
pub fn read_class<V: ClassVisitor + ?Sized>(
    bytes: &[u8],
    visitor: &mut V,
) -> Result<ClassVersion, DecodeError> {
    let parsed = parse(bytes)?;
    replay(&parsed, visitor)?;
    Ok(parsed.version)
}

struct ParsedAnnotation {
    descriptor: String,
    visible: bool,
    pairs: Vec<(String, AnnotationValue)>,
}

#[derive(Default)]
struct MemberAttributes {
    signature: Option<String>,
    constant: Option<ConstantValue>,
    exceptions: Option<Vec<String>>,
    annotations: Vec<ParsedAnnotation>,
    parameter_annotations: Vec<(u8, ParsedAnnotation)>,
}

struct ParsedMember {
    access: u16,
    name: String,
    descriptor: String,
    attributes: MemberAttributes,
}

struct ParsedClass {
    version: ClassVersion,
    access: u16,
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<ParsedMember>,
    methods: Vec<ParsedMember>,
    attributes: MemberAttributes,
}

fn parse(bytes: &[u8]) -> Result<ParsedClass, DecodeError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let minor = reader.read_u2()?;
    let major = reader.read_u2()?;
    let pool = ConstantPool::parse(&mut reader)?;

    let access = reader.read_u2()?;
    let this_class = reader.read_u2()?;
    let super_class = reader.read_u2()?;
    let name = pool.class_name(this_class)?.to_string();
    let super_name = match super_class {
        0 => None,
        idx => Some(pool.class_name(idx)?.to_string()),
    };

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let idx = reader.read_u2()?;
        interfaces.push(pool.class_name(idx)?.to_string());
    }

    let fields = parse_members(&mut reader, &pool)?;
    let methods = parse_members(&mut reader, &pool)?;
    let attributes = parse_attributes(&mut reader, &pool)?;

    Ok(ParsedClass {
        version: ClassVersion { major, minor },
        access,
        name,
        super_name,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn parse_members(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<ParsedMember>, DecodeError> {
    let count = reader.read_u2()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access = reader.read_u2()?;
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
        let attributes = parse_attributes(reader, pool)?;
        members.push(ParsedMember {
            access,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}

fn parse_attributes(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
) -> Result<MemberAttributes, DecodeError> {
    let mut attrs = MemberAttributes::default();
    let count = reader.read_u2()?;
    for _ in 0..count {
        let name = pool.utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        let mut body = ClassReader::new(reader.read_slice(length)?);

        match name {
            "Signature" => {
                attrs.signature = Some(pool.utf8(body.read_u2()?)?.to_string());
            }
            "ConstantValue" => {
                attrs.constant = pool.constant_value(body.read_u2()?)?;
            }
            "Exceptions" => {
                let n = body.read_u2()?;
                let mut names = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    names.push(pool.class_name(body.read_u2()?)?.to_string());
                }
                attrs.exceptions = Some(names);
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let visible = name == "RuntimeVisibleAnnotations";
                let n = body.read_u2()?;
                for _ in 0..n {
                    attrs
                        .annotations
                        .push(parse_annotation(&mut body, pool, visible)?);
                }
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let visible = name == "RuntimeVisibleParameterAnnotations";
                let parameters = body.read_u1()?;
                for parameter in 0..parameters {
                    let n = body.read_u2()?;
                    for _ in 0..n {
                        let annotation = parse_annotation(&mut body, pool, visible)?;
                        attrs.parameter_annotations.push((parameter, annotation));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(attrs)
}

fn parse_annotation(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<ParsedAnnotation, DecodeError> {
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
    let n = reader.read_u2()?;
    let mut pairs = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let value = parse_element_value(reader, pool, visible)?;
        pairs.push((name, value));
    }
    Ok(ParsedAnnotation {
        descriptor,
        visible,
        pairs,
    })
}

/// `visible` is the retention of the enclosing annotation; nested
/// annotation values share it.
fn parse_element_value(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<AnnotationValue, DecodeError> {
    let tag = reader.read_u1()?;
    let value = match tag {
        b'B' => AnnotationValue::Byte(pool.integer(reader.read_u2()?)? as i8),
        b'C' => {
            let code = pool.integer(reader.read_u2()?)? as u32;
            AnnotationValue::Char(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        b'S' => AnnotationValue::Short(pool.integer(reader.read_u2()?)? as i16),
        b'Z' => AnnotationValue::Boolean(pool.integer(reader.read_u2()?)? != 0),
        b'I' => AnnotationValue::Int(pool.integer(reader.read_u2()?)?),
        b'J' | b'F' | b'D' => match pool.constant_value(reader.read_u2()?)? {
            Some(ConstantValue::Long(v)) => AnnotationValue::Long(v),
            Some(ConstantValue::Float(v)) => AnnotationValue::Float(v),
            Some(ConstantValue::Double(v)) => AnnotationValue::Double(v),
            _ => return Err(DecodeError::InvalidElementTag { tag }),
        },
        b's' => AnnotationValue::Str(pool.utf8(reader.read_u2()?)?.to_string()),
        b'e' => {
            let type_descriptor = pool.utf8(reader.read_u2()?)?;
            let constant = pool.utf8(reader.read_u2()?)?.to_string();
            AnnotationValue::Enum {
                type_name: annotation_type_name(type_descriptor),
                constant,
            }
        }
        b'c' => AnnotationValue::Class(pool.utf8(reader.read_u2()?)?.to_string()),
        b'@' => {
            let nested = parse_annotation(reader, pool, visible)?;
            let mut record = AnnotationRecord::from_descriptor(&nested.descriptor, visible);
            for (name, value) in nested.pairs {
                record.push_param(name, value);
            }
            AnnotationValue::Annotation(Box::new(record))
        }
        b'[' => {
            let n = reader.read_u2()?;
            let mut values = Vec::with_capacity(n as usize);
            for _ in 0..n {
                values.push(parse_element_value(reader, pool, visible)?);
            }
            AnnotationValue::Array(values)
        }
        other => return Err(DecodeError::InvalidElementTag { tag: other }),
    };
    Ok(value)
}

fn replay<V: ClassVisitor + ?Sized>(class: &ParsedClass, visitor: &mut V) -> Result<(), VisitError> {
    visitor.visit_class(ClassDecl {
        access: class.access,
        name: &class.name,
        super_name: class.super_name.as_deref(),
        interfaces: &class.interfaces,
    })?;
    replay_annotations(&class.attributes.annotations, visitor)?;

    for field in &class.fields {
        visitor.visit_field(FieldDecl {
            access: field.access,
            name: &field.name,
            descriptor: &field.descriptor,
            signature: field.attributes.signature.as_deref(),
            value: field.attributes.constant.clone(),
        })?;
        replay_annotations(&field.attributes.annotations, visitor)?;
        visitor.visit_end()?;
    }

    for method in &class.methods {
        visitor.visit_method(MethodDecl {
            access: method.access,
            name: &method.name,
            descriptor: &method.descriptor,
            signature: method.attributes.signature.as_deref(),
            exceptions: method.attributes.exceptions.as_deref(),
        })?;
        replay_annotations(&method.attributes.annotations, visitor)?;
        for (parameter, annotation) in &method.attributes.parameter_annotations {
            visitor.visit_parameter_annotation(
                *parameter,
                &annotation.descriptor,
                annotation.visible,
            )?;
            replay_values(annotation, visitor)?;
            visitor.visit_end()?;
        }
        visitor.visit_end()?;
    }

    visitor.visit_end()
}

fn replay_annotations<V: ClassVisitor + ?Sized>(
    annotations: &[ParsedAnnotation],
    visitor: &mut V,
) -> Result<(), VisitError> {
    for annotation in annotations {
        visitor.visit_annotation(&annotation.descriptor, annotation.visible)?;
        replay_values(annotation, visitor)?;
        visitor.visit_end()?;
    }
    Ok(())
}

fn replay_values<V: ClassVisitor + ?Sized>(
    annotation: &ParsedAnnotation,
    visitor: &mut V,
) -> Result<(), VisitError> {
    for (name, value) in &annotation.pairs {
        visitor.visit_value(name, value.clone())?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    Str { string_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    // Modified UTF-8; the rare non-standard encodings degrade to U+FFFD.
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                3 => Constant::Integer(reader.read_u4()? as i32),
                4 => Constant::Float(f32::from_bits(reader.read_u4()?)),
                5 | 6 => {
                    let high = reader.read_u4()? as u64;
                    let low = reader.read_u4()? as u64;
                    let bits = (high << 32) | low;
                    let entry = if tag == 5 {
                        Constant::Long(bits as i64)
                    } else {
                        Constant::Double(f64::from_bits(bits))
                    };
                    // Eight-byte constants occupy two pool slots.
                    entries.push(entry);
                    Constant::Unusable
                }
                7 => Constant::Class {
                    name_index: reader.read_u2()?,
                },
                8 => Constant::Str {
                    string_index: reader.read_u2()?,
                },
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                other => return Err(DecodeError::UnsupportedConstant { tag: other }),
            };
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, DecodeError> {
        self.entries
            .get(index as usize)
            .ok_or(DecodeError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(DecodeError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(DecodeError::InvalidConstantIndex { index }),
        }
    }

    fn integer(&self, index: u16) -> Result<i32, DecodeError> {
        match self.get(index)? {
            Constant::Integer(v) => Ok(*v),
            _ => Err(DecodeError::InvalidConstantIndex { index }),
        }
    }

    /// Loadable constant as used by `ConstantValue` and element values.
    /// `None` for pool entries that cannot initialise a field.
    fn constant_value(&self, index: u16) -> Result<Option<ConstantValue>, DecodeError> {
        let value = match self.get(index)? {
            Constant::Integer(v) => Some(ConstantValue::Int(*v)),
            Constant::Float(v) => Some(ConstantValue::Float(*v)),
            Constant::Long(v) => Some(ConstantValue::Long(*v)),
            Constant::Double(v) => Some(ConstantValue::Double(*v)),
            Constant::Str { string_index } => {
                Some(ConstantValue::Str(self.utf8(*string_index)?.to_string()))
            }
            _ => None,
        };
        Ok(value)
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

    fn expect_magic(&mut self) -> Result<(), DecodeError> {
        if self.read_u4()? != MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.data.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u2(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.read_slice(len).map(|_| ())
    }
}
