#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;

pub fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "class_meta_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

pub fn write_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

/// An element value as written into an annotation.
#[derive(Debug, Clone)]
pub enum Element {
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Enum(String, String),
    Class(String),
    Annotation(Ann),
    Array(Vec<Element>),
}

#[derive(Debug, Clone)]
pub struct Ann {
    pub descriptor: String,
    pub pairs: Vec<(String, Element)>,
}

impl Ann {
    pub fn new(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            pairs: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: Element) -> Self {
        self.pairs.push((name.to_string(), value));
        self
    }
}

#[derive(Debug, Clone)]
pub enum Const {
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
}

/// A field or method.
#[derive(Debug, Clone)]
pub struct Member {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    constant: Option<Const>,
    exceptions: Option<Vec<String>>,
    visible: Vec<Ann>,
    invisible: Vec<Ann>,
    parameters: Vec<Vec<Ann>>,
    code: bool,
}

impl Member {
    pub fn new(access: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            constant: None,
            exceptions: None,
            visible: Vec::new(),
            invisible: Vec::new(),
            parameters: Vec::new(),
            code: false,
        }
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn constant(mut self, value: Const) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn throws(mut self, exceptions: &[&str]) -> Self {
        self.exceptions = Some(exceptions.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn annotate(mut self, annotation: Ann) -> Self {
        self.visible.push(annotation);
        self
    }

    pub fn annotate_invisible(mut self, annotation: Ann) -> Self {
        self.invisible.push(annotation);
        self
    }

    /// Visible annotations per parameter position.
    pub fn parameter_annotations(mut self, parameters: Vec<Vec<Ann>>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Add a trivial `Code` attribute the reader has to skip.
    pub fn with_code(mut self) -> Self {
        self.code = true;
        self
    }
}

/// Assembles a class file with just enough structure for the reader.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    access: u16,
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    signature: Option<String>,
    visible: Vec<Ann>,
    invisible: Vec<Ann>,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            access: ACC_PUBLIC | ACC_SUPER,
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            signature: None,
            visible: Vec::new(),
            invisible: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn extends(mut self, super_name: Option<&str>) -> Self {
        self.super_name = super_name.map(str::to_string);
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn annotate(mut self, annotation: Ann) -> Self {
        self.visible.push(annotation);
        self
    }

    pub fn annotate_invisible(mut self, annotation: Ann) -> Self {
        self.invisible.push(annotation);
        self
    }

    pub fn field(mut self, field: Member) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: Member) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::default();
        let mut body = Vec::new();

        u2(&mut body, self.access);
        u2(&mut body, pool.class(&self.name));
        let super_idx = self.super_name.as_deref().map(|s| pool.class(s)).unwrap_or(0);
        u2(&mut body, super_idx);
        u2(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            u2(&mut body, pool.class(interface));
        }

        for members in [&self.fields, &self.methods] {
            u2(&mut body, members.len() as u16);
            for member in members {
                encode_member(&mut pool, member, &mut body);
            }
        }

        let mut attributes = Vec::new();
        if let Some(signature) = &self.signature {
            let idx = pool.utf8(signature);
            attributes.push(attribute(&mut pool, "Signature", idx.to_be_bytes().to_vec()));
        }
        annotation_attributes(&mut pool, &self.visible, &self.invisible, &mut attributes);
        write_attributes(&attributes, &mut body);

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        u2(&mut out, 0);
        u2(&mut out, 52);
        u2(&mut out, pool.next);
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

struct Pool {
    bytes: Vec<u8>,
    next: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            utf8: HashMap::new(),
            classes: HashMap::new(),
        }
    }
}

impl Pool {
    fn push(&mut self, entry: &[u8], slots: u16) -> u16 {
        let idx = self.next;
        self.bytes.extend_from_slice(entry);
        self.next += slots;
        idx
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(idx) = self.utf8.get(value) {
            return *idx;
        }
        let mut entry = vec![1];
        u2(&mut entry, value.len() as u16);
        entry.extend_from_slice(value.as_bytes());
        let idx = self.push(&entry, 1);
        self.utf8.insert(value.to_string(), idx);
        idx
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(idx) = self.classes.get(name) {
            return *idx;
        }
        let name_idx = self.utf8(name);
        let mut entry = vec![7];
        u2(&mut entry, name_idx);
        let idx = self.push(&entry, 1);
        self.classes.insert(name.to_string(), idx);
        idx
    }

    fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(&entry, 1)
    }

    fn float(&mut self, value: f32) -> u16 {
        let mut entry = vec![4];
        entry.extend_from_slice(&value.to_bits().to_be_bytes());
        self.push(&entry, 1)
    }

    fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(&entry, 2)
    }

    fn double(&mut self, value: f64) -> u16 {
        let mut entry = vec![6];
        entry.extend_from_slice(&value.to_bits().to_be_bytes());
        self.push(&entry, 2)
    }

    fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        let mut entry = vec![8];
        u2(&mut entry, utf8);
        self.push(&entry, 1)
    }
}

fn u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn attribute(pool: &mut Pool, name: &str, body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    u2(&mut out, pool.utf8(name));
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

fn write_attributes(attributes: &[Vec<u8>], out: &mut Vec<u8>) {
    u2(out, attributes.len() as u16);
    for attr in attributes {
        out.extend_from_slice(attr);
    }
}

fn annotation_attributes(
    pool: &mut Pool,
    visible: &[Ann],
    invisible: &[Ann],
    attributes: &mut Vec<Vec<u8>>,
) {
    for (name, annotations) in [
        ("RuntimeVisibleAnnotations", visible),
        ("RuntimeInvisibleAnnotations", invisible),
    ] {
        if annotations.is_empty() {
            continue;
        }
        let mut body = Vec::new();
        u2(&mut body, annotations.len() as u16);
        for annotation in annotations {
            encode_annotation(pool, annotation, &mut body);
        }
        attributes.push(attribute(pool, name, body));
    }
}

fn encode_member(pool: &mut Pool, member: &Member, out: &mut Vec<u8>) {
    u2(out, member.access);
    u2(out, pool.utf8(&member.name));
    u2(out, pool.utf8(&member.descriptor));

    let mut attributes = Vec::new();
    if member.code {
        let mut code = Vec::new();
        u2(&mut code, 1);
        u2(&mut code, 1);
        code.extend_from_slice(&1u32.to_be_bytes());
        code.push(0xb1);
        u2(&mut code, 0);
        u2(&mut code, 0);
        attributes.push(attribute(pool, "Code", code));
    }
    if let Some(signature) = &member.signature {
        let idx = pool.utf8(signature);
        attributes.push(attribute(pool, "Signature", idx.to_be_bytes().to_vec()));
    }
    if let Some(constant) = &member.constant {
        let idx = match constant {
            Const::Int(v) => pool.integer(*v),
            Const::Long(v) => pool.long(*v),
            Const::Double(v) => pool.double(*v),
            Const::Str(v) => pool.string(v),
        };
        attributes.push(attribute(pool, "ConstantValue", idx.to_be_bytes().to_vec()));
    }
    if let Some(exceptions) = &member.exceptions {
        let mut body = Vec::new();
        u2(&mut body, exceptions.len() as u16);
        for exception in exceptions {
            u2(&mut body, pool.class(exception));
        }
        attributes.push(attribute(pool, "Exceptions", body));
    }
    annotation_attributes(pool, &member.visible, &member.invisible, &mut attributes);
    if !member.parameters.is_empty() {
        let mut body = vec![member.parameters.len() as u8];
        for annotations in &member.parameters {
            u2(&mut body, annotations.len() as u16);
            for annotation in annotations {
                encode_annotation(pool, annotation, &mut body);
            }
        }
        attributes.push(attribute(pool, "RuntimeVisibleParameterAnnotations", body));
    }
    write_attributes(&attributes, out);
}

fn encode_annotation(pool: &mut Pool, annotation: &Ann, out: &mut Vec<u8>) {
    u2(out, pool.utf8(&annotation.descriptor));
    u2(out, annotation.pairs.len() as u16);
    for (name, value) in &annotation.pairs {
        u2(out, pool.utf8(name));
        encode_element(pool, value, out);
    }
}

fn encode_element(pool: &mut Pool, element: &Element, out: &mut Vec<u8>) {
    match element {
        Element::Byte(v) => {
            out.push(b'B');
            u2(out, pool.integer(*v as i32));
        }
        Element::Char(v) => {
            out.push(b'C');
            u2(out, pool.integer(*v as i32));
        }
        Element::Short(v) => {
            out.push(b'S');
            u2(out, pool.integer(*v as i32));
        }
        Element::Int(v) => {
            out.push(b'I');
            u2(out, pool.integer(*v));
        }
        Element::Long(v) => {
            out.push(b'J');
            u2(out, pool.long(*v));
        }
        Element::Float(v) => {
            out.push(b'F');
            u2(out, pool.float(*v));
        }
        Element::Double(v) => {
            out.push(b'D');
            u2(out, pool.double(*v));
        }
        Element::Bool(v) => {
            out.push(b'Z');
            u2(out, pool.integer(*v as i32));
        }
        Element::Str(v) => {
            out.push(b's');
            u2(out, pool.utf8(v));
        }
        Element::Enum(type_descriptor, constant) => {
            out.push(b'e');
            u2(out, pool.utf8(type_descriptor));
            u2(out, pool.utf8(constant));
        }
        Element::Class(descriptor) => {
            out.push(b'c');
            u2(out, pool.utf8(descriptor));
        }
        Element::Annotation(nested) => {
            out.push(b'@');
            encode_annotation(pool, nested, out);
        }
        Element::Array(items) => {
            out.push(b'[');
            u2(out, items.len() as u16);
            for item in items {
                encode_element(pool, item, out);
            }
        }
    }
}
