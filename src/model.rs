//! In-memory metadata graph for one compiled class.
//!
//! Records are passive: the visitor builds them, everything else only reads.
//! Fields and methods keep the name of their declaring class as a
//! back-reference for display and hashing; ownership flows strictly from
//! [`ClassRecord`] downwards.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Convert an internal name (`com/foo/Bar`) to its external form (`com.foo.Bar`).
pub fn external_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Derive an annotation type name from its field descriptor.
///
/// `Lcom/foo/Marker;` becomes `com.foo.Marker`. Exactly one leading `L` and one
/// trailing `;` are removed. Descriptors that do not have that shape keep as
/// much of their text as possible instead of being rejected.
pub fn annotation_type_name(descriptor: &str) -> String {
    let inner = match descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
    {
        Some(inner) => inner,
        None => descriptor.strip_suffix(';').unwrap_or(descriptor),
    };
    external_name(inner)
}

/// A single element value of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Str(String),
    Enum { type_name: String, constant: String },
    /// A class literal, kept as its descriptor (`Ljava/lang/String;`, `V`, `[I`).
    Class(String),
    Annotation(Box<AnnotationRecord>),
    Array(Vec<AnnotationValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationParam {
    pub name: String,
    pub value: AnnotationValue,
}

/// An annotation attached to a class, field or method.
///
/// Identity is the annotation type name only, so a bare record built with
/// [`AnnotationRecord::named`] can be used to test for presence.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationRecord {
    pub name: String,
    pub visible: bool,
    pub params: Vec<AnnotationParam>,
}

impl AnnotationRecord {
    pub fn from_descriptor(descriptor: &str, visible: bool) -> Self {
        Self {
            name: annotation_type_name(descriptor),
            visible,
            params: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            params: Vec::new(),
        }
    }

    pub fn push_param(&mut self, name: impl Into<String>, value: AnnotationValue) {
        self.params.push(AnnotationParam {
            name: name.into(),
            value,
        });
    }

    pub fn param(&self, name: &str) -> Option<&AnnotationValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

impl PartialEq for AnnotationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AnnotationRecord {}

impl Hash for AnnotationRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for AnnotationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

fn attach(annotations: &mut Vec<AnnotationRecord>, annotation: AnnotationRecord) -> bool {
    if annotations.contains(&annotation) {
        return false;
    }
    annotations.push(annotation);
    true
}

fn contains_named(annotations: &[AnnotationRecord], name: &str) -> bool {
    annotations.iter().any(|a| a.name == name)
}

/// Statically initialised value of a field (`ConstantValue` attribute).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldRecord {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: String,
    pub value: Option<ConstantValue>,
    pub declaring_class: String,
    pub annotations: Vec<AnnotationRecord>,
}

impl FieldRecord {
    /// Returns `false` when an annotation of the same type is already attached.
    pub fn add_annotation(&mut self, annotation: AnnotationRecord) -> bool {
        attach(&mut self.annotations, annotation)
    }

    pub fn is_annotation_present(&self, name: &str) -> bool {
        contains_named(&self.annotations, name)
    }
}

impl PartialEq for FieldRecord {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && self.declaring_class == other.declaring_class
    }
}

impl Eq for FieldRecord {}

impl Hash for FieldRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
        self.declaring_class.hash(state);
    }
}

impl fmt::Display for FieldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_class, self.name)
    }
}

/// A declared method. Equal when both the signature and the declaring class
/// match; ordered by signature.
#[derive(Debug, Clone, Serialize)]
pub struct MethodRecord {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: String,
    pub exceptions: Option<Vec<String>>,
    pub declaring_class: String,
    pub annotations: Vec<AnnotationRecord>,
}

impl MethodRecord {
    pub fn add_annotation(&mut self, annotation: AnnotationRecord) -> bool {
        attach(&mut self.annotations, annotation)
    }

    pub fn is_annotation_present(&self, name: &str) -> bool {
        contains_named(&self.annotations, name)
    }
}

impl PartialEq for MethodRecord {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && self.declaring_class == other.declaring_class
    }
}

impl Eq for MethodRecord {}

impl Ord for MethodRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.signature
            .cmp(&other.signature)
            .then_with(|| self.declaring_class.cmp(&other.declaring_class))
    }
}

impl PartialOrd for MethodRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for MethodRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
        self.declaring_class.hash(state);
    }
}

impl fmt::Display for MethodRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_class, self.signature)
    }
}

/// Everything extracted from one compiled class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRecord {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub access: u16,
    pub location: PathBuf,
    #[serde(skip)]
    pub bytecode: Option<Vec<u8>>,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
    pub annotations: Vec<AnnotationRecord>,
}

impl ClassRecord {
    /// Build a record from internal (slash separated) names.
    pub fn new<S: AsRef<str>>(
        internal_name: &str,
        super_name: Option<&str>,
        interfaces: &[S],
        access: u16,
        location: &Path,
    ) -> Self {
        Self {
            name: external_name(internal_name),
            superclass: super_name.map(external_name),
            interfaces: interfaces
                .iter()
                .map(|i| external_name(i.as_ref()))
                .collect(),
            access,
            location: location.to_path_buf(),
            bytecode: None,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Append a field. A missing generic signature is replaced by
    /// `descriptor + " " + name`.
    pub fn add_field(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        value: Option<ConstantValue>,
    ) -> usize {
        let signature = match signature {
            Some(sig) => sig.to_string(),
            None => format!("{descriptor} {name}"),
        };
        self.fields.push(FieldRecord {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature,
            value,
            declaring_class: self.name.clone(),
            annotations: Vec::new(),
        });
        self.fields.len() - 1
    }

    /// Append a method. A missing generic signature is replaced by
    /// `name + descriptor`; a supplied one that starts at the parameter list
    /// is prefixed with the name so both forms read alike.
    pub fn add_method<S: AsRef<str>>(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        exceptions: Option<&[S]>,
    ) -> usize {
        let signature = match signature {
            Some(sig) if sig.starts_with('(') => format!("{name}{sig}"),
            Some(sig) => sig.to_string(),
            None => format!("{name}{descriptor}"),
        };
        self.methods.push(MethodRecord {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature,
            exceptions: exceptions
                .map(|ex| ex.iter().map(|e| external_name(e.as_ref())).collect()),
            declaring_class: self.name.clone(),
            annotations: Vec::new(),
        });
        self.methods.len() - 1
    }

    pub fn add_annotation(&mut self, annotation: AnnotationRecord) -> bool {
        attach(&mut self.annotations, annotation)
    }

    pub fn is_annotation_present(&self, name: &str) -> bool {
        contains_named(&self.annotations, name)
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationRecord> {
        self.annotations.iter().find(|a| a.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All overloads with the given name, in declaration order.
    pub fn find_method<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodRecord> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn package_name(&self) -> &str {
        self.name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }

    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, simple)| simple)
            .unwrap_or(&self.name)
    }

    pub fn is_interface(&self) -> bool {
        self.access & crate::access::ACC_INTERFACE != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.access & crate::access::ACC_ANNOTATION != 0
    }

    pub fn is_enum(&self) -> bool {
        self.access & crate::access::ACC_ENUM != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & crate::access::ACC_ABSTRACT != 0
    }

    /// SHA-256 of the retained bytecode, hex encoded.
    pub fn bytecode_digest(&self) -> Option<String> {
        self.bytecode.as_deref().map(|bytes| {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hex::encode(hasher.finalize())
        })
    }
}

impl fmt::Display for ClassRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
