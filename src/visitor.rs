//! Reconstructs a [`ClassRecord`] from the flat callback stream of one class file.
//!
//! The stream follows the usual bytecode-visitor shape:
//!
//! ```text
//! class
//!   (annotation value* end)*            -- class annotations
//!   field  (annotation value* end)* end -- per field
//!   method (annotation value* end)*
//!          (parameter-annotation value* end)* end -- per method
//! end                                   -- end of class
//! ```
//!
//! Value and end callbacks do not say what they belong to. The visitor keeps
//! a stack of open elements and at most one open annotation: an end callback
//! closes the annotation when one is open (attaching it to the element on top
//! of the stack), otherwise it closes the element itself. Stacked annotations
//! on the same element therefore need no special handling.
//!
//! One visitor handles exactly one unit and is not meant to be shared between
//! threads; run one per class file and merge the finished records.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::model::{AnnotationRecord, AnnotationValue, ClassRecord, ConstantValue};

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("{callback} callback outside the class body (unit from {})", .location.display())]
    ProtocolViolation {
        callback: &'static str,
        location: PathBuf,
    },
    #[error("second class declaration after {name} in one unit (from {})", .location.display())]
    DuplicateClass { name: String, location: PathBuf },
    #[error("class stream from {} ended before the class was closed", .location.display())]
    Unfinished { location: PathBuf },
}

#[derive(Debug, Clone, Copy)]
pub struct ClassDecl<'a> {
    pub access: u16,
    /// Internal name, e.g. `com/foo/Bar`.
    pub name: &'a str,
    pub super_name: Option<&'a str>,
    pub interfaces: &'a [String],
}

#[derive(Debug, Clone)]
pub struct FieldDecl<'a> {
    pub access: u16,
    pub name: &'a str,
    pub descriptor: &'a str,
    pub signature: Option<&'a str>,
    pub value: Option<ConstantValue>,
}

#[derive(Debug, Clone, Copy)]
pub struct MethodDecl<'a> {
    pub access: u16,
    pub name: &'a str,
    pub descriptor: &'a str,
    pub signature: Option<&'a str>,
    pub exceptions: Option<&'a [String]>,
}

/// Receiver of the structural callbacks emitted while decoding one class file.
pub trait ClassVisitor {
    fn visit_class(&mut self, decl: ClassDecl<'_>) -> Result<(), VisitError>;

    fn visit_field(&mut self, decl: FieldDecl<'_>) -> Result<(), VisitError>;

    fn visit_method(&mut self, decl: MethodDecl<'_>) -> Result<(), VisitError>;

    /// Opens an annotation on the element currently being visited.
    fn visit_annotation(&mut self, descriptor: &str, visible: bool) -> Result<(), VisitError>;

    fn visit_parameter_annotation(
        &mut self,
        parameter: u8,
        descriptor: &str,
        visible: bool,
    ) -> Result<(), VisitError>;

    /// A named element value of the open annotation.
    fn visit_value(&mut self, name: &str, value: AnnotationValue) -> Result<(), VisitError>;

    /// Ends the open annotation, or the current element when none is open.
    fn visit_end(&mut self) -> Result<(), VisitError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Class,
    Field(usize),
    Method(usize),
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Element,
    Parameter(u8),
}

#[derive(Debug)]
struct OpenAnnotation {
    record: AnnotationRecord,
    target: Target,
}

/// Builds one [`ClassRecord`] from a callback stream.
#[derive(Debug)]
pub struct ClassInfoVisitor {
    location: PathBuf,
    bytecode: Option<Vec<u8>>,
    class: Option<ClassRecord>,
    scopes: Vec<Scope>,
    annotation: Option<OpenAnnotation>,
    closed: bool,
}

impl ClassInfoVisitor {
    /// `location` is the archive or directory the unit was read from.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            bytecode: None,
            class: None,
            scopes: Vec::new(),
            annotation: None,
            closed: false,
        }
    }

    /// Keep the raw class bytes on the record for later re-parsing.
    pub fn with_bytecode(mut self, bytecode: Vec<u8>) -> Self {
        self.bytecode = Some(bytecode);
        self
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// True once the end callback for the class itself has been seen.
    pub fn is_complete(&self) -> bool {
        self.closed
    }

    /// Hand out the finished record.
    ///
    /// Fails when no class was declared or the stream stopped before the
    /// class was closed; no partial record escapes in either case.
    pub fn finish(self) -> Result<ClassRecord, VisitError> {
        match self.class {
            None => Err(VisitError::ProtocolViolation {
                callback: "finish",
                location: self.location,
            }),
            Some(_) if !self.closed => Err(VisitError::Unfinished {
                location: self.location,
            }),
            Some(class) => Ok(class),
        }
    }

    /// Members, annotations and values are only legal between the class
    /// declaration and its end callback.
    fn ensure_in_class(&self, callback: &'static str) -> Result<(), VisitError> {
        if self.class.is_none() || self.closed {
            return Err(self.violation(callback));
        }
        Ok(())
    }

    fn violation(&self, callback: &'static str) -> VisitError {
        VisitError::ProtocolViolation {
            callback,
            location: self.location.clone(),
        }
    }

    /// Attach the open annotation to the element on top of the stack.
    /// Returns `false` when no annotation was open.
    fn close_annotation(&mut self) -> bool {
        let Some(open) = self.annotation.take() else {
            return false;
        };
        let Some(class) = self.class.as_mut() else {
            return true;
        };

        if let Target::Parameter(parameter) = open.target {
            debug!(
                annotation = %open.record.name,
                parameter,
                class = %class.name,
                "parameter annotation not attached"
            );
            return true;
        }

        let name = open.record.name.clone();
        let attached = match self.scopes.last() {
            Some(Scope::Field(idx)) => class.fields[*idx].add_annotation(open.record),
            Some(Scope::Method(idx)) => class.methods[*idx].add_annotation(open.record),
            Some(Scope::Class) | None => class.add_annotation(open.record),
        };
        if !attached {
            debug!(annotation = %name, class = %class.name, "duplicate annotation ignored");
        }
        true
    }

    /// Close whatever member is still open before a new one is declared.
    fn leave_member(&mut self) {
        if self.close_annotation() {
            debug!(location = %self.location.display(), "annotation left open before next member");
        }
        if matches!(self.scopes.last(), Some(Scope::Field(_) | Scope::Method(_))) {
            debug!(location = %self.location.display(), "member declared without end callback");
            self.scopes.pop();
        }
    }

    fn open_annotation(
        &mut self,
        callback: &'static str,
        record: AnnotationRecord,
        target: Target,
    ) -> Result<(), VisitError> {
        self.ensure_in_class(callback)?;
        if self.close_annotation() {
            debug!(location = %self.location.display(), "annotation opened before previous one ended");
        }
        self.annotation = Some(OpenAnnotation { record, target });
        Ok(())
    }
}

impl ClassVisitor for ClassInfoVisitor {
    fn visit_class(&mut self, decl: ClassDecl<'_>) -> Result<(), VisitError> {
        if let Some(existing) = &self.class {
            return Err(VisitError::DuplicateClass {
                name: existing.name.clone(),
                location: self.location.clone(),
            });
        }

        let mut record = ClassRecord::new(
            decl.name,
            decl.super_name,
            decl.interfaces,
            decl.access,
            &self.location,
        );
        record.bytecode = self.bytecode.take();
        self.class = Some(record);
        self.scopes.push(Scope::Class);
        Ok(())
    }

    fn visit_field(&mut self, decl: FieldDecl<'_>) -> Result<(), VisitError> {
        self.ensure_in_class("field")?;
        self.leave_member();

        let Some(class) = self.class.as_mut() else {
            return Err(self.violation("field"));
        };
        let idx = class.add_field(
            decl.access,
            decl.name,
            decl.descriptor,
            decl.signature,
            decl.value,
        );
        self.scopes.push(Scope::Field(idx));
        Ok(())
    }

    fn visit_method(&mut self, decl: MethodDecl<'_>) -> Result<(), VisitError> {
        self.ensure_in_class("method")?;
        self.leave_member();

        let Some(class) = self.class.as_mut() else {
            return Err(self.violation("method"));
        };
        let idx = class.add_method(
            decl.access,
            decl.name,
            decl.descriptor,
            decl.signature,
            decl.exceptions,
        );
        self.scopes.push(Scope::Method(idx));
        Ok(())
    }

    fn visit_annotation(&mut self, descriptor: &str, visible: bool) -> Result<(), VisitError> {
        let record = AnnotationRecord::from_descriptor(descriptor, visible);
        self.open_annotation("annotation", record, Target::Element)
    }

    fn visit_parameter_annotation(
        &mut self,
        parameter: u8,
        descriptor: &str,
        visible: bool,
    ) -> Result<(), VisitError> {
        let record = AnnotationRecord::from_descriptor(descriptor, visible);
        self.open_annotation("parameter annotation", record, Target::Parameter(parameter))
    }

    fn visit_value(&mut self, name: &str, value: AnnotationValue) -> Result<(), VisitError> {
        self.ensure_in_class("value")?;
        match self.annotation.as_mut() {
            Some(open) => open.record.push_param(name, value),
            None => debug!(
                name,
                location = %self.location.display(),
                "annotation value outside any annotation dropped"
            ),
        }
        Ok(())
    }

    fn visit_end(&mut self) -> Result<(), VisitError> {
        if self.class.is_none() {
            return Err(self.violation("end"));
        }
        if self.close_annotation() {
            return Ok(());
        }
        match self.scopes.pop() {
            Some(Scope::Class) => self.closed = true,
            Some(Scope::Field(_) | Scope::Method(_)) => {}
            None => debug!(location = %self.location.display(), "end callback after class was closed"),
        }
        Ok(())
    }
}
