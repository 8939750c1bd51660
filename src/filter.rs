//! Predicates over a scanned [`ClassMap`].
//!
//! Filters see the whole map so relationship queries (subclass-of) can
//! follow superclass and interface names to other scanned records.

use regex::Regex;
use std::collections::HashSet;

use crate::access;
use crate::finder::ClassMap;
use crate::model::ClassRecord;

pub trait ClassFilter: Send + Sync {
    fn accept(&self, class: &ClassRecord, classes: &ClassMap) -> bool;
}

impl<F: ClassFilter + ?Sized> ClassFilter for Box<F> {
    fn accept(&self, class: &ClassRecord, classes: &ClassMap) -> bool {
        (**self).accept(class, classes)
    }
}

/// At least one of the given access bits must be set.
#[derive(Debug, Clone, Copy)]
pub struct ModifiersFilter {
    mask: u16,
}

impl ModifiersFilter {
    pub fn new(mask: u16) -> Self {
        Self { mask }
    }

    pub fn from_modifiers(modifiers: &[access::Modifier]) -> Self {
        Self::new(access::mask(modifiers))
    }
}

impl ClassFilter for ModifiersFilter {
    fn accept(&self, class: &ClassRecord, _classes: &ClassMap) -> bool {
        access::has_any(class.access, self.mask)
    }
}

/// Every one of the given access bits must be set.
#[derive(Debug, Clone, Copy)]
pub struct AllModifiersFilter {
    mask: u16,
}

impl AllModifiersFilter {
    pub fn new(mask: u16) -> Self {
        Self { mask }
    }

    pub fn from_modifiers(modifiers: &[access::Modifier]) -> Self {
        Self::new(access::mask(modifiers))
    }
}

impl ClassFilter for AllModifiersFilter {
    fn accept(&self, class: &ClassRecord, _classes: &ClassMap) -> bool {
        access::has_all(class.access, self.mask)
    }
}

/// Classes that extend or implement `base`, directly or through other
/// scanned classes. `base` itself does not match.
#[derive(Debug, Clone)]
pub struct SubclassFilter {
    base: String,
}

impl SubclassFilter {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl ClassFilter for SubclassFilter {
    fn accept(&self, class: &ClassRecord, classes: &ClassMap) -> bool {
        if class.name == self.base {
            return false;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = supertypes(class).collect();
        while let Some(name) = pending.pop() {
            if name == self.base {
                return true;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(parent) = classes.get(name) {
                pending.extend(supertypes(parent));
            }
        }
        false
    }
}

fn supertypes(class: &ClassRecord) -> impl Iterator<Item = &str> {
    class
        .superclass
        .as_deref()
        .into_iter()
        .chain(class.interfaces.iter().map(String::as_str))
}

/// Scanned classes whose superclass or one of whose interfaces is `name`.
pub fn direct_subclasses<'a>(classes: &'a ClassMap, name: &str) -> Vec<&'a ClassRecord> {
    classes
        .values()
        .filter(|c| supertypes(c).any(|s| s == name))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationScope {
    Class,
    Member,
    Any,
}

#[derive(Debug, Clone)]
pub struct AnnotationFilter {
    annotation: String,
    scope: AnnotationScope,
}

impl AnnotationFilter {
    pub fn new(annotation: impl Into<String>, scope: AnnotationScope) -> Self {
        Self {
            annotation: annotation.into(),
            scope,
        }
    }

    fn on_member(&self, class: &ClassRecord) -> bool {
        class
            .fields
            .iter()
            .any(|f| f.is_annotation_present(&self.annotation))
            || class
                .methods
                .iter()
                .any(|m| m.is_annotation_present(&self.annotation))
    }
}

impl ClassFilter for AnnotationFilter {
    fn accept(&self, class: &ClassRecord, _classes: &ClassMap) -> bool {
        match self.scope {
            AnnotationScope::Class => class.is_annotation_present(&self.annotation),
            AnnotationScope::Member => self.on_member(class),
            AnnotationScope::Any => {
                class.is_annotation_present(&self.annotation) || self.on_member(class)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NameRegexFilter {
    pattern: Regex,
}

impl NameRegexFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl ClassFilter for NameRegexFilter {
    fn accept(&self, class: &ClassRecord, _classes: &ClassMap) -> bool {
        self.pattern.is_match(&class.name)
    }
}

#[derive(Default)]
pub struct AndFilter {
    filters: Vec<Box<dyn ClassFilter>>,
}

impl AndFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl ClassFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn ClassFilter>) {
        self.filters.push(filter);
    }
}

impl ClassFilter for AndFilter {
    fn accept(&self, class: &ClassRecord, classes: &ClassMap) -> bool {
        self.filters.iter().all(|f| f.accept(class, classes))
    }
}

/// Matches when any inner filter does; an empty `OrFilter` matches nothing.
#[derive(Default)]
pub struct OrFilter {
    filters: Vec<Box<dyn ClassFilter>>,
}

impl OrFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl ClassFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl ClassFilter for OrFilter {
    fn accept(&self, class: &ClassRecord, classes: &ClassMap) -> bool {
        self.filters.iter().any(|f| f.accept(class, classes))
    }
}

pub struct NotFilter<F>(pub F);

impl<F: ClassFilter> ClassFilter for NotFilter<F> {
    fn accept(&self, class: &ClassRecord, classes: &ClassMap) -> bool {
        !self.0.accept(class, classes)
    }
}

/// Matching records in name order.
pub fn find_matching<'a, F: ClassFilter + ?Sized>(
    classes: &'a ClassMap,
    filter: &F,
) -> Vec<&'a ClassRecord> {
    classes
        .values()
        .filter(|c| filter.accept(c, classes))
        .collect()
}
