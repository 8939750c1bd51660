//! JVM access flags as stored in class files.
//!
//! Several bits are reused with a different meaning depending on the element
//! kind (`0x0020` is `ACC_SUPER` on classes and `ACC_SYNCHRONIZED` on
//! methods), so only the unambiguous ones are rendered as keywords.

use clap::ValueEnum;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_VOLATILE: u16 = 0x0040;
pub const ACC_TRANSIENT: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STRICT: u16 = 0x0800;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Abstract,
    Interface,
    Annotation,
    Enum,
    Synthetic,
}

impl Modifier {
    pub fn flag(self) -> u16 {
        match self {
            Modifier::Public => ACC_PUBLIC,
            Modifier::Private => ACC_PRIVATE,
            Modifier::Protected => ACC_PROTECTED,
            Modifier::Static => ACC_STATIC,
            Modifier::Final => ACC_FINAL,
            Modifier::Abstract => ACC_ABSTRACT,
            Modifier::Interface => ACC_INTERFACE,
            Modifier::Annotation => ACC_ANNOTATION,
            Modifier::Enum => ACC_ENUM,
            Modifier::Synthetic => ACC_SYNTHETIC,
        }
    }
}

/// Combine modifiers into a single access mask.
pub fn mask(modifiers: &[Modifier]) -> u16 {
    modifiers.iter().fold(0, |acc, m| acc | m.flag())
}

pub fn has_all(access: u16, mask: u16) -> bool {
    access & mask == mask
}

pub fn has_any(access: u16, mask: u16) -> bool {
    access & mask != 0
}

/// Keywords for the access bits whose meaning does not depend on the element kind.
pub fn keywords(access: u16) -> Vec<&'static str> {
    const ORDERED: [(u16, &str); 9] = [
        (ACC_PUBLIC, "public"),
        (ACC_PRIVATE, "private"),
        (ACC_PROTECTED, "protected"),
        (ACC_STATIC, "static"),
        (ACC_FINAL, "final"),
        (ACC_ABSTRACT, "abstract"),
        (ACC_NATIVE, "native"),
        (ACC_SYNTHETIC, "synthetic"),
        (ACC_ENUM, "enum"),
    ];

    ORDERED
        .iter()
        .filter(|(flag, _)| access & flag != 0)
        .map(|(_, kw)| *kw)
        .collect()
}

/// Declaration keyword for a class: `class`, `interface`, `@interface` or `enum`.
pub fn class_kind(access: u16) -> &'static str {
    if access & ACC_ANNOTATION != 0 {
        "@interface"
    } else if access & ACC_INTERFACE != 0 {
        "interface"
    } else if access & ACC_ENUM != 0 {
        "enum"
    } else {
        "class"
    }
}
