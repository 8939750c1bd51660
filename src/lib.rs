//! # class-meta
//!
//! Metadata extraction for compiled Java classes: names, supertypes, access
//! flags, fields, methods and annotations, read straight from class files in
//! directories and jars without loading them into a JVM.
//!
//! ## Architecture
//!
//! - **classfile**: Class file decoder that replays a class as visitor callbacks
//! - **visitor**: Callback protocol and the state machine building one record per class
//! - **model**: Class, field, method and annotation records
//! - **access**: JVM access flag constants and modifier helpers
//! - **scan**: Discovery of class files and archives under search locations
//! - **archive**: Reading class entries out of jar/zip files
//! - **finder**: Parallel decoding and first-wins merging into a class map
//! - **filter**: Modifier, subclass, annotation and name predicates over the class map
//! - **config**: Search path, thread and logging resolution
//! - **cli**: Command line definition

pub mod access;
pub mod archive;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod filter;
pub mod finder;
pub mod model;
pub mod scan;
pub mod visitor;
