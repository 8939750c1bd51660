//! Turns search locations into a map of class records.
//!
//! Every class file gets its own [`ClassInfoVisitor`]; decoding runs on the
//! rayon pool, and the finished records are merged into a [`ClassMap`] on the
//! calling thread in discovery order. The first definition of a class name
//! wins, as it would on a classpath.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::archive::{is_nested_class_entry, read_class_entries};
use crate::classfile::{self, DecodeError};
use crate::model::ClassRecord;
use crate::scan::{self, Source};
use crate::visitor::ClassInfoVisitor;

/// External class name to record.
pub type ClassMap = BTreeMap<String, ClassRecord>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    /// Size of a dedicated worker pool; the global rayon pool when `None`.
    pub threads: Option<usize>,
    pub retain_bytecode: bool,
    pub skip_inner: bool,
}

/// The bytes of one compiled class and where they came from.
#[derive(Debug, Clone)]
pub struct ClassUnit {
    pub location: PathBuf,
    pub entry: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub location: String,
    pub entry: Option<String>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub classes: ClassMap,
    pub failures: Vec<UnitFailure>,
    pub units: usize,
    pub duplicates: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ClassFinder {
    locations: Vec<PathBuf>,
    config: ScanConfig,
}

type Decoded = (String, Result<ClassRecord, DecodeError>);

impl ClassFinder {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            locations: Vec::new(),
            config,
        }
    }

    pub fn add_location(&mut self, location: impl Into<PathBuf>) -> &mut Self {
        self.locations.push(location.into());
        self
    }

    pub fn add_locations<I, P>(&mut self, locations: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.locations.extend(locations.into_iter().map(Into::into));
        self
    }

    pub fn find(&self) -> Result<ScanReport> {
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .context("Failed to build worker pool")?;
                pool.install(|| self.run())
            }
            None => self.run(),
        }
    }

    fn run(&self) -> Result<ScanReport> {
        let start = Instant::now();
        let mut sources = Vec::new();
        for location in &self.locations {
            sources.extend(scan::discover(location)?);
        }

        let config = self.config;
        let outcomes: Vec<Result<Vec<Decoded>>> = sources
            .par_iter()
            .map(|source| decode_source(source, config))
            .collect();

        let mut report = ScanReport::default();
        for (source, outcome) in sources.iter().zip(outcomes) {
            let location = source.location().to_string_lossy().to_string();
            let decoded = match outcome {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!(%location, error = %format!("{err:#}"), "failed to read source");
                    report.failures.push(UnitFailure {
                        location,
                        entry: None,
                        message: format!("{err:#}"),
                    });
                    continue;
                }
            };

            for (entry, result) in decoded {
                report.units += 1;
                match result {
                    Ok(record) => {
                        if !merge_into(&mut report.classes, record) {
                            report.duplicates += 1;
                            debug!(%entry, %location, "class already defined by an earlier location");
                        }
                    }
                    Err(err) => {
                        warn!(%entry, %location, error = %err, "failed to decode class");
                        report.failures.push(UnitFailure {
                            location: location.clone(),
                            entry: Some(entry),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            units = report.units,
            classes = report.classes.len(),
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "scan finished"
        );
        Ok(report)
    }
}

fn decode_source(source: &Source, config: ScanConfig) -> Result<Vec<Decoded>> {
    let units = load_units(source, config.skip_inner)?;
    Ok(units
        .into_par_iter()
        .map(|unit| {
            let result = decode_unit(&unit, config.retain_bytecode);
            (unit.entry, result)
        })
        .collect())
}

/// Read the raw class bytes a source provides.
pub fn load_units(source: &Source, skip_nested: bool) -> Result<Vec<ClassUnit>> {
    match source {
        Source::ClassFile { root, path } => {
            let entry = relative_entry(root, path);
            if skip_nested && is_nested_class_entry(&entry) {
                return Ok(Vec::new());
            }
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read class file: {}", path.display()))?;
            Ok(vec![ClassUnit {
                location: root.clone(),
                entry,
                bytes,
            }])
        }
        Source::Archive(path) => Ok(read_class_entries(path, skip_nested)?
            .into_iter()
            .map(|entry| ClassUnit {
                location: path.clone(),
                entry: entry.name,
                bytes: entry.bytes,
            })
            .collect()),
    }
}

fn relative_entry(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Run one unit through its own visitor.
pub fn decode_unit(unit: &ClassUnit, retain_bytecode: bool) -> Result<ClassRecord, DecodeError> {
    let mut visitor = ClassInfoVisitor::new(unit.location.clone());
    if retain_bytecode {
        visitor = visitor.with_bytecode(unit.bytes.clone());
    }
    classfile::read_class(&unit.bytes, &mut visitor)?;
    Ok(visitor.finish()?)
}

/// Register a finished record under its external name. Returns `false` and
/// keeps the existing record when the name is already taken.
pub fn merge_into(classes: &mut ClassMap, record: ClassRecord) -> bool {
    match classes.entry(record.name.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(record);
            true
        }
        Entry::Occupied(_) => false,
    }
}
