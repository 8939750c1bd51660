use anyhow::{Result, bail};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::archive::is_archive;

/// Something that yields class files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    /// A loose class file; `root` is the directory it was found under.
    ClassFile { root: PathBuf, path: PathBuf },
    Archive(PathBuf),
}

impl Source {
    /// Origin location recorded on every class read from this source.
    pub fn location(&self) -> &Path {
        match self {
            Source::ClassFile { root, .. } => root,
            Source::Archive(path) => path,
        }
    }
}

pub fn is_class_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "class")
}

/// Resolve a search location into class file and archive sources.
///
/// Directories are walked recursively; results are sorted so the caller sees
/// the same order on every run.
pub fn discover(location: &Path) -> Result<Vec<Source>> {
    if location.is_dir() {
        let mut sources = walk_dir(location);
        sources.sort();
        return Ok(sources);
    }

    if !location.exists() {
        bail!("Search location does not exist: {}", location.display());
    }
    if is_archive(location) {
        return Ok(vec![Source::Archive(location.to_path_buf())]);
    }
    if is_class_file(location) {
        let root = location
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        return Ok(vec![Source::ClassFile {
            root,
            path: location.to_path_buf(),
        }]);
    }

    bail!(
        "Not a directory, archive or class file: {}",
        location.display()
    )
}

fn walk_dir(base_path: &Path) -> Vec<Source> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    return ignore::WalkState::Continue;
                }
                let source = if is_class_file(path) {
                    Some(Source::ClassFile {
                        root: base_path.to_path_buf(),
                        path: path.to_path_buf(),
                    })
                } else if is_archive(path) {
                    Some(Source::Archive(path.to_path_buf()))
                } else {
                    None
                };
                if let Some(source) = source {
                    let _ = tx.send(source);
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    rx.iter().collect()
}
