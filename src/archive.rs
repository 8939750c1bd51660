use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// One `.class` entry read out of an archive.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}

/// `a/b/Outer$Inner.class` and friends.
pub fn is_nested_class_entry(name: &str) -> bool {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file.contains('$')
}

/// Read every class entry of a jar or zip file.
///
/// Entries under `META-INF/` (multi-release overlays, module descriptors of
/// other versions) are left out so each class name appears once.
pub fn read_class_entries(archive_path: &Path, skip_nested: bool) -> Result<Vec<ClassEntry>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    // SAFETY: The file is opened read-only and remains valid for the lifetime of the mmap.
    // The mmap is dropped before the file, ensuring memory safety.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", archive_path.display()))?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !name.ends_with(".class") || name.starts_with("META-INF/") {
            continue;
        }
        if skip_nested && is_nested_class_entry(&name) {
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).with_context(|| {
            format!("Failed to inflate {name} in {}", archive_path.display())
        })?;
        entries.push(ClassEntry { name, bytes });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};
    use zip::write::FileOptions;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "class_meta_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
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

    #[test]
    fn reads_class_entries_with_contents() -> Result<()> {
        let jar = temp_path("entries.jar");
        write_jar(
            &jar,
            &[
                ("org/example/A.class", b"\xCA\xFE\xBA\xBE"),
                ("org/example/A$Inner.class", b"inner"),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
                ("META-INF/versions/11/org/example/A.class", b"v11"),
                ("org/example/readme.txt", b"text"),
            ],
        )?;

        let all = read_class_entries(&jar, false)?;
        let names: Vec<&str> = all.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["org/example/A.class", "org/example/A$Inner.class"]);
        assert_eq!(all[0].bytes, b"\xCA\xFE\xBA\xBE");

        let top_level = read_class_entries(&jar, true)?;
        assert_eq!(top_level.len(), 1);

        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn empty_archive_has_no_entries() -> Result<()> {
        let jar = temp_path("empty.jar");
        write_jar(&jar, &[])?;
        assert!(read_class_entries(&jar, false)?.is_empty());
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn missing_archive_names_the_path() {
        let jar = temp_path("missing.jar");
        let err = read_class_entries(&jar, false).unwrap_err();
        assert!(format!("{err:#}").contains("missing.jar"));
    }

    #[test]
    fn archive_and_nested_detection() {
        assert!(is_archive(Path::new("lib/app.JAR")));
        assert!(is_archive(Path::new("dist.zip")));
        assert!(!is_archive(Path::new("A.class")));
        assert!(is_nested_class_entry("a/b/Outer$1.class"));
        assert!(!is_nested_class_entry("a$b/Outer.class"));
    }
}
