use anyhow::{Context, Result};
use clap::Parser;
use class_meta::access::{class_kind, keywords};
use class_meta::cli::{Cli, Commands, OutputFormat};
use class_meta::config::{init_tracing, resolve_search_paths, resolve_threads};
use class_meta::filter::{
    AllModifiersFilter, AndFilter, AnnotationFilter, AnnotationScope, ClassFilter, ModifiersFilter,
    NameRegexFilter, SubclassFilter, direct_subclasses, find_matching,
};
use class_meta::finder::{ClassFinder, ScanConfig, ScanReport, UnitFailure};
use class_meta::model::{AnnotationRecord, AnnotationValue, ClassRecord};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let threads = resolve_threads(&cli)?;

    match cli.command {
        Commands::Scan {
            paths,
            subclass_of,
            annotated_with,
            member_annotated_with,
            modifiers,
            all_modifiers,
            name_regex,
            skip_inner,
            format,
        } => {
            let config = ScanConfig {
                threads,
                retain_bytecode: false,
                skip_inner,
            };
            let report = run_finder(config, &paths)?;

            let mut filter = AndFilter::new();
            if let Some(base) = subclass_of {
                filter.push(Box::new(SubclassFilter::new(normalize_class_name(&base))));
            }
            if let Some(name) = annotated_with {
                filter.push(Box::new(AnnotationFilter::new(
                    normalize_class_name(&name),
                    AnnotationScope::Class,
                )));
            }
            if let Some(name) = member_annotated_with {
                filter.push(Box::new(AnnotationFilter::new(
                    normalize_class_name(&name),
                    AnnotationScope::Member,
                )));
            }
            if all_modifiers {
                filter.push(Box::new(AllModifiersFilter::from_modifiers(&modifiers)));
            } else if !modifiers.is_empty() {
                filter.push(Box::new(ModifiersFilter::from_modifiers(&modifiers)));
            }
            if let Some(pattern) = name_regex {
                let regex = NameRegexFilter::new(&pattern)
                    .with_context(|| format!("Invalid --name-regex: {pattern}"))?;
                filter.push(Box::new(regex));
            }

            let result = scan_result(&report, &filter);
            write_output(&result, format, render_scan_text)?;
        }
        Commands::Show {
            class_name,
            paths,
            retain_bytecode,
            format,
        } => {
            let config = ScanConfig {
                threads,
                retain_bytecode,
                skip_inner: false,
            };
            let report = run_finder(config, &paths)?;
            let class_name = normalize_class_name(&class_name);
            let result = show_result(&report, &class_name)?;
            write_output(&result, format, render_show_text)?;
        }
    }

    Ok(())
}

fn run_finder(config: ScanConfig, paths: &[PathBuf]) -> Result<ScanReport> {
    let locations = resolve_search_paths(paths)?;
    let mut finder = ClassFinder::new(config);
    finder.add_locations(locations);
    finder.find()
}

/// Accept `com.foo.Bar`, `com/foo/Bar`, `com/foo/Bar.class` and
/// `import com.foo.Bar;`.
fn normalize_class_name(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("import ") {
        s = rest.trim();
    }
    if s.ends_with(';') {
        s = s.trim_end_matches(';').trim();
    }
    if let Some(rest) = s.strip_suffix(".class") {
        s = rest;
    }
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '/' { '.' } else { c })
        .collect()
}

#[derive(Debug, Serialize)]
struct ScanResult<'a> {
    scanned_units: usize,
    duplicates: usize,
    duration_ms: u64,
    failures: &'a [UnitFailure],
    classes: Vec<&'a ClassRecord>,
}

#[derive(Debug, Serialize)]
struct ShowResult<'a> {
    kind: &'static str,
    modifiers: Vec<&'static str>,
    class: &'a ClassRecord,
    direct_subclasses: Vec<&'a str>,
    bytecode_sha256: Option<String>,
    scanned_units: usize,
}

fn scan_result<'a, F: ClassFilter + ?Sized>(report: &'a ScanReport, filter: &F) -> ScanResult<'a> {
    ScanResult {
        scanned_units: report.units,
        duplicates: report.duplicates,
        duration_ms: report.duration_ms,
        failures: &report.failures,
        classes: find_matching(&report.classes, filter),
    }
}

fn show_result<'a>(report: &'a ScanReport, class_name: &str) -> Result<ShowResult<'a>> {
    let class = report.classes.get(class_name).with_context(|| {
        format!(
            "Class {class_name} not found ({} units scanned)",
            report.units
        )
    })?;

    Ok(ShowResult {
        kind: class_kind(class.access),
        modifiers: keywords(class.access),
        class,
        direct_subclasses: direct_subclasses(&report.classes, class_name)
            .into_iter()
            .map(|c| c.name.as_str())
            .collect(),
        bytecode_sha256: class.bytecode_digest(),
        scanned_units: report.units,
    })
}

fn write_output<T: Serialize>(
    result: &T,
    format: OutputFormat,
    render_text: fn(&T) -> String,
) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => render_text(result),
    };

    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn declaration(class: &ClassRecord) -> String {
    let mut out = String::new();
    for kw in keywords(class.access) {
        if kw == "enum" {
            continue;
        }
        out.push_str(kw);
        out.push(' ');
    }
    out.push_str(class_kind(class.access));
    out.push(' ');
    out.push_str(&class.name);
    if let Some(sup) = &class.superclass
        && sup != "java.lang.Object"
    {
        let _ = write!(out, " extends {sup}");
    }
    if !class.interfaces.is_empty() {
        let _ = write!(out, " implements {}", class.interfaces.join(", "));
    }
    out
}

fn render_scan_text(result: &ScanResult<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "scanned_units: {}", result.scanned_units);
    let _ = writeln!(out, "classes: {}", result.classes.len());
    let _ = writeln!(out, "duration_ms: {}", result.duration_ms);
    for class in &result.classes {
        let _ = writeln!(out, "- {}  [{}]", declaration(class), class.location.display());
    }
    for failure in result.failures {
        let _ = writeln!(
            out,
            "! {} {}: {}",
            failure.location,
            failure.entry.as_deref().unwrap_or(""),
            failure.message
        );
    }
    out
}

fn render_annotation(annotation: &AnnotationRecord) -> String {
    if annotation.params.is_empty() {
        return annotation.to_string();
    }
    let params: Vec<String> = annotation
        .params
        .iter()
        .map(|p| format!("{} = {}", p.name, render_value(&p.value)))
        .collect();
    format!("{annotation}({})", params.join(", "))
}

fn render_value(value: &AnnotationValue) -> String {
    match value {
        AnnotationValue::Byte(v) => v.to_string(),
        AnnotationValue::Char(v) => format!("'{v}'"),
        AnnotationValue::Short(v) => v.to_string(),
        AnnotationValue::Int(v) => v.to_string(),
        AnnotationValue::Long(v) => format!("{v}L"),
        AnnotationValue::Float(v) => format!("{v}f"),
        AnnotationValue::Double(v) => v.to_string(),
        AnnotationValue::Boolean(v) => v.to_string(),
        AnnotationValue::Str(v) => format!("{v:?}"),
        AnnotationValue::Enum {
            type_name,
            constant,
        } => format!("{type_name}.{constant}"),
        AnnotationValue::Class(desc) => format!("{desc}.class"),
        AnnotationValue::Annotation(inner) => render_annotation(inner),
        AnnotationValue::Array(items) => {
            let items: Vec<String> = items.iter().map(render_value).collect();
            format!("{{{}}}", items.join(", "))
        }
    }
}

fn member_line(kind: &str, access: u16, signature: &str) -> String {
    let mut words = vec![kind];
    words.extend(keywords(access));
    words.push(signature);
    format!("  {}", words.join(" "))
}

fn render_show_text(result: &ShowResult<'_>) -> String {
    let class = result.class;
    let mut out = String::new();
    for annotation in &class.annotations {
        let _ = writeln!(out, "{}", render_annotation(annotation));
    }
    let _ = writeln!(out, "{}", declaration(class));
    let _ = writeln!(out, "  location: {}", class.location.display());

    for field in &class.fields {
        for annotation in &field.annotations {
            let _ = writeln!(out, "  {}", render_annotation(annotation));
        }
        let mut line = member_line("field", field.access, &field.signature);
        if let Some(value) = &field.value {
            let _ = write!(line, " = {}", serde_json::to_string(value).unwrap_or_default());
        }
        let _ = writeln!(out, "{line}");
    }

    for method in &class.methods {
        for annotation in &method.annotations {
            let _ = writeln!(out, "  {}", render_annotation(annotation));
        }
        let mut line = member_line("method", method.access, &method.signature);
        if let Some(exceptions) = method.exceptions.as_ref().filter(|e| !e.is_empty()) {
            let _ = write!(line, " throws {}", exceptions.join(", "));
        }
        let _ = writeln!(out, "{line}");
    }

    if !result.direct_subclasses.is_empty() {
        let _ = writeln!(out, "direct_subclasses: {}", result.direct_subclasses.join(", "));
    }
    if let Some(digest) = &result.bytecode_sha256 {
        let _ = writeln!(out, "bytecode_sha256: {digest}");
    }
    out
}
