use anyhow::{Context, Result, bail};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

pub const CLASSPATH_ENV: &str = "CLASSPATH";
pub const THREADS_ENV: &str = "CLASS_META_THREADS";
pub const LOG_ENV: &str = "CLASS_META_LOG";

/// Search locations from the command line, falling back to `CLASSPATH`.
pub fn resolve_search_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    search_paths_from(paths, env::var_os(CLASSPATH_ENV))
}

pub fn search_paths_from(paths: &[PathBuf], classpath: Option<OsString>) -> Result<Vec<PathBuf>> {
    if !paths.is_empty() {
        return Ok(paths.to_vec());
    }

    let resolved: Vec<PathBuf> = classpath
        .iter()
        .flat_map(env::split_paths)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| {
            // `lib/*` on a classpath means every jar in `lib`.
            if p.file_name().is_some_and(|n| n == "*") {
                p.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
            } else {
                p
            }
        })
        .collect();

    if resolved.is_empty() {
        bail!("No search paths given and {CLASSPATH_ENV} is not set");
    }
    Ok(resolved)
}

pub fn resolve_threads(cli: &Cli) -> Result<Option<usize>> {
    threads_from(cli.threads, env::var(THREADS_ENV).ok())
}

pub fn threads_from(flag: Option<usize>, env_value: Option<String>) -> Result<Option<usize>> {
    if let Some(n) = flag {
        if n == 0 {
            bail!("Invalid --threads value: 0 (must be at least 1)");
        }
        return Ok(Some(n));
    }
    match env_value {
        Some(raw) if !raw.trim().is_empty() => {
            let n = raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid {THREADS_ENV} value: {raw}"))?;
            if n == 0 {
                bail!("Invalid {THREADS_ENV} value: {raw} (must be at least 1)");
            }
            Ok(Some(n))
        }
        _ => Ok(None),
    }
}

/// Default filter directive for a `-v` count.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose)))
}

pub fn init_tracing(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
