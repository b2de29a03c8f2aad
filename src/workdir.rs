//! Input checks and output-directory preparation.

use crate::error::{GatewayError, Result};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// What a route does to its output directory before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Remove any previous contents, then recreate.
    Recreate,
    /// Create if missing; keep existing files.
    Accumulate,
}

/// Require that an input file exists.
pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(GatewayError::bad_input(format!(
            "{} not found: {}",
            what,
            path.display()
        )));
    }
    Ok(())
}

/// Require that an input directory exists.
pub fn require_dir(path: &Path, what: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(GatewayError::bad_input(format!(
            "{} not found: {}",
            what,
            path.display()
        )));
    }
    Ok(())
}

/// Require a non-empty string field.
pub fn require_field(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::bad_input(format!("{} is required", field)));
    }
    Ok(())
}

/// Prepare `dir` according to `policy`.
pub async fn prepare(dir: &Path, policy: OutputPolicy) -> Result<()> {
    if policy == OutputPolicy::Recreate && tokio::fs::try_exists(dir).await.unwrap_or(false) {
        info!("Clearing previous output in {}", dir.display());
        tokio::fs::remove_dir_all(dir).await.map_err(|e| {
            GatewayError::bad_input(format!(
                "Cannot clear output directory {}: {}",
                dir.display(),
                e
            ))
        })?;
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        GatewayError::bad_input(format!(
            "Cannot create output directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    debug!("Output directory ready: {}", dir.display());
    Ok(())
}

/// Absolute form of `path` with symlinks resolved.
///
/// The deepest existing ancestor is canonicalized and the missing tail is
/// appended, so a path normalizes the same before and after it is created.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other.as_os_str()),
        }
    }

    let mut missing: Vec<OsString> = Vec::new();
    let mut existing = lexical.as_path();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

/// Whether `inner` is `outer` or lies somewhere below it.
pub fn is_within(inner: &Path, outer: &Path) -> bool {
    normalize(inner).starts_with(normalize(outer))
}

/// Parent directory of an input file, or `.` for bare names.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
