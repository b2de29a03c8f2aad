//! Output collection and zip packaging.
//!
//! Archives are built either into a temp file, streamed to the client and
//! deleted once the body is dropped, or fully in memory for small outputs.

use crate::error::{GatewayError, Result};
use anyhow::Context;
use axum::body::{Body, Bytes};
use futures::stream;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempPath;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const STREAM_CHUNK: usize = 64 * 1024;

/// File timestamps come from a coarser clock than `SystemTime::now`.
const MTIME_SLACK: Duration = Duration::from_secs(1);

/// How archive entry names are derived from file paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryNames {
    /// Keep the path relative to the archived root.
    Relative,
    /// Use only the file name.
    Flatten,
}

/// A file selected for archiving.
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub entry_name: String,
}

/// Collect every regular file under `root`, sorted by entry name.
pub fn collect(root: &Path, names: EntryNames) -> Result<Vec<CollectedFile>> {
    collect_matching(root, names, None, |_| true)
}

/// Collect regular files under `root` that satisfy `filter`.
///
/// `max_depth` of `Some(1)` restricts the walk to the top level.
pub fn collect_matching<F>(
    root: &Path,
    names: EntryNames,
    max_depth: Option<usize>,
    filter: F,
) -> Result<Vec<CollectedFile>>
where
    F: Fn(&Path) -> bool,
{
    let mut walker = WalkDir::new(root).follow_links(false);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() || !filter(entry.path()) {
            continue;
        }

        let entry_name = match names {
            EntryNames::Relative => entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            EntryNames::Flatten => entry.file_name().to_string_lossy().to_string(),
        };

        files.push(CollectedFile {
            path: entry.path().to_path_buf(),
            entry_name,
        });
    }

    files.sort_by(|a, b| a.entry_name.cmp(&b.entry_name));
    debug!("Collected {} files under {}", files.len(), root.display());
    Ok(files)
}

/// Fail with an engine error when the engine left nothing behind.
pub fn require_output(files: Vec<CollectedFile>, root: &Path) -> Result<Vec<CollectedFile>> {
    if files.is_empty() {
        return Err(GatewayError::engine(format!(
            "Analysis ran but produced nothing in {}",
            root.display()
        )));
    }
    Ok(files)
}

/// Like [`require_output`], but at least one file must have been written
/// since `started`. Accumulated directories keep earlier runs' files, which
/// alone do not count as output.
pub fn require_fresh_output(
    files: Vec<CollectedFile>,
    root: &Path,
    started: SystemTime,
) -> Result<Vec<CollectedFile>> {
    let files = require_output(files, root)?;
    let cutoff = started.checked_sub(MTIME_SLACK).unwrap_or(started);
    let fresh = files.iter().any(|f| {
        std::fs::metadata(&f.path)
            .and_then(|m| m.modified())
            .is_ok_and(|modified| modified >= cutoff)
    });
    if !fresh {
        return Err(GatewayError::engine(format!(
            "Analysis ran but wrote nothing new in {}",
            root.display()
        )));
    }
    Ok(files)
}

fn write_zip<W: Write + Seek>(writer: W, files: &[CollectedFile]) -> anyhow::Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        zip.start_file(file.entry_name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", file.entry_name))?;
        let mut source = File::open(&file.path)
            .with_context(|| format!("Failed to open {}", file.path.display()))?;
        std::io::copy(&mut source, &mut zip)
            .with_context(|| format!("Failed to archive {}", file.path.display()))?;
    }

    zip.finish().context("Failed to finalize archive")
}

/// Build an archive in memory.
pub fn zip_to_bytes(files: &[CollectedFile]) -> Result<Vec<u8>> {
    let cursor = write_zip(Cursor::new(Vec::new()), files)?;
    Ok(cursor.into_inner())
}

/// An archive on disk that is deleted when dropped.
#[derive(Debug)]
pub struct TempArchive {
    file: File,
    path: TempPath,
    len: u64,
}

impl TempArchive {
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    /// Stream the archive; the file is removed once the body is dropped.
    pub fn into_body(self) -> Body {
        let TempArchive { file, path, .. } = self;
        let state = Some((tokio::fs::File::from_std(file), path));

        let chunks = stream::unfold(state, |state| async move {
            let (mut file, path) = state?;
            let mut buf = vec![0u8; STREAM_CHUNK];
            match file.read(&mut buf).await {
                Ok(0) => {
                    debug!("Archive sent, removing {}", path.display());
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), Some((file, path))))
                }
                Err(e) => Some((Err(e), None)),
            }
        });

        Body::from_stream(chunks)
    }
}

/// Build an archive into a uniquely named temp file.
pub fn zip_to_temp(files: &[CollectedFile]) -> Result<TempArchive> {
    let named = tempfile::Builder::new()
        .prefix("omicsgw-")
        .suffix(".zip")
        .tempfile()
        .context("Failed to create temporary archive")?;
    let (file, path) = named.into_parts();

    let mut file = write_zip(file, files)?;
    let len = file
        .seek(SeekFrom::End(0))
        .context("Failed to size archive")?;
    file.seek(SeekFrom::Start(0))
        .context("Failed to rewind archive")?;

    info!("Built archive of {} files ({} bytes)", files.len(), len);
    Ok(TempArchive { file, path, len })
}

/// Read a single output file produced by the engine.
pub fn read_output(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(GatewayError::engine(format!(
            "Analysis finished but {} was not generated",
            path.display()
        )));
    }
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(bytes)
}
