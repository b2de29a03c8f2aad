//! Script resolution.
//!
//! A script is taken from the configured scripts directory when present.
//! Otherwise the copy compiled into the binary is written to a scoped
//! temporary file that is removed when the handle drops.

use super::invocation::ScriptKind;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Script bodies shipped with the gateway.
pub fn embedded_body(kind: ScriptKind) -> &'static str {
    match kind {
        ScriptKind::Heatmap => include_str!("../../rcode/run_heatmap.R"),
        ScriptKind::Volcano => include_str!("../../rcode/run_volcano.R"),
        ScriptKind::EnhancedVolcano => include_str!("../../rcode/run_enhanced_volcano.R"),
        ScriptKind::Pca => include_str!("../../rcode/run_pca.R"),
        ScriptKind::Deg => include_str!("../../rcode/run_deg.R"),
        ScriptKind::EnrichGo => include_str!("../../rcode/run_enrichgo.R"),
        ScriptKind::GseGo => include_str!("../../rcode/run_gsego.R"),
        ScriptKind::Cnetplot => include_str!("../../rcode/run_cnetplot.R"),
        ScriptKind::Emapplot => include_str!("../../rcode/run_emapplot.R"),
        ScriptKind::Ridgeplot => include_str!("../../rcode/run_ridgeplot.R"),
        ScriptKind::GseaplotTotal => include_str!("../../rcode/run_gseaplot_total.R"),
        ScriptKind::GseaplotTerm => include_str!("../../rcode/run_gseaplot_term.R"),
        ScriptKind::PathwayGene => include_str!("../../rcode/run_pathway_gene.R"),
        ScriptKind::StringNetwork => include_str!("../../rcode/run_string.R"),
    }
}

/// A script ready to hand to the engine.
#[derive(Debug)]
pub enum ResolvedScript {
    /// Pre-authored file on disk.
    File(PathBuf),
    /// Embedded body materialized for the lifetime of this value.
    Temp(TempPath),
}

impl ResolvedScript {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedScript::File(path) => path,
            ResolvedScript::Temp(temp) => temp,
        }
    }

    /// Remove a temporary script now, reporting failures.
    ///
    /// Dropping also removes it, but silently.
    pub fn cleanup(self) -> std::io::Result<()> {
        match self {
            ResolvedScript::File(_) => Ok(()),
            ResolvedScript::Temp(temp) => temp.close(),
        }
    }
}

/// Locate the script for `kind`, falling back to the embedded body.
pub fn resolve(scripts_dir: &Path, kind: ScriptKind) -> Result<ResolvedScript> {
    let on_disk = scripts_dir.join(kind.file_name());
    if on_disk.is_file() {
        debug!("Using script file: {}", on_disk.display());
        return Ok(ResolvedScript::File(on_disk));
    }

    debug!("Materializing embedded script: {}", kind.file_name());
    materialize(kind.file_name(), embedded_body(kind)).map(ResolvedScript::Temp)
}

/// Kinds with no script file under `scripts_dir`; these run the built-in copy.
pub fn missing_from(scripts_dir: &Path) -> Vec<ScriptKind> {
    ScriptKind::ALL
        .into_iter()
        .filter(|kind| !scripts_dir.join(kind.file_name()).is_file())
        .collect()
}

/// Write a script body to a uniquely named temp file.
pub fn materialize(name: &str, body: &str) -> Result<TempPath> {
    let prefix = format!("omicsgw-{}-", name.trim_end_matches(".R"));
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".R")
        .tempfile()
        .context("Failed to create temporary script file")?;
    file.write_all(body.as_bytes())
        .context("Failed to write temporary script file")?;
    file.flush()
        .context("Failed to flush temporary script file")?;
    Ok(file.into_temp_path())
}
