//! Gene-set enrichment plots built from saved gseGO results.

use super::{blocking, file_response, ZIP};
use crate::archive::{self, EntryNames};
use crate::engine::{Invocation, ScriptKind};
use crate::error::{GatewayError, Result};
use crate::models::{GseaplotRequest, PathwayGeneRequest, RidgeplotRequest, StatusResponse};
use crate::server::AppState;
use crate::workdir::{self, OutputPolicy};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use std::path::Path;
use std::time::SystemTime;

/// Upper bound on gene-set size considered by the pathway heatmaps.
const MAX_SET_SIZE: i64 = 50;

/// Saved gseGO result for one ontology, as written by the gseGO step.
fn gse_result_file(input_dir: &Path, ont: &str) -> std::path::PathBuf {
    input_dir.join(format!("gse_{}.rds", ont))
}

/// POST /api/ridgeplot
pub async fn ridgeplot(
    State(state): State<AppState>,
    Json(req): Json<RidgeplotRequest>,
) -> Result<Json<StatusResponse>> {
    workdir::require_file(&req.input_file, "Ranked gene file")?;

    let invocation = Invocation::new(ScriptKind::Ridgeplot)
        .path(&req.input_file)?
        .path(&req.output_dir)?
        .float(req.width)?
        .float(req.height)?;

    let _guard = state.locks.acquire(&req.output_dir).await;
    workdir::prepare(&req.output_dir, OutputPolicy::Accumulate).await?;

    let output = state.engine.run(&invocation).await?;
    Ok(Json(
        StatusResponse::new("Ridgeplots generated").with_stdout(output.stdout),
    ))
}

/// POST /api/run-gseaplot/total
pub async fn gseaplot_total(
    State(state): State<AppState>,
    Json(req): Json<GseaplotRequest>,
) -> Result<Json<StatusResponse>> {
    workdir::require_dir(&req.input_dir, "GSEA result directory")?;

    let invocation = Invocation::new(ScriptKind::GseaplotTotal)
        .path(&req.input_dir)?
        .path(&req.output_dir)?
        .int(i64::from(req.top_n))
        .float(req.width)?
        .float(req.height)?;

    let _guard = state.locks.acquire(&req.output_dir).await;
    workdir::prepare(&req.output_dir, OutputPolicy::Accumulate).await?;

    state.engine.run(&invocation).await?;
    Ok(Json(StatusResponse::new(format!(
        "GSEA plots for the top {} terms saved to {}",
        req.top_n,
        req.output_dir.display()
    ))))
}

/// POST /api/run-gseaplot/term
pub async fn gseaplot_term(
    State(state): State<AppState>,
    Json(req): Json<GseaplotRequest>,
) -> Result<Json<StatusResponse>> {
    workdir::require_dir(&req.input_dir, "GSEA result directory")?;
    if req.idx < 1 {
        return Err(GatewayError::bad_input("idx must be 1 or greater"));
    }
    let ont = req.ont.code();
    workdir::require_file(&gse_result_file(&req.input_dir, ont), "gseGO result")?;

    let invocation = Invocation::new(ScriptKind::GseaplotTerm)
        .path(&req.input_dir)?
        .path(&req.output_dir)?
        .text(ont)?
        .int(i64::from(req.idx))
        .float(req.width)?
        .float(req.height)?;

    let _guard = state.locks.acquire(&req.output_dir).await;
    workdir::prepare(&req.output_dir, OutputPolicy::Accumulate).await?;

    state.engine.run(&invocation).await?;
    Ok(Json(StatusResponse::new(format!(
        "GSEA plot for {} term {} saved to {}",
        ont,
        req.idx,
        req.output_dir.display()
    ))))
}

/// POST /api/pathway_gene
///
/// Returns the top-level SVGs of `output_dir` as an in-memory zip with
/// flattened entry names. SVGs from earlier runs are included, but at least
/// one must come from this run.
pub async fn pathway_gene(
    State(state): State<AppState>,
    Json(req): Json<PathwayGeneRequest>,
) -> Result<Response> {
    workdir::require_file(&req.csv_path, "Expression CSV")?;
    workdir::require_dir(&req.edox_dir, "gseGO result directory")?;

    let invocation = Invocation::new(ScriptKind::PathwayGene)
        .path(&req.csv_path)?
        .path(&req.edox_dir)?
        .path(&req.output_dir)?
        .int(i64::from(req.top_pathways))
        .int(i64::from(req.top_genes_per_pathway))
        .int(MAX_SET_SIZE)
        .float(req.width)?
        .float(req.height)?;

    let _guard = state.locks.acquire(&req.output_dir).await;
    workdir::prepare(&req.output_dir, OutputPolicy::Accumulate).await?;

    let started = SystemTime::now();
    state.engine.run(&invocation).await?;

    let root = req.output_dir.clone();
    let bytes = blocking(move || {
        let files = archive::collect_matching(&root, EntryNames::Flatten, Some(1), |p| {
            p.extension().is_some_and(|e| e.eq_ignore_ascii_case("svg"))
        })?;
        let files = archive::require_fresh_output(files, &root, started)?;
        archive::zip_to_bytes(&files)
    })
    .await?;

    Ok(file_response(bytes, ZIP, "pathway_gene_heatplots.zip"))
}
