//! GO enrichment (over-representation and gene-set).

use super::{archive_response, blocking};
use crate::archive::{self, EntryNames};
use crate::combos::{read_index, INDEX_FILE};
use crate::engine::{Invocation, ScriptKind};
use crate::error::{GatewayError, Result};
use crate::models::{EnrichRequest, GseGoRequest, StatusResponse};
use crate::server::AppState;
use crate::workdir::{self, OutputPolicy};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use std::time::SystemTime;
use tracing::info;

/// POST /api/enrichplot
///
/// Runs enrichGO for every combination listed in the DEG index under
/// `result_root` and returns everything under `output_root` as a zip.
/// Earlier outputs are kept and included, but the run itself must write
/// something.
pub async fn enrichplot(
    State(state): State<AppState>,
    Json(req): Json<EnrichRequest>,
) -> Result<Response> {
    workdir::require_dir(&req.result_root, "Result root")?;
    let combos = read_index(&req.result_root.join(INDEX_FILE))?;
    if combos.is_empty() {
        return Err(GatewayError::bad_input(format!(
            "{} lists no combinations",
            INDEX_FILE
        )));
    }

    let invocation = Invocation::new(ScriptKind::EnrichGo)
        .path(&req.result_root)?
        .path(&req.output_root)?
        .int(i64::from(req.show_category))
        .float(req.pvalue_cutoff)?
        .package(&req.org_db)?
        .float(req.plot_width)?
        .float(req.plot_height)?;

    let _guard = state.locks.acquire(&req.output_root).await;
    workdir::prepare(&req.output_root, OutputPolicy::Accumulate).await?;

    info!("Running enrichGO over {} combinations", combos.len());
    let started = SystemTime::now();
    state
        .engine
        .run_with_timeout(&invocation, state.enrichment_timeout)
        .await?;

    let root = req.output_root.clone();
    let archive = blocking(move || {
        let files = archive::collect(&root, EntryNames::Relative)?;
        let files = archive::require_fresh_output(files, &root, started)?;
        archive::zip_to_temp(&files)
    })
    .await?;

    Ok(archive_response(archive, "GO_enrichment.zip"))
}

/// POST /api/gsego
pub async fn gsego(
    State(state): State<AppState>,
    Json(req): Json<GseGoRequest>,
) -> Result<Json<StatusResponse>> {
    workdir::require_file(&req.file_path, "Ranked gene file")?;
    if req.min_gs_size > req.max_gs_size {
        return Err(GatewayError::bad_input(format!(
            "min_gs_size ({}) exceeds max_gs_size ({})",
            req.min_gs_size, req.max_gs_size
        )));
    }

    let invocation = Invocation::new(ScriptKind::GseGo)
        .path(&req.file_path)?
        .path(&req.out_dir)?
        .package(&req.orgdb)?
        .int(i64::from(req.min_gs_size))
        .int(i64::from(req.max_gs_size))
        .float(req.pvalue_cutoff)?;

    let _guard = state.locks.acquire(&req.out_dir).await;
    workdir::prepare(&req.out_dir, OutputPolicy::Accumulate).await?;

    let output = state.engine.run(&invocation).await?;
    Ok(Json(
        StatusResponse::new("GSEA GO analysis completed").with_stdout(output.stdout),
    ))
}
