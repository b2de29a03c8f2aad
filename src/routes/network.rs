//! Gene-concept network plots and STRING protein networks.

use super::{archive_response, blocking};
use crate::archive::{self, EntryNames};
use crate::combos;
use crate::engine::{Invocation, ScriptKind};
use crate::error::{GatewayError, Result};
use crate::models::{NetworkPlotRequest, StatusResponse, StringNetworkRequest};
use crate::server::AppState;
use crate::workdir::{self, OutputPolicy};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use std::path::Path;
use tracing::info;

/// Resolve which combinations a network plot covers.
///
/// Explicit names win; otherwise both thresholds must be given and are
/// matched against the DEG index.
fn selected_combos(req: &NetworkPlotRequest) -> Result<Vec<String>> {
    if let Some(ref names) = req.combo_names {
        let names: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(GatewayError::bad_input("combo_names must not be empty"));
        }
        return Ok(names);
    }

    match (req.fc_threshold, req.pval_threshold) {
        (Some(fc), Some(pval)) => {
            let root = req.combo_root.as_deref().unwrap_or(req.result_root.as_path());
            combos::select_from_index(root, fc, pval)
        }
        _ => Err(GatewayError::bad_input(
            "Provide combo_names or both fc_threshold and pval_threshold",
        )),
    }
}

/// `figure_root` is wiped before plotting, so it must not hold any of the
/// inputs the plot reads.
fn check_figure_root(req: &NetworkPlotRequest, selected: &[String]) -> Result<()> {
    let roots = std::iter::once(("result_root", req.result_root.as_path()))
        .chain(req.combo_root.as_deref().map(|p| ("combo_root", p)));
    for (field, root) in roots {
        if workdir::is_within(root, &req.figure_root) {
            return Err(GatewayError::bad_input(format!(
                "figure_root {} would clear {} {}",
                req.figure_root.display(),
                field,
                root.display()
            )));
        }
    }

    for name in selected {
        if workdir::is_within(&req.figure_root, &req.result_root.join(name)) {
            return Err(GatewayError::bad_input(format!(
                "figure_root {} lies inside the results for {}",
                req.figure_root.display(),
                name
            )));
        }
    }
    Ok(())
}

async fn network_plot(
    state: AppState,
    req: NetworkPlotRequest,
    kind: ScriptKind,
    download_name: &str,
) -> Result<Response> {
    workdir::require_dir(&req.result_root, "Result root")?;
    let selected = selected_combos(&req)?;
    check_figure_root(&req, &selected)?;

    let invocation = Invocation::new(kind)
        .path(&req.result_root)?
        .path(&req.figure_root)?
        .list(&selected)?
        .int(i64::from(req.show_category))
        .float(req.plot_width)?
        .float(req.plot_height)?;

    let _guard = state.locks.acquire(&req.figure_root).await;
    workdir::prepare(&req.figure_root, OutputPolicy::Recreate).await?;

    info!("Plotting {} for {}", kind, selected.join(", "));
    state.engine.run(&invocation).await?;

    let root = req.figure_root.clone();
    let archive = blocking(move || {
        let files = archive::collect(&root, EntryNames::Relative)?;
        let files = archive::require_output(files, &root)?;
        archive::zip_to_temp(&files)
    })
    .await?;

    Ok(archive_response(archive, download_name))
}

/// POST /api/cnetplot
pub async fn cnetplot(
    State(state): State<AppState>,
    Json(req): Json<NetworkPlotRequest>,
) -> Result<Response> {
    network_plot(state, req, ScriptKind::Cnetplot, "Cnetplots_combos.zip").await
}

/// POST /api/emapplot
pub async fn emapplot(
    State(state): State<AppState>,
    Json(req): Json<NetworkPlotRequest>,
) -> Result<Response> {
    network_plot(state, req, ScriptKind::Emapplot, "Emapplots_combos.zip").await
}

/// The combination file must name an entry directly inside `input_root`.
fn combo_file_in(input_root: &Path, combo_file: &str) -> Result<()> {
    workdir::require_field(combo_file, "combo_file")?;
    let name = Path::new(combo_file);
    if name.components().count() != 1 || name.file_name().is_none() {
        return Err(GatewayError::bad_input(format!(
            "combo_file must be a file name, got {:?}",
            combo_file
        )));
    }
    workdir::require_file(&input_root.join(name), "Combination file")
}

/// POST /api/run-string
pub async fn string_network(
    State(state): State<AppState>,
    Json(req): Json<StringNetworkRequest>,
) -> Result<Json<StatusResponse>> {
    workdir::require_dir(&req.input_root, "Input root")?;
    combo_file_in(&req.input_root, &req.combo_file)?;
    if !(0.0..=1.0).contains(&req.cutoff) {
        return Err(GatewayError::bad_input(format!(
            "cutoff must be between 0 and 1, got {}",
            req.cutoff
        )));
    }

    let invocation = Invocation::new(ScriptKind::StringNetwork)
        .path(&req.input_root)?
        .text(&req.combo_file)?
        .path(&req.output_dir)?
        .int(i64::from(req.taxon_id))
        .float(req.cutoff)?
        .int(i64::from(req.limit));

    let _guard = state.locks.acquire(&req.output_dir).await;
    workdir::prepare(&req.output_dir, OutputPolicy::Accumulate).await?;

    let output = state.engine.run(&invocation).await?;
    Ok(Json(
        StatusResponse::new("STRING network analysis completed").with_stdout(output.stdout),
    ))
}
