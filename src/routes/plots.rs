//! Single-image plots: heatmap, volcano and PCA.
//!
//! Each writes exactly one SVG next to its input CSV (or at a caller-chosen
//! path) and returns it. A stale copy is removed first so that an engine run
//! which silently writes nothing is reported instead of serving old output.

use super::{blocking, file_response, SVG};
use crate::archive::read_output;
use crate::engine::{Invocation, ScriptKind};
use crate::error::{GatewayError, Result};
use crate::models::{HeatmapRequest, PcaRequest, VolcanoRequest};
use crate::server::AppState;
use crate::workdir::{self, OutputPolicy};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use std::path::{Path, PathBuf};
use tracing::info;

const HEATMAP_FILE: &str = "heatmap2.svg";
const PCA_FILE: &str = "pca.svg";

/// Run a single-output invocation under the output directory lock and
/// return the produced SVG.
///
/// `output` is cleared before the run, so it must never name the input.
async fn render_svg(
    state: &AppState,
    invocation: Invocation,
    input: &Path,
    output: PathBuf,
    download_name: &str,
) -> Result<Response> {
    if workdir::normalize(&output) == workdir::normalize(input) {
        return Err(GatewayError::bad_input(format!(
            "output_svg must differ from csv_path: {}",
            output.display()
        )));
    }

    let out_dir = workdir::parent_dir(&output).to_path_buf();
    let _guard = state.locks.acquire(&out_dir).await;
    workdir::prepare(&out_dir, OutputPolicy::Accumulate).await?;
    remove_stale(&output).await?;

    state.engine.run(&invocation).await?;

    let path = output.clone();
    let bytes = blocking(move || read_output(&path)).await?;
    info!("Returning {} ({} bytes)", output.display(), bytes.len());
    Ok(file_response(bytes, SVG, download_name))
}

async fn remove_stale(output: &Path) -> Result<()> {
    match tokio::fs::remove_file(output).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GatewayError::bad_input(format!(
            "Cannot overwrite {}: {}",
            output.display(),
            e
        ))),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "plot.svg".to_string())
}

/// POST /api/heatmap
pub async fn heatmap(
    State(state): State<AppState>,
    Json(req): Json<HeatmapRequest>,
) -> Result<Response> {
    workdir::require_file(&req.csv_path, "CSV file")?;
    let output = workdir::parent_dir(&req.csv_path).join(HEATMAP_FILE);

    let invocation = Invocation::new(ScriptKind::Heatmap)
        .path(&req.csv_path)?
        .float(req.width)?
        .float(req.height)?
        .int(i64::from(req.top_n_genes))
        .path(&output)?;

    render_svg(&state, invocation, &req.csv_path, output, "heatmap.svg").await
}

fn volcano_output(req: &VolcanoRequest, prefix: &str) -> Result<PathBuf> {
    if let Some(ref path) = req.output_svg {
        return Ok(path.clone());
    }
    let name = format!(
        "{}_FC{}_p{}.svg",
        prefix,
        crate::engine::invocation::format_float(req.fc_cutoff)?,
        crate::engine::invocation::format_float(req.pval_cutoff)?
    );
    Ok(workdir::parent_dir(&req.csv_path).join(name))
}

async fn run_volcano(state: AppState, req: VolcanoRequest, kind: ScriptKind) -> Result<Response> {
    workdir::require_file(&req.csv_path, "CSV file")?;
    let prefix = match kind {
        ScriptKind::EnhancedVolcano => "enhanced_volcano",
        _ => "volcano",
    };
    let output = volcano_output(&req, prefix)?;

    let invocation = Invocation::new(kind)
        .path(&req.csv_path)?
        .float(req.fc_cutoff)?
        .float(req.pval_cutoff)?
        .path(&output)?;

    let download = file_name_of(&output);
    render_svg(&state, invocation, &req.csv_path, output, &download).await
}

/// POST /api/volcano
pub async fn volcano(
    State(state): State<AppState>,
    Json(req): Json<VolcanoRequest>,
) -> Result<Response> {
    run_volcano(state, req, ScriptKind::Volcano).await
}

/// POST /api/volcano/enhanced
pub async fn enhanced_volcano(
    State(state): State<AppState>,
    Json(req): Json<VolcanoRequest>,
) -> Result<Response> {
    run_volcano(state, req, ScriptKind::EnhancedVolcano).await
}

/// POST /api/pca
pub async fn pca(State(state): State<AppState>, Json(req): Json<PcaRequest>) -> Result<Response> {
    workdir::require_file(&req.csv_path, "CSV file")?;
    let output = req
        .output_svg
        .clone()
        .unwrap_or_else(|| workdir::parent_dir(&req.csv_path).join(PCA_FILE));

    let invocation = Invocation::new(ScriptKind::Pca)
        .path(&req.csv_path)?
        .path(&output)?
        .float(req.width)?
        .float(req.height)?
        .int(req.pointshape)
        .float(req.pointsize)?
        .float(req.text_size)?;

    let download = file_name_of(&output);
    render_svg(&state, invocation, &req.csv_path, output, &download).await
}

#[cfg(all(test, unix))]
mod tests {
    use crate::engine::ScriptKind;
    use crate::test_utils::{detail, post_json, write_gene_csv, FakeEngine};
    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_heatmap_returns_svg() {
        let fake = FakeEngine::new();
        fake.script(
            ScriptKind::Heatmap,
            r#"printf '<svg top="%s" w="%s"/>' "$4" "$2" > "$5""#,
        );
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 10);

        let (status, body) = post_json(
            fake.app(),
            "/api/heatmap",
            json!({"csv_path": csv, "width": 8.0, "height": 6.0, "top_n_genes": 50}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], br#"<svg top="50" w="8"/>"#);
        assert!(data.path().join("heatmap2.svg").exists());
    }

    #[tokio::test]
    async fn test_heatmap_missing_input_does_not_spawn() {
        let fake = FakeEngine::new();
        let marker = fake.dir().join("spawned");
        fake.script(
            ScriptKind::Heatmap,
            &format!("touch '{}'", marker.display()),
        );

        let (status, body) = post_json(
            fake.app(),
            "/api/heatmap",
            json!({"csv_path": "/nonexistent/omicsgw/in.csv", "width": 8, "height": 6, "top_n_genes": 5}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("not found"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_engine_failure_returns_stderr_and_no_file() {
        let fake = FakeEngine::new();
        fake.script(
            ScriptKind::Heatmap,
            r#"echo '<svg/>' > "$5"; echo 'Error: object foldchange not found' >&2; exit 1"#,
        );
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 3);

        let (status, body) = post_json(
            fake.app(),
            "/api/heatmap",
            json!({"csv_path": csv, "width": 8, "height": 6, "top_n_genes": 5}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail(&body), "Error: object foldchange not found\n");
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_engine_failure() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Pca, "true");
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 3);
        // A leftover from an earlier run must not be served.
        std::fs::write(data.path().join("pca.svg"), "<svg old/>").unwrap();

        let (status, body) =
            post_json(fake.app(), "/api/pca", json!({"csv_path": csv})).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).contains("was not generated"));
    }

    #[tokio::test]
    async fn test_pca_passes_defaults_in_order() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Pca, r#"echo "$3 $4 $5 $6 $7" > "$2""#);
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 3);

        let (status, body) =
            post_json(fake.app(), "/api/pca", json!({"csv_path": csv})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"8 6 16 3.5 4\n");
    }

    #[tokio::test]
    async fn test_volcano_derives_output_name() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Volcano, r#"echo "$2/$3" > "$4""#);
        fake.script(ScriptKind::EnhancedVolcano, r#"echo "enhanced" > "$4""#);
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "deg.csv", 3);
        let req = json!({"csv_path": csv, "fc_cutoff": 1.0, "pval_cutoff": 0.05});

        let (status, body) = post_json(fake.app(), "/api/volcano", req.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"1/0.05\n");
        assert!(data.path().join("volcano_FC1_p0.05.svg").exists());

        let (status, _) = post_json(fake.app(), "/api/volcano/enhanced", req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(data.path().join("enhanced_volcano_FC1_p0.05.svg").exists());
    }

    #[tokio::test]
    async fn test_output_naming_the_input_is_rejected() {
        let fake = FakeEngine::new();
        let marker = fake.dir().join("spawned");
        fake.script(ScriptKind::Pca, &format!("touch '{}'", marker.display()));
        fake.script(ScriptKind::Volcano, &format!("touch '{}'", marker.display()));
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 3);
        let original = std::fs::read(&csv).unwrap();
        let same_file = data.path().join(".").join("counts.csv");

        let (status, body) = post_json(
            fake.app(),
            "/api/pca",
            json!({"csv_path": csv, "output_svg": same_file}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("must differ"));

        let (status, _) = post_json(
            fake.app(),
            "/api/volcano",
            json!({"csv_path": csv, "output_svg": csv, "fc_cutoff": 1.0, "pval_cutoff": 0.05}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(std::fs::read(&csv).unwrap(), original);
        assert!(!marker.exists());
    }
}
