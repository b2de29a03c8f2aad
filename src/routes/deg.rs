//! DEG filtering across every fold-change / p-value combination.

use crate::combos::INDEX_FILE;
use crate::engine::invocation::parse_float_list;
use crate::engine::{Invocation, ScriptKind};
use crate::error::{GatewayError, Result};
use crate::models::{DegRequest, StatusResponse};
use crate::server::AppState;
use crate::workdir::{self, OutputPolicy};
use axum::extract::State;
use axum::Json;
use tracing::info;

/// Result directory created next to the input CSV.
pub const RESULT_DIR: &str = "Deg";

/// POST /api/deg
///
/// Writes `FC<fc>_p<p>/filtered_gene_list.csv` for each pair plus the
/// combination index. Previous results are discarded.
pub async fn run_deg(
    State(state): State<AppState>,
    Json(req): Json<DegRequest>,
) -> Result<Json<StatusResponse>> {
    workdir::require_file(&req.csv_path, "CSV file")?;
    let fcs = parse_float_list(&req.fc_input, "fc_input")?;
    let pvals = parse_float_list(&req.pval_input, "pval_input")?;

    let result_dir = workdir::parent_dir(&req.csv_path).join(RESULT_DIR);
    let invocation = Invocation::new(ScriptKind::Deg)
        .path(&req.csv_path)?
        .float_list(&fcs)?
        .float_list(&pvals)?
        .path(&result_dir)?;

    let _guard = state.locks.acquire(&result_dir).await;
    workdir::prepare(&result_dir, OutputPolicy::Recreate).await?;

    let output = state.engine.run(&invocation).await?;

    if !result_dir.join(INDEX_FILE).is_file() {
        return Err(GatewayError::engine(format!(
            "DEG filtering finished but {} was not written",
            INDEX_FILE
        )));
    }

    info!(
        "DEG filtering wrote {} combinations into {}",
        fcs.len() * pvals.len(),
        result_dir.display()
    );
    Ok(Json(
        StatusResponse::new("DEG filtering completed successfully!").with_stdout(output.stdout),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use crate::combos::read_index;
    use crate::engine::ScriptKind;
    use crate::test_utils::{detail, post_json, write_gene_csv, FakeEngine};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    /// Shell stand-in for the DEG script: one directory per pair, the
    /// index, and a line of progress on stdout.
    const FAKE_DEG: &str = r#"
out="$4"
echo "combo" > "$out/combo_names.csv"
for fc in $(echo "$2" | tr ',' ' '); do
  for p in $(echo "$3" | tr ',' ' '); do
    mkdir -p "$out/FC${fc}_p${p}"
    head -n 3 "$1" > "$out/FC${fc}_p${p}/filtered_gene_list.csv"
    echo "FC${fc}_p${p}" >> "$out/combo_names.csv"
  done
done
echo "filtered $(($(wc -l < "$1") - 1)) genes"
"#;

    #[tokio::test]
    async fn test_deg_writes_every_combination() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Deg, FAKE_DEG);
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 100);

        let (status, body) = post_json(
            fake.app(),
            "/api/deg",
            json!({"csv_path": csv, "fc_input": "1,2", "pval_input": "0.05"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "DEG filtering completed successfully!");
        assert_eq!(json["stdout"], "filtered 100 genes\n");

        let deg = data.path().join("Deg");
        assert!(deg.join("FC1_p0.05/filtered_gene_list.csv").is_file());
        assert!(deg.join("FC2_p0.05/filtered_gene_list.csv").is_file());
        assert_eq!(
            read_index(&deg.join("combo_names.csv")).unwrap(),
            vec!["FC1_p0.05", "FC2_p0.05"]
        );
    }

    #[tokio::test]
    async fn test_deg_discards_previous_results() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Deg, FAKE_DEG);
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 5);
        let stale = data.path().join("Deg/FC9_p0.5");
        std::fs::create_dir_all(&stale).unwrap();

        let (status, _) = post_json(
            fake.app(),
            "/api/deg",
            json!({"csv_path": csv, "fc_input": "1.5", "pval_input": "0.01"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(!stale.exists());
        assert!(data.path().join("Deg/FC1.5_p0.01").is_dir());
    }

    #[tokio::test]
    async fn test_deg_rejects_bad_thresholds() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Deg, FAKE_DEG);
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 5);

        let (status, body) = post_json(
            fake.app(),
            "/api/deg",
            json!({"csv_path": csv, "fc_input": "1,x", "pval_input": "0.05"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("fc_input"));
        assert!(!data.path().join("Deg").exists());
    }

    #[tokio::test]
    async fn test_deg_without_index_is_engine_failure() {
        let fake = FakeEngine::new();
        fake.script(ScriptKind::Deg, "echo done");
        let data = TempDir::new().unwrap();
        let csv = write_gene_csv(data.path(), "counts.csv", 5);

        let (status, body) = post_json(
            fake.app(),
            "/api/deg",
            json!({"csv_path": csv, "fc_input": "1", "pval_input": "0.05"}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).contains("combo_names.csv"));
    }
}
