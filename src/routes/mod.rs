//! HTTP routes, one module per family of analyses.
//!
//! Every handler follows the same shape: validate inputs, lock and prepare
//! the output directory, assemble an invocation, run the engine, collect.

pub mod deg;
pub mod enrichment;
pub mod gsea;
pub mod network;
pub mod plots;
pub mod upload;

use crate::archive::TempArchive;
use crate::error::{GatewayError, Result};
use crate::server::AppState;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

pub const SVG: &str = "image/svg+xml";
pub const ZIP: &str = "application/zip";

/// All analysis routes, mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/heatmap", post(plots::heatmap))
        .route("/volcano", post(plots::volcano))
        .route("/volcano/enhanced", post(plots::enhanced_volcano))
        .route("/pca", post(plots::pca))
        .route("/deg", post(deg::run_deg))
        .route("/enrichplot", post(enrichment::enrichplot))
        .route("/gsego", post(enrichment::gsego))
        .route("/cnetplot", post(network::cnetplot))
        .route("/emapplot", post(network::emapplot))
        .route("/run-string", post(network::string_network))
        .route("/ridgeplot", post(gsea::ridgeplot))
        .route("/run-gseaplot/total", post(gsea::gseaplot_total))
        .route("/run-gseaplot/term", post(gsea::gseaplot_term))
        .route("/pathway_gene", post(gsea::pathway_gene))
        .route("/upload-csv", post(upload::upload_csv))
}

fn disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', "_"))
}

/// A complete file held in memory.
pub fn file_response(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition(filename)),
        ],
        bytes,
    )
        .into_response()
}

/// A temp-file archive streamed to the client.
pub fn archive_response(archive: TempArchive, filename: &str) -> Response {
    let len = archive.len();
    (
        [
            (header::CONTENT_TYPE, ZIP.to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, disposition(filename)),
        ],
        archive.into_body(),
    )
        .into_response()
}

/// Run filesystem-heavy work off the async workers.
pub async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!("Background task failed: {}", e)))?
}
