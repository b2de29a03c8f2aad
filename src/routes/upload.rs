//! CSV upload into a caller-chosen directory.

use crate::error::{GatewayError, Result};
use crate::models::UploadResponse;
use crate::server::AppState;
use crate::workdir::{self, OutputPolicy};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reduce a client-supplied file name to its final component.
fn sanitize_file_name(name: &str) -> Result<String> {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        return Err(GatewayError::bad_input(format!(
            "Invalid upload file name: {:?}",
            name
        )));
    }
    Ok(last.to_string())
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> GatewayError {
    GatewayError::bad_input(format!("Malformed upload: {}", e.body_text()))
}

/// POST /api/upload-csv
///
/// Multipart fields: `file` (the CSV) and `target_dir`. An existing file
/// with the same name is overwritten.
pub async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut target_dir: Option<PathBuf> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("file") => {
                let name = sanitize_file_name(field.file_name().unwrap_or_default())?;
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some((name, data));
            }
            Some("target_dir") => {
                let text = field.text().await.map_err(multipart_error)?;
                workdir::require_field(&text, "target_dir")?;
                target_dir = Some(PathBuf::from(text.trim()));
            }
            _ => {}
        }
    }

    let (name, data) = upload.ok_or_else(|| GatewayError::bad_input("file is required"))?;
    let target_dir = target_dir.ok_or_else(|| GatewayError::bad_input("target_dir is required"))?;

    let _guard = state.locks.acquire(&target_dir).await;
    workdir::prepare(&target_dir, OutputPolicy::Accumulate).await?;

    let path = save(&target_dir, &name, &data).await?;
    info!("Stored upload {} ({} bytes)", path.display(), data.len());

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        path,
    }))
}

async fn save(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
