//! Test helpers: a stand-in engine that runs shell scripts.
//!
//! Scripts are written under the names the real R scripts use, and `sh` is
//! configured as the engine program, so the full invocation path is exercised
//! without an R installation.

use crate::config::ServerConfig;
use crate::engine::{Engine, EngineConfig, ScriptKind};
use crate::server::{build_router, AppState};
use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct FakeEngine {
    scripts: TempDir,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            scripts: TempDir::new().expect("create scripts dir"),
        }
    }

    /// Directory holding the fake scripts.
    pub fn dir(&self) -> &Path {
        self.scripts.path()
    }

    /// Install a shell body for `kind`.
    pub fn script(&self, kind: ScriptKind, body: &str) -> PathBuf {
        let path = self.scripts.path().join(kind.file_name());
        std::fs::write(&path, format!("set -e\n{}\n", body)).expect("write fake script");
        path
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.config())
    }

    /// Router wired to this engine.
    pub fn app(&self) -> Router {
        let state = AppState::new(self.engine(), Some(Duration::from_secs(30)));
        build_router(state, &ServerConfig::default())
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            program: "sh".to_string(),
            scripts_dir: self.scripts.path().to_path_buf(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Write a small DEG-style CSV with `rows` genes.
pub fn write_gene_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let mut content = String::from("Geneid,foldchange,pvalue,GroupA_1,GroupA_2,GroupB_1,GroupB_2\n");
    for i in 0..rows {
        content.push_str(&format!(
            "GENE{},{:.3},{:.4},{},{},{},{}\n",
            i,
            0.5 + (i % 7) as f64 * 0.4,
            0.001 + (i % 11) as f64 * 0.009,
            10 + i,
            12 + i,
            30 + i,
            28 + i
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write gene csv");
    path
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, body)
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> (StatusCode, Bytes) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    send(app, request).await
}

/// Error detail from a JSON error body.
pub fn detail(body: &Bytes) -> String {
    let json: serde_json::Value = serde_json::from_slice(body).expect("json error body");
    json["detail"].as_str().unwrap_or_default().to_string()
}

/// Sorted entry names of a zip held in memory.
pub fn zip_entries(body: &Bytes) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(body.to_vec())).expect("valid zip");
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    names
}
