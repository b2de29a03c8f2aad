//! Error taxonomy shared by every route.
//!
//! Each variant maps onto one HTTP status class. Engine diagnostics are
//! carried verbatim so callers see exactly what the script printed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Caller-supplied path or parameter is invalid, or a filter matched nothing.
    #[error("{0}")]
    BadInput(String),

    /// A required index file is missing.
    #[error("{0}")]
    NotFound(String),

    /// The engine exited non-zero, or exited zero without producing output.
    #[error("{detail}")]
    EngineFailure { detail: String },

    /// The engine exceeded its allotted run time and was killed.
    #[error("analysis engine timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Local filesystem or serialization failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput(message.into())
    }

    pub fn engine(detail: impl Into<String>) -> Self {
        Self::EngineFailure {
            detail: detail.into(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::EngineFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            // Include the whole context chain for internal failures.
            GatewayError::Internal(e) => format!("{:#}", e),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self.detail());
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
