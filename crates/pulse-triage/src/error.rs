//! Error types for the triage intake.
//!
//! [`TriageError`] converts into an Axum response with a JSON body of the
//! form `{"error": ..., "status": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by the triage intake handlers.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// The request carried no report text.
    #[error("incident report is empty")]
    EmptyReport,

    /// An invalid query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl IntoResponse for TriageError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EmptyReport | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
