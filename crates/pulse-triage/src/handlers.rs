//! HTTP handlers for the triage intake.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/triage/incident` | Accept an incident report |
//! | `GET` | `/triage/incidents` | Most recent incidents, newest first |
//! | `GET` | `/health` | Liveness and incident count |

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, warn};

use crate::error::TriageError;
use crate::state::{TriageState, MAX_INCIDENTS};

/// Default page size for `GET /triage/incidents`.
const DEFAULT_LIMIT: usize = 50;

/// JSON body accepted by `POST /triage/incident`.
#[derive(Debug, serde::Deserialize)]
pub struct IncidentBody {
    /// Plain-text incident report.
    pub report: String,
}

/// Query parameters for `GET /triage/incidents`.
#[derive(Debug, serde::Deserialize)]
pub struct IncidentsQuery {
    /// Maximum number of incidents to return (default 50).
    pub limit: Option<usize>,
}

/// Report text from a request body: the `report` field of a JSON object,
/// or the whole body when it is not one.
pub fn extract_report(body: &str) -> Result<String, TriageError> {
    let report = serde_json::from_str::<IncidentBody>(body)
        .map_or_else(|_| body.to_owned(), |parsed| parsed.report);

    if report.trim().is_empty() {
        return Err(TriageError::EmptyReport);
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// POST /triage/incident
// ---------------------------------------------------------------------------

/// Store an incident report and answer `202 Accepted` with its id.
pub async fn receive_incident(
    State(state): State<Arc<TriageState>>,
    body: String,
) -> Result<impl IntoResponse, TriageError> {
    let report = extract_report(&body).inspect_err(|_| {
        warn!("rejected incident with empty report");
    })?;

    let incident = state.record(report).await;
    info!(
        id = %incident.id,
        headline = incident.report.lines().next().unwrap_or_default(),
        "incident received"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "accepted",
            "id": incident.id,
        })),
    ))
}

// ---------------------------------------------------------------------------
// GET /triage/incidents
// ---------------------------------------------------------------------------

/// List recent incidents, newest first.
pub async fn list_incidents(
    State(state): State<Arc<TriageState>>,
    Query(query): Query<IncidentsQuery>,
) -> Result<impl IntoResponse, TriageError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_INCIDENTS {
        return Err(TriageError::InvalidQuery(format!(
            "limit must be between 1 and {MAX_INCIDENTS}"
        )));
    }

    let incidents = state.recent(limit).await;
    Ok(Json(serde_json::json!({
        "count": incidents.len(),
        "incidents": incidents,
    })))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness check.
pub async fn health(State(state): State<Arc<TriageState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "incidents": state.len().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_uses_report_field() {
        let report = extract_report(r#"{"report": "INCIDENT REPORT"}"#);
        assert_eq!(report.ok().as_deref(), Some("INCIDENT REPORT"));
    }

    #[test]
    fn raw_body_is_the_report() {
        let report = extract_report("INCIDENT REPORT\nStatus: Bradycardia");
        assert_eq!(report.ok().as_deref(), Some("INCIDENT REPORT\nStatus: Bradycardia"));
    }

    #[test]
    fn blank_report_is_rejected() {
        assert!(matches!(extract_report(""), Err(TriageError::EmptyReport)));
        assert!(matches!(
            extract_report(r#"{"report": "  "}"#),
            Err(TriageError::EmptyReport)
        ));
    }
}
