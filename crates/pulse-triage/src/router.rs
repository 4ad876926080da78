//! Axum router construction for the triage intake.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::TriageState;

/// Build the triage router.
///
/// - `POST /triage/incident` -- accept an incident report
/// - `GET /triage/incidents` -- recent incidents
/// - `GET /health` -- liveness
///
/// Any other path answers 404.
pub fn build_router(state: Arc<TriageState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/triage/incident", post(handlers::receive_incident))
        .route("/triage/incidents", get(handlers::list_incidents))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
