//! Liveness check: version, store reachability, and in-flight runs.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

/// Answer to `GET /health`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the post store does not answer.
    pub status: String,
    pub version: String,
    /// Whether the post store answered a trivial query.
    pub store_ok: bool,
    /// Workflow runs not yet terminal.
    pub active_workflows: usize,
}

/// GET /health - Unauthenticated liveness check.
///
/// Always answers 200 while the process serves requests; a broken store
/// shows up as `degraded`.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_ok = match state.posts.ping() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Post store did not answer health check");
            false
        }
    };

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_ok,
        active_workflows: state.orchestrator.registry().active_count(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
