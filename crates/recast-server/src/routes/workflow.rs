//! Workflow endpoints: start, run, poll, list, and clean up pipeline runs.

use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use recast_social::RateLimitSnapshot;
use recast_workflow::{RunRequest, StepStatus, Summary, WorkflowSummary, WorkflowView};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Default age, in hours, past which `cleanup` drops records.
pub const DEFAULT_CLEANUP_HOURS: u64 = 24;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `execute` and `execute-sync`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    /// Account to fetch from. Falls back to `username`, then the configured default.
    /// Also accepted as `scrape_x_username`.
    #[serde(alias = "scrape_x_username")]
    pub target: Option<String>,
    /// Legacy name for `target`.
    pub username: Option<String>,
    /// Number of recent posts to fetch (1-100).
    pub count: Option<usize>,
    /// Category code (1-6). Also accepted as `tweet_type`.
    #[serde(alias = "tweet_type")]
    pub category: Option<u8>,
    /// Per-step timeout in seconds (10-300).
    #[serde(alias = "step_timeout_secs")]
    pub timeout: Option<u64>,
}

/// Response to a background `execute`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteResponse {
    pub workflow_id: String,
    #[schema(value_type = String)]
    pub status: StepStatus,
    pub message: String,
    #[schema(value_type = Object)]
    pub summary: Summary,
}

/// Response for listing workflows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListWorkflowsResponse {
    /// Workflow summaries, newest first.
    #[schema(value_type = Vec<Object>)]
    pub workflows: Vec<WorkflowSummary>,
    pub total_count: usize,
}

/// Query for `cleanup`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CleanupQuery {
    /// Drop records older than this many hours (default: 24).
    #[serde(default = "default_cleanup_hours")]
    #[param(default = 24)]
    pub max_age_hours: u64,
}

fn default_cleanup_hours() -> u64 {
    DEFAULT_CLEANUP_HOURS
}

/// Response for `cleanup`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub removed: usize,
    pub message: String,
}

/// Workflow subsystem health and effective settings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowHealthResponse {
    pub status: String,
    pub active_workflows: usize,
    pub total_workflows: usize,
    pub default_target: Option<String>,
    pub default_count: usize,
    pub step_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    pub auto_posting_enabled: bool,
}

/// Last observed social API rate-limit windows.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RateLimitStatusResponse {
    /// Whether a social client is reporting windows.
    pub tracking: bool,
    /// Window per endpoint.
    #[schema(value_type = Object)]
    pub endpoints: RateLimitSnapshot,
}

impl From<ExecuteRequest> for RunRequest {
    fn from(req: ExecuteRequest) -> Self {
        RunRequest {
            target: req.target,
            username: req.username,
            count: req.count,
            category: req.category,
            step_timeout_secs: req.timeout,
        }
    }
}

/// An empty body means "all defaults".
fn parse_execute_body(body: &Bytes) -> Result<RunRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    let request: ExecuteRequest = serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid request body: {e}")))?;
    Ok(request.into())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/workflow/execute - Start a run in the background.
#[utoipa::path(
    post,
    path = "/api/v1/workflow/execute",
    request_body = ExecuteRequest,
    responses(
        (status = 202, description = "Workflow accepted", body = ExecuteResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn execute_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ExecuteResponse>)> {
    let request = parse_execute_body(&body)?;
    let workflow_id = state.orchestrator.start(&request)?;
    let record = state.orchestrator.status(&workflow_id)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteResponse {
            workflow_id,
            status: record.status,
            message: "Workflow started in background".to_string(),
            summary: record.summary,
        }),
    ))
}

/// POST /api/v1/workflow/execute-sync - Run and wait for the result.
#[utoipa::path(
    post,
    path = "/api/v1/workflow/execute-sync",
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "Finished workflow with per-step results"),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn execute_sync_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WorkflowView>> {
    let request = parse_execute_body(&body)?;
    let record = state.orchestrator.run_to_completion(&request).await?;
    Ok(Json(WorkflowView::from(record)))
}

/// GET /api/v1/workflow/status/{id} - Poll one run.
#[utoipa::path(
    get,
    path = "/api/v1/workflow/status/{id}",
    params(
        ("id" = String, Path, description = "Workflow ID"),
    ),
    responses(
        (status = 200, description = "Workflow record with progress"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Workflow not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowView>> {
    let record = state.orchestrator.status(&id)?;
    Ok(Json(WorkflowView::from(record)))
}

/// GET /api/v1/workflow/list - List tracked runs.
#[utoipa::path(
    get,
    path = "/api/v1/workflow/list",
    responses(
        (status = 200, description = "Tracked workflows", body = ListWorkflowsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn list_handler(State(state): State<AppState>) -> Json<ListWorkflowsResponse> {
    let workflows: Vec<WorkflowSummary> = state
        .orchestrator
        .list()
        .iter()
        .map(WorkflowSummary::from)
        .collect();
    let total_count = workflows.len();
    Json(ListWorkflowsResponse {
        workflows,
        total_count,
    })
}

/// DELETE /api/v1/workflow/cleanup - Drop old records.
#[utoipa::path(
    delete,
    path = "/api/v1/workflow/cleanup",
    params(CleanupQuery),
    responses(
        (status = 200, description = "Records removed", body = CleanupResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn cleanup_handler(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Json<CleanupResponse> {
    let max_age = Duration::from_secs(query.max_age_hours.saturating_mul(3600));
    let removed = state.orchestrator.evict(max_age);
    Json(CleanupResponse {
        removed,
        message: format!(
            "Removed {removed} workflow(s) older than {} hour(s)",
            query.max_age_hours
        ),
    })
}

/// GET /api/v1/workflow/health - Workflow subsystem status.
#[utoipa::path(
    get,
    path = "/api/v1/workflow/health",
    responses(
        (status = 200, description = "Workflow health", body = WorkflowHealthResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn workflow_health_handler(
    State(state): State<AppState>,
) -> Json<WorkflowHealthResponse> {
    let registry = state.orchestrator.registry();
    let settings = state.orchestrator.settings();
    Json(WorkflowHealthResponse {
        status: "ok".to_string(),
        active_workflows: registry.active_count(),
        total_workflows: registry.len(),
        default_target: settings.default_target.clone(),
        default_count: settings.default_count,
        step_timeout_secs: settings.step_timeout.as_secs(),
        publish_timeout_secs: settings.publish_timeout.as_secs(),
        auto_posting_enabled: settings.auto_posting,
    })
}

/// GET /api/v1/workflow/rate-limit-status - Social API rate-limit windows.
#[utoipa::path(
    get,
    path = "/api/v1/workflow/rate-limit-status",
    responses(
        (status = 200, description = "Windows per endpoint", body = RateLimitStatusResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "workflow"
)]
pub async fn rate_limit_status_handler(
    State(state): State<AppState>,
) -> Json<RateLimitStatusResponse> {
    let response = match &state.rate_limits {
        Some(tracker) => RateLimitStatusResponse {
            tracking: true,
            endpoints: tracker.snapshot(),
        },
        None => RateLimitStatusResponse {
            tracking: false,
            endpoints: RateLimitSnapshot::new(),
        },
    };
    Json(response)
}
