//! Manual post actions: download, rewrite, and publish outside a pipeline run.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use recast_types::Post;
use recast_workflow::{DispatchReport, PolishOutcome, PublishOutcome, RunRequest};

use super::posts::{ListPostsResponse, parse_category};
use crate::error::Result;
use crate::state::AppState;

/// Body of `POST /posts/download`. Both fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Account to fetch from. Also accepted as `username` or `scrape_x_username`.
    #[serde(alias = "username", alias = "scrape_x_username")]
    pub target: Option<String>,
    /// Number of recent posts to fetch (1-100).
    pub count: Option<usize>,
}

/// Body of `POST /posts/dispatch`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DispatchRequest {
    /// Category code (1-6). Also accepted as `tweet_type`.
    #[serde(alias = "tweet_type")]
    pub category: u8,
    /// Maximum posts to publish (1-50, default 50).
    pub limit: Option<usize>,
}

/// Query of `POST /targets/{target}/publish-latest`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PublishLatestQuery {
    /// Only consider posts of this category code (1-6).
    pub category: Option<u8>,
}

/// POST /api/v1/posts/download - Fetch and store new posts.
#[utoipa::path(
    post,
    path = "/api/v1/posts/download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Newly stored posts", body = ListPostsResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "The account returned no posts"),
        (status = 429, description = "Social API rate limit"),
    ),
    security(("bearer_auth" = [])),
    tag = "actions"
)]
pub async fn download_handler(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<ListPostsResponse>> {
    // Same defaults and bounds as a pipeline run.
    let params = state.orchestrator.validate(&RunRequest {
        target: request.target,
        count: request.count,
        ..RunRequest::default()
    })?;

    let posts: Vec<Post> = state
        .orchestrator
        .actions()
        .download(&params.target, params.count)
        .await?;
    let total = posts.len();
    Ok(Json(ListPostsResponse { posts, total }))
}

/// POST /api/v1/posts/dispatch - Rewrite and publish every eligible post of a category.
#[utoipa::path(
    post,
    path = "/api/v1/posts/dispatch",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Per-post results"),
        (status = 400, description = "Invalid category or limit"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "actions"
)]
pub async fn dispatch_handler(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<DispatchReport>> {
    let category = parse_category(request.category)?;
    let report = state
        .orchestrator
        .actions()
        .dispatch(category, request.limit)
        .await?;
    Ok(Json(report))
}

/// POST /api/v1/posts/{external_id}/polish - Rewrite one post.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{external_id}/polish",
    params(
        ("external_id" = String, Path, description = "Source post ID"),
    ),
    responses(
        (status = 200, description = "Rewritten text"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found"),
        (status = 502, description = "Rewrite backend failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "actions"
)]
pub async fn polish_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<PolishOutcome>> {
    Ok(Json(state.orchestrator.actions().polish(&external_id).await?))
}

/// POST /api/v1/posts/{external_id}/publish - Publish one post.
#[utoipa::path(
    post,
    path = "/api/v1/posts/{external_id}/publish",
    params(
        ("external_id" = String, Path, description = "Source post ID"),
    ),
    responses(
        (status = 200, description = "Published ID"),
        (status = 400, description = "Already published"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found"),
        (status = 429, description = "Social API rate limit"),
        (status = 502, description = "Publish rejected"),
    ),
    security(("bearer_auth" = [])),
    tag = "actions"
)]
pub async fn publish_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<PublishOutcome>> {
    Ok(Json(state.orchestrator.actions().publish(&external_id).await?))
}

/// POST /api/v1/targets/{target}/publish-latest - Publish the newest eligible post.
#[utoipa::path(
    post,
    path = "/api/v1/targets/{target}/publish-latest",
    params(
        ("target" = String, Path, description = "Source account"),
        PublishLatestQuery,
    ),
    responses(
        (status = 200, description = "Published ID"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No eligible post"),
        (status = 429, description = "Social API rate limit"),
    ),
    security(("bearer_auth" = [])),
    tag = "actions"
)]
pub async fn publish_latest_handler(
    State(state): State<AppState>,
    Path(target): Path<String>,
    Query(query): Query<PublishLatestQuery>,
) -> Result<Json<PublishOutcome>> {
    let category = query.category.map(parse_category).transpose()?;
    let outcome = state
        .orchestrator
        .actions()
        .publish_latest(&target, category)
        .await?;
    Ok(Json(outcome))
}
