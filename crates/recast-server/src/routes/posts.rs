//! Read access to stored posts.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use recast_store::StatusCounts;
use recast_types::{Category, Post, PostStatus};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Maximum allowed page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Query params for listing posts.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListPostsQuery {
    /// Only posts fetched from this account.
    pub target: Option<String>,
    /// Only posts in this status (`downloaded`, `processed`, `polished`, `published`).
    pub status: Option<String>,
    /// Only posts of this category code (1-6). Ignores `target` and `status`.
    pub category: Option<u8>,
    /// Maximum number of posts to return (default: 50, max: 100).
    #[param(minimum = 1, maximum = 100, default = 50)]
    pub limit: Option<usize>,
}

impl ListPostsQuery {
    fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Response for listing posts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListPostsResponse {
    /// Posts, most recent first.
    #[schema(value_type = Vec<Object>)]
    pub posts: Vec<Post>,
    pub total: usize,
}

/// A category code and its name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryInfo {
    pub code: u8,
    pub name: String,
}

/// Per-status post counts for one account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TargetStatsResponse {
    pub target: String,
    #[schema(value_type = Object)]
    pub counts: StatusCounts,
}

fn parse_status(s: &str) -> Result<PostStatus> {
    PostStatus::parse(&s.to_lowercase())
        .ok_or_else(|| ServerError::BadRequest(format!("Unknown post status '{s}'")))
}

pub(crate) fn parse_category(code: u8) -> Result<Category> {
    Category::from_code(code).ok_or_else(|| {
        ServerError::BadRequest(format!("Category must be between 1 and 6, got {code}"))
    })
}

/// GET /api/v1/posts - List stored posts.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(ListPostsQuery),
    responses(
        (status = 200, description = "Stored posts", body = ListPostsResponse),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "posts"
)]
pub async fn list_posts_handler(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ListPostsResponse>> {
    let limit = Some(query.effective_limit());
    let status = query.status.as_deref().map(parse_status).transpose()?;

    let posts = match (query.category, query.target.as_deref()) {
        (Some(code), _) => state.posts.list_by_category(parse_category(code)?, limit)?,
        (None, Some(target)) => state.posts.list_for_target(target, status, limit)?,
        (None, None) => state.posts.list_recent(status, limit)?,
    };

    let total = posts.len();
    Ok(Json(ListPostsResponse { posts, total }))
}

/// GET /api/v1/posts/{external_id} - One stored post.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{external_id}",
    params(
        ("external_id" = String, Path, description = "Source post ID"),
    ),
    responses(
        (status = 200, description = "The post"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "posts"
)]
pub async fn get_post_handler(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<Post>> {
    state
        .posts
        .find(&external_id)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Post {external_id}")))
}

/// GET /api/v1/targets/{target}/stats - Post counts per status.
#[utoipa::path(
    get,
    path = "/api/v1/targets/{target}/stats",
    params(
        ("target" = String, Path, description = "Source account"),
    ),
    responses(
        (status = 200, description = "Counts per status", body = TargetStatsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "posts"
)]
pub async fn target_stats_handler(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<Json<TargetStatsResponse>> {
    let counts = state.posts.count_by_status(&target)?;
    Ok(Json(TargetStatsResponse { target, counts }))
}

/// GET /api/v1/categories - Category codes.
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Category codes and names", body = Vec<CategoryInfo>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "posts"
)]
pub async fn categories_handler() -> Json<Vec<CategoryInfo>> {
    Json(
        Category::ALL
            .iter()
            .map(|c| CategoryInfo {
                code: c.code(),
                name: c.as_str().to_string(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerConfig;
    use crate::state::tests::test_state;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use recast_types::{NewPost, PostUpdate, now};
    use recast_workflow::testing::fetched;
    use serde_json::Value;
    use tower::ServiceExt;

    fn seeded_router() -> Router {
        let state = test_state(ServerConfig::default());
        state
            .posts
            .insert(NewPost::from_fetched("alice", fetched("a1", "buy now, big sale", 0)))
            .unwrap();
        state
            .posts
            .insert(NewPost::from_fetched("alice", fetched("a2", "breaking news today", 10)))
            .unwrap();
        state
            .posts
            .insert(NewPost::from_fetched("bob", fetched("b1", "just a thought", 5)))
            .unwrap();
        state
            .posts
            .apply_update(
                "a2",
                PostUpdate::new()
                    .category(Category::News)
                    .published("x-1", now()),
            )
            .unwrap();

        Router::new()
            .route("/posts", get(list_posts_handler))
            .route("/posts/{external_id}", get(get_post_handler))
            .route("/targets/{target}/stats", get(target_stats_handler))
            .route("/categories", get(categories_handler))
            .with_state(state)
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_effective_limit() {
        let mut query = ListPostsQuery::default();
        assert_eq!(query.effective_limit(), 50);
        query.limit = Some(1000);
        assert_eq!(query.effective_limit(), 100);
        query.limit = Some(0);
        assert_eq!(query.effective_limit(), 1);
    }

    #[tokio::test]
    async fn test_list_recent_across_targets() {
        let (status, body) = get_json(&seeded_router(), "/posts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        let ids: Vec<&str> = body["posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["external_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a2", "b1", "a1"]);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let router = seeded_router();

        let (_, body) = get_json(&router, "/posts?target=alice&status=published").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["posts"][0]["external_id"], "a2");

        let (_, body) = get_json(&router, "/posts?target=alice&limit=1").await;
        assert_eq!(body["total"], 1);

        let (_, body) = get_json(&router, "/posts?category=3").await;
        assert_eq!(body["posts"][0]["category"], "news");
    }

    #[tokio::test]
    async fn test_list_rejects_bad_filters() {
        let router = seeded_router();

        let (status, body) = get_json(&router, "/posts?status=archived").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");

        let (status, _) = get_json(&router, "/posts?category=9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_post() {
        let router = seeded_router();

        let (status, body) = get_json(&router, "/posts/a2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["published_id"], "x-1");

        let (status, _) = get_json(&router, "/posts/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_target_stats() {
        let (_, body) = get_json(&seeded_router(), "/targets/alice/stats").await;
        assert_eq!(body["counts"]["downloaded"], 1);
        assert_eq!(body["counts"]["published"], 1);
        assert_eq!(body["counts"]["processed"], 0);
    }

    #[tokio::test]
    async fn test_categories() {
        let (_, body) = get_json(&seeded_router(), "/categories").await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list[0]["code"], 1);
        assert_eq!(list[0]["name"], "general");
        assert_eq!(list[5]["name"], "thread");
    }
}
