//! API routes.

pub mod actions;
pub mod health;
pub mod openapi;
pub mod posts;
pub mod workflow;

pub use actions::{
    DispatchRequest, DownloadRequest, PublishLatestQuery, dispatch_handler, download_handler,
    polish_handler, publish_handler, publish_latest_handler,
};
pub use health::health_routes;
pub use openapi::{ApiDoc, swagger_ui};
pub use posts::{
    CategoryInfo, ListPostsQuery, ListPostsResponse, TargetStatsResponse, categories_handler,
    get_post_handler, list_posts_handler, target_stats_handler,
};
pub use workflow::{
    CleanupQuery, CleanupResponse, ExecuteRequest, ExecuteResponse, ListWorkflowsResponse,
    RateLimitStatusResponse, WorkflowHealthResponse, cleanup_handler, execute_handler,
    execute_sync_handler, list_handler, rate_limit_status_handler, status_handler,
    workflow_health_handler,
};
