//! OpenAPI documentation configuration.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{actions, health, posts, workflow};
use crate::error::ErrorResponse;

/// OpenAPI documentation for the Recast API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Recast API",
        description = "Fetch, classify, rewrite, and republish social posts",
        version = "1.0.0",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Local server"),
    ),
    paths(
        health::health,
        workflow::execute_handler,
        workflow::execute_sync_handler,
        workflow::status_handler,
        workflow::list_handler,
        workflow::cleanup_handler,
        workflow::workflow_health_handler,
        workflow::rate_limit_status_handler,
        posts::list_posts_handler,
        posts::get_post_handler,
        posts::target_stats_handler,
        posts::categories_handler,
        actions::download_handler,
        actions::dispatch_handler,
        actions::polish_handler,
        actions::publish_handler,
        actions::publish_latest_handler,
    ),
    components(
        schemas(
            ErrorResponse,
            health::HealthResponse,
            workflow::ExecuteRequest,
            workflow::ExecuteResponse,
            workflow::ListWorkflowsResponse,
            workflow::CleanupResponse,
            workflow::WorkflowHealthResponse,
            workflow::RateLimitStatusResponse,
            posts::ListPostsResponse,
            posts::CategoryInfo,
            posts::TargetStatsResponse,
            actions::DownloadRequest,
            actions::DispatchRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "workflow", description = "Pipeline runs"),
        (name = "posts", description = "Stored posts"),
        (name = "actions", description = "Manual download, rewrite, and publish"),
    )
)]
pub struct ApiDoc;

/// Add bearer token security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

/// Create the Swagger UI router.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi())
}
