//! HTTP API for Recast.
//!
//! Exposes the workflow orchestrator and the post store over REST:
//!
//! - start a pipeline run in the background, or run one and wait
//! - poll, list, and clean up tracked runs
//! - browse stored posts and category codes
//! - download, rewrite, and publish posts on demand
//! - inspect the social API rate-limit windows
//!
//! Token authentication, global rate limiting, and request logging are
//! applied as middleware. An OpenAPI document is served at
//! `/api/openapi.json` with Swagger UI at `/api/docs`.
//!
//! # Example
//!
//! ```ignore
//! use recast_server::{AppState, Server, ServerConfig};
//!
//! let config = ServerConfig::new(Some("secret-token".to_string()))
//!     .with_bind_address("127.0.0.1:8001".parse()?);
//! let state = AppState::new(orchestrator, posts, config);
//!
//! Server::from_state(state).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use auth::{AuthError, auth_middleware};
pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use ratelimit::{create_rate_limiter, rate_limit_middleware, request_logging_middleware};
pub use routes::ApiDoc;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The Recast HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router. Used as-is by both `run` and tests.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .merge(routes::swagger_ui())
            .nest("/api/v1", self.api_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        if let Some(cors) = self.cors_layer() {
            router = router.layer(cors);
        }

        router.with_state(self.state.clone())
    }

    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{delete, get, post};

        Router::new()
            .route("/workflow/execute", post(routes::execute_handler))
            .route("/workflow/execute-sync", post(routes::execute_sync_handler))
            .route("/workflow/status/{id}", get(routes::status_handler))
            .route("/workflow/list", get(routes::list_handler))
            .route("/workflow/cleanup", delete(routes::cleanup_handler))
            .route("/workflow/health", get(routes::workflow_health_handler))
            .route(
                "/workflow/rate-limit-status",
                get(routes::rate_limit_status_handler),
            )
            .route("/posts", get(routes::list_posts_handler))
            .route("/posts/{external_id}", get(routes::get_post_handler))
            .route("/targets/{target}/stats", get(routes::target_stats_handler))
            .route("/categories", get(routes::categories_handler))
            .route("/posts/download", post(routes::download_handler))
            .route("/posts/dispatch", post(routes::dispatch_handler))
            .route("/posts/{external_id}/polish", post(routes::polish_handler))
            .route("/posts/{external_id}/publish", post(routes::publish_handler))
            .route(
                "/targets/{target}/publish-latest",
                post(routes::publish_latest_handler),
            )
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Permissive when no origins are configured; unparseable origins are skipped.
    fn cors_layer(&self) -> Option<CorsLayer> {
        let config = self.state.config();
        if !config.cors {
            return None;
        }

        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if config.cors_origins.is_empty() {
            return Some(layer.allow_origin(Any));
        }

        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        Some(layer.allow_origin(AllowOrigin::list(origins)))
    }

    /// Serve on the configured address until the process exits.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Serve on `addr` until `shutdown` resolves, then drain open connections.
    pub async fn run_until(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read local address: {e}")))?;

        info!(addr = %local_addr, "Starting server");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        info!("Server stopped");
        Ok(())
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn server(config: ServerConfig) -> Server {
        Server::from_state(test_state(config))
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let app = server(ServerConfig::new(Some("test-token".to_string()))).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = server(ServerConfig::new(Some("test-token".to_string()))).router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/categories")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/categories")
                    .header("authorization", "Bearer test-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let app = server(ServerConfig::default()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc["info"]["title"], "Recast API");
    }

    #[tokio::test]
    async fn test_cors_preflight_when_enabled() {
        let app = server(ServerConfig::default()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/categories")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new(Some("my-token".to_string()))
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_rate_limiting(false)
            .with_api_rpm(30)
            .with_cors_origins(vec!["https://example.com".to_string()]);

        assert_eq!(config.auth_token, Some("my-token".to_string()));
        assert_eq!(config.bind_address.port(), 9000);
        assert!(!config.rate_limiting);
        assert_eq!(config.api_rpm, 30);
        assert_eq!(config.cors_origins.len(), 1);
        assert!(config.request_logging);
    }

    #[test]
    fn test_default_bind_address() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:8001".parse().unwrap());
    }
}
