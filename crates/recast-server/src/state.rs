//! Application state shared across handlers.

use std::sync::Arc;

use recast_social::RateLimitTracker;
use recast_store::PostStore;
use recast_workflow::Orchestrator;

use crate::config::ServerConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Starts and tracks workflow runs.
    pub orchestrator: Orchestrator,

    /// Post storage, read by the `/posts` routes.
    pub posts: Arc<PostStore>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Social API rate-limit windows (None when no social client is wired).
    pub rate_limits: Option<Arc<RateLimitTracker>>,

    /// Global API limiter sized from `config.api_rpm`.
    pub limiter: SharedRateLimiter,
}

impl AppState {
    /// Create a new application state.
    pub fn new(orchestrator: Orchestrator, posts: Arc<PostStore>, config: ServerConfig) -> Self {
        let limiter = create_rate_limiter(config.api_rpm);
        Self {
            orchestrator,
            posts,
            config: Arc::new(config),
            rate_limits: None,
            limiter,
        }
    }

    /// Expose the social client's rate-limit windows.
    pub fn with_rate_limits(mut self, tracker: Arc<RateLimitTracker>) -> Self {
        self.rate_limits = Some(tracker);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
