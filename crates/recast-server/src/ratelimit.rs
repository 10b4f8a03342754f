//! Rate limiting and request logging middleware.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    state::{InMemoryState, NotKeyed},
};

use crate::error::ErrorResponse;
use crate::state::AppState;

/// Rate limiter type alias (uses default clock).
pub type SharedRateLimiter =
    Arc<RateLimiter<NotKeyed, InMemoryState, governor::clock::DefaultClock>>;

const FALLBACK_RPM: NonZeroU32 = NonZeroU32::MIN.saturating_add(59);

/// Create a rate limiter with the specified requests per minute.
///
/// Zero falls back to 60.
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_RPM);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Global (not per-IP) rate limiting for API endpoints.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.rate_limiting {
        return next.run(request).await;
    }

    match state.limiter.check() {
        Ok(()) => next.run(request).await,
        Err(_not_until) => {
            let retry_after = 1u64;

            tracing::warn!(
                path = %request.uri().path(),
                retry_after_seconds = retry_after,
                "Rate limit exceeded"
            );

            let body = ErrorResponse {
                code: "rate_limit_exceeded".to_string(),
                message: "Rate limit exceeded".to_string(),
            };
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}

/// Structured request logging middleware.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            %method,
            %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            %method,
            %path,
            status = status.as_u16(),
            duration_ms,
            "Request completed with client error"
        );
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), duration_ms, "Request completed");
    }

    response
}
