//! Bearer token authentication.
//!
//! When no token is configured the API is open (localhost mode).
//! Token comparison is constant-time.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::error::ErrorResponse;
use crate::state::AppState;

/// Authentication error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header.
    MissingToken,
    /// Header present but not `Bearer <token>`.
    InvalidFormat,
    /// Token did not match.
    InvalidToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidFormat => write!(f, "Invalid authorization format"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        };
        tracing::warn!(status = %status, error = %self, "Rejected request");

        let body = ErrorResponse {
            code: "unauthorized".to_string(),
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Compare two strings in constant time.
///
/// Length mismatches still perform a comparison so timing does not depend on
/// where the strings diverge.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Authentication middleware for the `/api/v1` routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    validate_request(&request, &state)?;
    Ok(next.run(request).await)
}

fn validate_request(request: &Request<Body>, state: &AppState) -> Result<(), AuthError> {
    let Some(expected) = state.config().auth_token.as_deref() else {
        return Ok(());
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use crate::ServerConfig;
    use axum::{Router, middleware, routing::get};
    use tower::ServiceExt;

    fn router(token: Option<&str>) -> Router {
        let state = test_state(ServerConfig::new(token.map(String::from)));
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn status_for(router: Router, header: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret-longer"));
        assert!(constant_time_eq("", ""));
    }

    #[tokio::test]
    async fn test_no_token_configured_allows_all() {
        assert_eq!(status_for(router(None), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_valid_token() {
        let status = status_for(router(Some("tok")), Some("Bearer tok")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rejections() {
        assert_eq!(
            status_for(router(Some("tok")), None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(router(Some("tok")), Some("Bearer nope")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(router(Some("tok")), Some("Basic dG9rOg==")).await,
            StatusCode::BAD_REQUEST
        );
    }
}
