//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use recast_store::StoreError;
use recast_workflow::{ActionError, WorkflowError};

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database/storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The social or LLM service throttled a manual action.
    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// The social or LLM service rejected a manual action.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<WorkflowError> for ServerError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(msg) => ServerError::BadRequest(msg),
            WorkflowError::NotFound(id) => ServerError::NotFound(format!("Workflow {id}")),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<ActionError> for ServerError {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::Validation(msg) => ServerError::BadRequest(msg),
            ActionError::PostNotFound(id) => ServerError::NotFound(format!("Post {id}")),
            ActionError::NothingToDo(msg) => ServerError::NotFound(msg),
            ActionError::AlreadyPublished(id) => {
                ServerError::BadRequest(format!("Post {id} is already published"))
            }
            ActionError::Collaborator(err) if err.is_rate_limited() => {
                ServerError::UpstreamRateLimited(err.to_string())
            }
            ActionError::Collaborator(err) => ServerError::Upstream(err.to_string()),
            ActionError::Internal(msg) => ServerError::Internal(msg),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ServerError::NotFound(format!("Post {id}")),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ServerError::UpstreamRateLimited(_) => {
                (StatusCode::TOO_MANY_REQUESTS, "upstream_rate_limited")
            }
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
