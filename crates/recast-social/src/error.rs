//! Social client error types.

use std::time::Duration;

use thiserror::Error;

use recast_types::CollaboratorError;

/// Result type for social client operations.
pub type Result<T> = std::result::Result<T, SocialError>;

/// Social client error type.
#[derive(Debug, Error)]
pub enum SocialError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading or writing a local media file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API throttled the request (429).
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Credentials missing or rejected (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Action not permitted (403).
    #[error("{0}")]
    Forbidden(String),

    /// Request rejected as malformed (400).
    #[error("{0}")]
    BadRequest(String),

    /// Resource does not exist (404, or an unknown account).
    #[error("{0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SocialError {
    /// Classify a non-success response.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        match status {
            429 => SocialError::RateLimited {
                message,
                retry_after,
            },
            401 => SocialError::Unauthorized(message),
            403 => SocialError::Forbidden(message),
            400 => SocialError::BadRequest(message),
            404 => SocialError::NotFound(message),
            _ => SocialError::Api { status, message },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SocialError::RateLimited { .. })
    }
}

impl From<SocialError> for CollaboratorError {
    fn from(err: SocialError) -> Self {
        match err {
            SocialError::RateLimited {
                message,
                retry_after,
            } => CollaboratorError::RateLimited {
                message,
                retry_after,
            },
            SocialError::Unauthorized(msg) => CollaboratorError::Unauthorized(msg),
            SocialError::Forbidden(msg) => CollaboratorError::Forbidden(msg),
            SocialError::BadRequest(msg) => CollaboratorError::MalformedContent(msg),
            SocialError::NotFound(msg) => CollaboratorError::NotFound(msg),
            other => CollaboratorError::Failure(other.to_string()),
        }
    }
}

/// Error body returned by the X API.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ApiErrorBody {
    pub title: Option<String>,
    pub detail: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorItem {
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl ApiErrorBody {
    /// Best human-readable message in the body, if any.
    pub fn message(&self) -> Option<String> {
        if let Some(detail) = &self.detail {
            return Some(detail.clone());
        }
        if let Some(title) = &self.title {
            return Some(title.clone());
        }
        self.errors
            .iter()
            .find_map(|e| e.detail.clone().or_else(|| e.message.clone()))
    }
}
