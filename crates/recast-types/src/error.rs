//! Error taxonomy shared by all collaborators.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Classified failure reported by an external collaborator.
///
/// The display text always names the condition so it can be recorded on a
/// step without exposing transport internals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The upstream service is throttling requests.
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Credentials were missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials were valid but the action is not permitted.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The upstream service rejected the content itself.
    #[error("malformed content: {0}")]
    MalformedContent(String),

    /// The referenced resource does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other collaborator failure.
    #[error("collaborator failure: {0}")]
    Failure(String),
}

impl CollaboratorError {
    /// Create a rate-limited error without timing information.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a generic failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Returns true if this is a rate-limit condition.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Suggested wait before retrying, if the upstream provided one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_condition() {
        assert_eq!(
            CollaboratorError::rate_limited("too many posts").to_string(),
            "rate limited: too many posts"
        );
        assert_eq!(
            CollaboratorError::Forbidden("duplicate".to_string()).to_string(),
            "forbidden: duplicate"
        );
        assert_eq!(
            CollaboratorError::failure("boom").to_string(),
            "collaborator failure: boom"
        );
    }

    #[test]
    fn test_rate_limit_helpers() {
        let err = CollaboratorError::RateLimited {
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(15)),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(15)));

        let other = CollaboratorError::Unauthorized("bad token".to_string());
        assert!(!other.is_rate_limited());
        assert_eq!(other.retry_after(), None);
    }
}
