use thiserror::Error;

use recast_types::CollaboratorError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Post already exists: {0}")]
    Duplicate(String),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for CollaboratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CollaboratorError::NotFound(format!("post {id}")),
            other => CollaboratorError::Failure(other.to_string()),
        }
    }
}
