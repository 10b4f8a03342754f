//! Shared types for the Recast system.
//!
//! Holds the post model that flows through the pipeline, the category
//! heuristic, and the narrow collaborator traits the workflow core
//! depends on. Concrete collaborators live in their own crates.

pub mod category;
pub mod collaborator;
pub mod error;
pub mod post;

pub use category::Category;
pub use collaborator::{
    MediaDownloader, PostFetcher, PostRepository, Publisher, Rewriter, SharedMediaDownloader,
    SharedPostFetcher, SharedPostRepository, SharedPublisher, SharedRewriter,
};
pub use error::{CollaboratorError, CollaboratorResult};
pub use post::{FetchedPost, NewPost, Post, PostStatus, PostUpdate};

/// Timestamp type used across the workspace.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current UTC time.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
