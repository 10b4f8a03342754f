//! Collaborator contracts consumed by the workflow core.
//!
//! The traits are defined here so the workflow crate can drive the pipeline
//! without depending on the concrete social, LLM, or storage crates.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Category, CollaboratorResult, FetchedPost, NewPost, Post, PostStatus, PostUpdate};

/// Fetches recent posts for an account.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Fetch up to `count` of the most recent posts for `target`.
    ///
    /// Throttling upstream is reported as [`CollaboratorError::RateLimited`].
    ///
    /// [`CollaboratorError::RateLimited`]: crate::CollaboratorError::RateLimited
    async fn fetch_recent(&self, target: &str, count: usize)
    -> CollaboratorResult<Vec<FetchedPost>>;
}

/// Downloads media attached to a post.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download every URL, returning the local paths that succeeded.
    ///
    /// Best effort: individual failures are skipped, never escalated.
    async fn download(&self, external_id: &str, media_urls: &[String]) -> Vec<PathBuf>;
}

/// Produces rewritten text for a post.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, text: &str, category: Category) -> CollaboratorResult<String>;
}

/// Publishes text (and optional media) to the publish target.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish and return the identifier assigned by the target service.
    async fn publish(&self, text: &str, media_paths: &[PathBuf]) -> CollaboratorResult<String>;
}

/// Storage for fetched posts.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn exists(&self, external_id: &str) -> CollaboratorResult<bool>;

    async fn create(&self, post: NewPost) -> CollaboratorResult<Post>;

    async fn update(&self, external_id: &str, update: PostUpdate) -> CollaboratorResult<Post>;

    async fn get(&self, external_id: &str) -> CollaboratorResult<Option<Post>>;

    /// Posts for `target`, most recent first.
    async fn list_by_target(
        &self,
        target: &str,
        status: Option<PostStatus>,
        limit: Option<usize>,
    ) -> CollaboratorResult<Vec<Post>>;

    /// Posts of `category` across all targets, most recent first.
    async fn list_by_category(
        &self,
        category: Category,
        limit: Option<usize>,
    ) -> CollaboratorResult<Vec<Post>>;
}

pub type SharedPostFetcher = Arc<dyn PostFetcher>;
pub type SharedMediaDownloader = Arc<dyn MediaDownloader>;
pub type SharedRewriter = Arc<dyn Rewriter>;
pub type SharedPublisher = Arc<dyn Publisher>;
pub type SharedPostRepository = Arc<dyn PostRepository>;
