//! In-memory collaborators for tests.
//!
//! Enabled inside this crate's own tests and, for downstream crates, through
//! the `testing` feature.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use recast_types::{
    Category, CollaboratorError, CollaboratorResult, FetchedPost, MediaDownloader, NewPost, Post,
    PostFetcher, PostRepository, PostStatus, PostUpdate, Publisher, Rewriter, now,
};

use crate::steps::Collaborators;

/// Repository backed by a vector, preserving insertion order.
#[derive(Default)]
pub struct InMemoryRepository {
    posts: Mutex<Vec<Post>>,
    list_calls: Mutex<Vec<(Option<PostStatus>, Instant)>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored post, in insertion order.
    pub fn all(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    /// Status filter and instant of each `list_by_target` call.
    pub fn list_calls(&self) -> Vec<(Option<PostStatus>, Instant)> {
        self.list_calls.lock().clone()
    }
}

#[async_trait]
impl PostRepository for InMemoryRepository {
    async fn exists(&self, external_id: &str) -> CollaboratorResult<bool> {
        Ok(self
            .posts
            .lock()
            .iter()
            .any(|p| p.external_id == external_id))
    }

    async fn create(&self, post: NewPost) -> CollaboratorResult<Post> {
        let mut posts = self.posts.lock();
        if posts.iter().any(|p| p.external_id == post.external_id) {
            return Err(CollaboratorError::failure(format!(
                "post {} already exists",
                post.external_id
            )));
        }
        let stored = Post {
            external_id: post.external_id,
            target: post.target,
            original_text: post.original_text,
            rewritten_text: None,
            category: None,
            status: PostStatus::Downloaded,
            media_urls: post.media_urls,
            local_media_paths: post.local_media_paths,
            source_created_at: post.source_created_at,
            created_at: now(),
            published_at: None,
            published_id: None,
        };
        posts.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, external_id: &str, update: PostUpdate) -> CollaboratorResult<Post> {
        let mut posts = self.posts.lock();
        let post = posts
            .iter_mut()
            .find(|p| p.external_id == external_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("post {external_id}")))?;

        if let Some(text) = update.rewritten_text {
            post.rewritten_text = Some(text);
        }
        if let Some(category) = update.category {
            post.category = Some(category);
        }
        if let Some(status) = update.status {
            post.status = status;
        }
        if let Some(paths) = update.local_media_paths {
            post.local_media_paths = paths;
        }
        if let Some(at) = update.published_at {
            post.published_at = Some(at);
        }
        if let Some(id) = update.published_id {
            post.published_id = Some(id);
        }
        Ok(post.clone())
    }

    async fn get(&self, external_id: &str) -> CollaboratorResult<Option<Post>> {
        Ok(self
            .posts
            .lock()
            .iter()
            .find(|p| p.external_id == external_id)
            .cloned())
    }

    async fn list_by_target(
        &self,
        target: &str,
        status: Option<PostStatus>,
        limit: Option<usize>,
    ) -> CollaboratorResult<Vec<Post>> {
        self.list_calls.lock().push((status, Instant::now()));

        let mut matching: Vec<Post> = self
            .posts
            .lock()
            .iter()
            .rev()
            .filter(|p| p.target == target)
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        matching.sort_by_key(|p| std::cmp::Reverse(p.recency()));
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn list_by_category(
        &self,
        category: Category,
        limit: Option<usize>,
    ) -> CollaboratorResult<Vec<Post>> {
        let mut matching: Vec<Post> = self
            .posts
            .lock()
            .iter()
            .rev()
            .filter(|p| p.category == Some(category))
            .cloned()
            .collect();
        matching.sort_by_key(|p| std::cmp::Reverse(p.recency()));
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}

/// Fetcher returning a fixed batch, optionally slow or failing.
pub struct FakeFetcher {
    posts: Vec<FetchedPost>,
    delay: Option<Duration>,
    error: Option<CollaboratorError>,
    calls: Mutex<Vec<Instant>>,
}

impl FakeFetcher {
    pub fn new(posts: Vec<FetchedPost>) -> Self {
        Self {
            posts,
            delay: None,
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_error(mut self, error: CollaboratorError) -> Self {
        self.error = Some(error);
        self
    }

    /// Instants at which `fetch_recent` was entered.
    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PostFetcher for FakeFetcher {
    async fn fetch_recent(
        &self,
        _target: &str,
        count: usize,
    ) -> CollaboratorResult<Vec<FetchedPost>> {
        self.calls.lock().push(Instant::now());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(self.posts.iter().take(count).cloned().collect())
    }
}

/// Media downloader that "saves" every URL without touching the filesystem.
#[derive(Default)]
pub struct FakeMediaDownloader;

#[async_trait]
impl MediaDownloader for FakeMediaDownloader {
    async fn download(&self, external_id: &str, media_urls: &[String]) -> Vec<PathBuf> {
        (0..media_urls.len())
            .map(|i| PathBuf::from(format!("media/{external_id}/media_{i}.jpg")))
            .collect()
    }
}

/// Rewriter that prefixes the text, or always fails.
pub struct FakeRewriter {
    prefix: Option<String>,
    calls: Mutex<Vec<(String, Category)>>,
}

impl FakeRewriter {
    pub fn prefixing(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            prefix: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Category)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Rewriter for FakeRewriter {
    async fn rewrite(&self, text: &str, category: Category) -> CollaboratorResult<String> {
        self.calls.lock().push((text.to_string(), category));
        match &self.prefix {
            Some(prefix) => Ok(format!("{prefix}{text}")),
            None => Err(CollaboratorError::failure("rewrite backend unavailable")),
        }
    }
}

/// Publisher recording every call.
#[derive(Default)]
pub struct FakePublisher {
    error: Option<CollaboratorError>,
    published: Mutex<Vec<(String, Vec<PathBuf>)>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(error: CollaboratorError) -> Self {
        Self {
            error: Some(error),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Text and media paths of every successful publish.
    pub fn published(&self) -> Vec<(String, Vec<PathBuf>)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, text: &str, media_paths: &[PathBuf]) -> CollaboratorResult<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let mut published = self.published.lock();
        published.push((text.to_string(), media_paths.to_vec()));
        Ok(format!("pub-{}", published.len()))
    }
}

/// A full set of fakes with typed access to each one.
pub struct Fakes {
    pub fetcher: Arc<FakeFetcher>,
    pub media: Arc<FakeMediaDownloader>,
    pub rewriter: Arc<FakeRewriter>,
    pub publisher: Arc<FakePublisher>,
    pub repository: Arc<InMemoryRepository>,
}

impl Fakes {
    /// Fakes that succeed, fetching `posts`.
    pub fn new(posts: Vec<FetchedPost>) -> Self {
        Self {
            fetcher: Arc::new(FakeFetcher::new(posts)),
            media: Arc::new(FakeMediaDownloader),
            rewriter: Arc::new(FakeRewriter::prefixing("rewritten: ")),
            publisher: Arc::new(FakePublisher::new()),
            repository: Arc::new(InMemoryRepository::new()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: FakeFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn with_rewriter(mut self, rewriter: FakeRewriter) -> Self {
        self.rewriter = Arc::new(rewriter);
        self
    }

    pub fn with_publisher(mut self, publisher: FakePublisher) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            fetcher: self.fetcher.clone(),
            media: self.media.clone(),
            rewriter: self.rewriter.clone(),
            publisher: self.publisher.clone(),
            repository: self.repository.clone(),
        }
    }
}

/// A fetched item with a fixed creation time offset, in minutes, from a base.
pub fn fetched(external_id: &str, text: &str, minutes: i64) -> FetchedPost {
    let base = chrono::DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .ok();
    FetchedPost {
        external_id: external_id.to_string(),
        text: text.to_string(),
        media_urls: Vec::new(),
        created_at: base.map(|b| b + chrono::TimeDelta::minutes(minutes)),
    }
}

/// Helper for tests that need a map of statuses by id.
pub fn statuses(posts: &[Post]) -> HashMap<String, PostStatus> {
    posts
        .iter()
        .map(|p| (p.external_id.clone(), p.status))
        .collect()
}
