//! Post records as they move through the pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Category, Timestamp};

/// Processing status of a persisted post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Fetched and stored, not yet classified.
    Downloaded,
    /// Classified and waiting for a rewrite.
    Processed,
    /// Rewritten text is available.
    Polished,
    /// Sent to the publish target.
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Downloaded => "downloaded",
            PostStatus::Processed => "processed",
            PostStatus::Polished => "polished",
            PostStatus::Published => "published",
        }
    }

    /// Parse a status name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "downloaded" => Some(PostStatus::Downloaded),
            "processed" => Some(PostStatus::Processed),
            "polished" => Some(PostStatus::Polished),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }

    /// Whether a post in this status may be selected for publishing.
    pub fn is_publishable(self) -> bool {
        matches!(self, PostStatus::Polished | PostStatus::Downloaded)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item returned by the fetch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPost {
    pub external_id: String,
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: Option<Timestamp>,
}

/// A persisted post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub external_id: String,
    /// Account the post was fetched from.
    pub target: String,
    pub original_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub status: PostStatus,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub local_media_paths: Vec<PathBuf>,
    /// Creation time reported by the source service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_created_at: Option<Timestamp>,
    /// Time the post was stored locally.
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_id: Option<String>,
}

impl Post {
    /// The text that should be published: the rewrite when present.
    pub fn publish_text(&self) -> &str {
        self.rewritten_text
            .as_deref()
            .unwrap_or(self.original_text.as_str())
    }

    /// Recency key used when ordering posts.
    pub fn recency(&self) -> Timestamp {
        self.source_created_at.unwrap_or(self.created_at)
    }
}

/// Fields required to store a newly fetched post.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub external_id: String,
    pub target: String,
    pub original_text: String,
    pub media_urls: Vec<String>,
    pub local_media_paths: Vec<PathBuf>,
    pub source_created_at: Option<Timestamp>,
}

impl NewPost {
    /// Build a new post record from a fetched item.
    pub fn from_fetched(target: impl Into<String>, fetched: FetchedPost) -> Self {
        Self {
            external_id: fetched.external_id,
            target: target.into(),
            original_text: fetched.text,
            media_urls: fetched.media_urls,
            local_media_paths: Vec::new(),
            source_created_at: fetched.created_at,
        }
    }

    pub fn with_local_media(mut self, paths: Vec<PathBuf>) -> Self {
        self.local_media_paths = paths;
        self
    }
}

/// Partial update applied to a stored post. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostUpdate {
    pub rewritten_text: Option<String>,
    pub category: Option<Category>,
    pub status: Option<PostStatus>,
    pub local_media_paths: Option<Vec<PathBuf>>,
    pub published_at: Option<Timestamp>,
    pub published_id: Option<String>,
}

impl PostUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn rewritten_text(mut self, text: impl Into<String>) -> Self {
        self.rewritten_text = Some(text.into());
        self
    }

    pub fn published(mut self, published_id: impl Into<String>, at: Timestamp) -> Self {
        self.status = Some(PostStatus::Published);
        self.published_id = Some(published_id.into());
        self.published_at = Some(at);
        self
    }

    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
