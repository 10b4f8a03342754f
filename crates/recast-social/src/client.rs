//! X API v2 client.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use recast_types::{CollaboratorResult, FetchedPost, PostFetcher, Publisher};

use crate::error::{ApiErrorBody, Result, SocialError};
use crate::ratelimit::{RateLimitSnapshot, RateLimitTracker, retry_after};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.x.com/2";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounds the timeline endpoint accepts for `max_results`.
const MIN_PAGE: usize = 5;
const MAX_PAGE: usize = 100;

/// Connection settings for [`XClient`].
#[derive(Debug, Clone)]
pub struct XConfig {
    pub base_url: String,
    /// App-only token used for reads.
    pub bearer_token: Option<String>,
    /// User-context token required for posting.
    pub user_access_token: Option<String>,
    pub timeout: Duration,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            user_access_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl XConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_user_access_token(mut self, token: impl Into<String>) -> Self {
        self.user_access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// X API client implementing the fetch and publish collaborators.
#[derive(Clone)]
pub struct XClient {
    http: reqwest::Client,
    config: XConfig,
    rate_limits: Arc<RateLimitTracker>,
}

impl XClient {
    pub fn new(config: XConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("recast/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            rate_limits: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn config(&self) -> &XConfig {
        &self.config
    }

    /// Shared tracker of the windows seen so far.
    pub fn rate_limits(&self) -> Arc<RateLimitTracker> {
        Arc::clone(&self.rate_limits)
    }

    pub fn rate_limit_snapshot(&self) -> RateLimitSnapshot {
        self.rate_limits.snapshot()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn read_token(&self) -> Result<&str> {
        self.config
            .bearer_token
            .as_deref()
            .or(self.config.user_access_token.as_deref())
            .ok_or_else(|| SocialError::Unauthorized("no bearer token configured".to_string()))
    }

    fn write_token(&self) -> Result<&str> {
        self.config.user_access_token.as_deref().ok_or_else(|| {
            SocialError::Unauthorized("no user access token configured for posting".to_string())
        })
    }

    /// Send a request, record its rate-limit headers, and decode the body.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await?;
        self.rate_limits.record(endpoint, response.headers());

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let wait = retry_after(response.headers(), Utc::now());
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        warn!(endpoint, status = status.as_u16(), %message, "X API request failed");
        Err(SocialError::from_status(status.as_u16(), message, wait))
    }

    /// Resolve a username to its account id.
    pub async fn lookup_user(&self, username: &str) -> Result<String> {
        let token = self.read_token()?;
        let request = self
            .http
            .get(self.url(&format!("users/by/username/{}", username)))
            .bearer_auth(token);

        let lookup: UserLookup = self.send("users/by/username", request).await?;
        lookup
            .data
            .map(|u| u.id)
            .ok_or_else(|| SocialError::NotFound(format!("user @{} not found", username)))
    }

    /// Most recent posts of `username`, newest first, at most `count`.
    pub async fn recent_posts(&self, username: &str, count: usize) -> Result<Vec<FetchedPost>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let user_id = self.lookup_user(username).await?;
        let max_results = count.clamp(MIN_PAGE, MAX_PAGE).to_string();
        let request = self
            .http
            .get(self.url(&format!("users/{}/tweets", user_id)))
            .bearer_auth(self.read_token()?)
            .query(&[
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,attachments"),
                ("expansions", "attachments.media_keys"),
                ("media.fields", "url,preview_image_url,type"),
            ]);

        let timeline: Timeline = self.send("users/tweets", request).await?;
        let posts: Vec<FetchedPost> = timeline.into_posts().into_iter().take(count).collect();

        info!(target = username, fetched = posts.len(), "Fetched recent posts");
        Ok(posts)
    }

    /// Upload one local media file and return its media id.
    pub async fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());
        let form = Form::new().part("media", Part::bytes(bytes).file_name(file_name));

        let request = self
            .http
            .post(self.url("media/upload"))
            .bearer_auth(self.write_token()?)
            .multipart(form);

        let uploaded: MediaUpload = self.send("media/upload", request).await?;
        uploaded
            .into_id()
            .ok_or_else(|| SocialError::Api {
                status: 200,
                message: "media upload returned no id".to_string(),
            })
    }

    /// Create a post; returns the new post id.
    pub async fn create_post(&self, text: &str, media_paths: &[PathBuf]) -> Result<String> {
        let token = self.write_token()?;

        let mut media_ids = Vec::with_capacity(media_paths.len());
        for path in media_paths {
            match self.upload_media(path).await {
                Ok(id) => media_ids.push(id),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping media upload"),
            }
        }

        let body = CreatePost {
            text,
            media: (!media_ids.is_empty()).then_some(MediaIds { media_ids }),
        };
        let request = self
            .http
            .post(self.url("tweets"))
            .bearer_auth(token)
            .json(&body);

        let created: Created = self.send("tweets", request).await?;
        info!(post_id = %created.data.id, chars = text.chars().count(), "Post published");
        Ok(created.data.id)
    }
}

#[async_trait]
impl PostFetcher for XClient {
    async fn fetch_recent(
        &self,
        target: &str,
        count: usize,
    ) -> CollaboratorResult<Vec<FetchedPost>> {
        Ok(self.recent_posts(target, count).await?)
    }
}

#[async_trait]
impl Publisher for XClient {
    async fn publish(&self, text: &str, media_paths: &[PathBuf]) -> CollaboratorResult<String> {
        debug!(media = media_paths.len(), "Publishing post");
        Ok(self.create_post(text, media_paths).await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(default)]
    data: Vec<TweetData>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    media: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    media_key: String,
    url: Option<String>,
    preview_image_url: Option<String>,
}

impl Timeline {
    fn into_posts(self) -> Vec<FetchedPost> {
        let media = self.includes.media;
        let resolve = |key: &String| {
            media
                .iter()
                .find(|m| &m.media_key == key)
                .and_then(|m| m.url.clone().or_else(|| m.preview_image_url.clone()))
        };

        self.data
            .into_iter()
            .map(|tweet| {
                let media_urls = tweet
                    .attachments
                    .map(|a| a.media_keys.iter().filter_map(&resolve).collect())
                    .unwrap_or_default();
                FetchedPost {
                    external_id: tweet.id,
                    text: tweet.text,
                    media_urls,
                    created_at: tweet.created_at,
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct CreatePost<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<MediaIds>,
}

#[derive(Debug, Serialize)]
struct MediaIds {
    media_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    data: CreatedData,
}

#[derive(Debug, Deserialize)]
struct CreatedData {
    id: String,
}

/// Upload responses carry `data.id` on v2 and `media_id_string` on v1.1.
#[derive(Debug, Deserialize)]
struct MediaUpload {
    data: Option<CreatedData>,
    media_id_string: Option<String>,
}

impl MediaUpload {
    fn into_id(self) -> Option<String> {
        self.data.map(|d| d.id).or(self.media_id_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = XConfig::default()
            .with_base_url("http://localhost:9000/2/")
            .with_bearer_token("app")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "http://localhost:9000/2");
        assert_eq!(config.bearer_token.as_deref(), Some("app"));
        assert!(config.user_access_token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_timeline_resolves_media() {
        let timeline: Timeline = serde_json::from_value(serde_json::json!({
            "data": [
                {"id": "2", "text": "with photo", "created_at": "2024-05-01T10:00:00.000Z",
                 "attachments": {"media_keys": ["3_1", "7_2", "missing"]}},
                {"id": "1", "text": "plain"}
            ],
            "includes": {"media": [
                {"media_key": "3_1", "type": "photo", "url": "https://pbs.example/a.jpg"},
                {"media_key": "7_2", "type": "video", "preview_image_url": "https://pbs.example/v.jpg"}
            ]}
        }))
        .unwrap();

        let posts = timeline.into_posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(
            posts[0].media_urls,
            vec!["https://pbs.example/a.jpg", "https://pbs.example/v.jpg"]
        );
        assert!(posts[0].created_at.is_some());
        assert!(posts[1].media_urls.is_empty());
        assert!(posts[1].created_at.is_none());
    }

    #[test]
    fn test_empty_timeline() {
        let timeline: Timeline =
            serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(timeline.into_posts().is_empty());
    }

    #[test]
    fn test_missing_tokens() {
        let client = XClient::new(XConfig::default()).unwrap();
        assert!(matches!(client.read_token(), Err(SocialError::Unauthorized(_))));
        assert!(matches!(client.write_token(), Err(SocialError::Unauthorized(_))));

        let client =
            XClient::new(XConfig::default().with_user_access_token("user")).unwrap();
        assert_eq!(client.read_token().unwrap(), "user");
    }

    #[test]
    fn test_upload_id_forms() {
        let v2: MediaUpload = serde_json::from_str(r#"{"data": {"id": "111"}}"#).unwrap();
        assert_eq!(v2.into_id().as_deref(), Some("111"));
        let v1: MediaUpload = serde_json::from_str(r#"{"media_id_string": "222"}"#).unwrap();
        assert_eq!(v1.into_id().as_deref(), Some("222"));
    }
}
