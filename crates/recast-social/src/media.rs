//! Best-effort media downloads for fetched posts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use recast_types::MediaDownloader;

use crate::error::{Result, SocialError};

/// Default per-request download timeout.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "webp"];
const FALLBACK_EXTENSION: &str = ".jpg";

/// Downloads media into `{media_dir}/{external_id}/media_{index}{ext}`.
#[derive(Debug, Clone)]
pub struct HttpMediaDownloader {
    http: reqwest::Client,
    media_dir: PathBuf,
    timeout: Duration,
}

impl HttpMediaDownloader {
    pub fn new(media_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            media_dir: media_dir.into(),
            timeout,
        })
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Directory holding the media of one post.
    pub fn post_dir(&self, external_id: &str) -> PathBuf {
        self.media_dir.join(external_id)
    }

    async fn download_one(&self, dir: &Path, index: usize, url: &str) -> Result<PathBuf> {
        let response = self.http.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SocialError::from_status(
                status.as_u16(),
                format!("media download failed: HTTP {}", status.as_u16()),
                None,
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let ext = extension_for(url, content_type.as_deref());
        let bytes = response.bytes().await?;

        let path = dir.join(format!("media_{}{}", index, ext));
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Media saved");
        Ok(path)
    }
}

#[async_trait]
impl MediaDownloader for HttpMediaDownloader {
    async fn download(&self, external_id: &str, media_urls: &[String]) -> Vec<PathBuf> {
        if media_urls.is_empty() {
            return Vec::new();
        }

        let dir = self.post_dir(external_id);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(dir = %dir.display(), error = %e, "Cannot create media directory");
            return Vec::new();
        }

        let mut saved = Vec::with_capacity(media_urls.len());
        for (index, url) in media_urls.iter().enumerate() {
            match self.download_one(&dir, index, url).await {
                Ok(path) => saved.push(path),
                Err(e) => warn!(external_id, url = %url, error = %e, "Skipping media"),
            }
        }
        saved
    }
}

/// File extension (with dot) for a media URL.
///
/// Taken from the URL path when recognised, else from the content type.
pub fn extension_for(url: &str, content_type: Option<&str>) -> &'static str {
    if let Some(ext) = extension_from_url(url) {
        return ext;
    }
    match content_type.map(|ct| ct.split(';').next().unwrap_or(ct).trim()) {
        Some("image/jpeg") | Some("image/jpg") => ".jpg",
        Some("image/png") => ".png",
        Some("image/gif") => ".gif",
        Some("image/webp") => ".webp",
        Some("video/mp4") => ".mp4",
        _ => FALLBACK_EXTENSION,
    }
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == ext)
        .map(|known| match *known {
            "jpg" => ".jpg",
            "jpeg" => ".jpeg",
            "png" => ".png",
            "gif" => ".gif",
            "mp4" => ".mp4",
            _ => ".webp",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_url() {
        assert_eq!(extension_for("https://pbs.example/media/abc.PNG", None), ".png");
        assert_eq!(extension_for("https://pbs.example/a.jpeg?name=small", None), ".jpeg");
        assert_eq!(extension_for("https://video.example/v/clip.mp4#t=1", None), ".mp4");
    }

    #[test]
    fn test_extension_falls_back_to_content_type() {
        assert_eq!(
            extension_for("https://pbs.example/media/abc", Some("image/webp")),
            ".webp"
        );
        assert_eq!(
            extension_for("https://pbs.example/file.bin", Some("image/gif; charset=binary")),
            ".gif"
        );
        assert_eq!(extension_for("https://pbs.example/media/abc", None), ".jpg");
        assert_eq!(
            extension_for("https://pbs.example/media/abc", Some("application/octet-stream")),
            ".jpg"
        );
    }

    #[tokio::test]
    async fn test_empty_urls_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let downloader =
            HttpMediaDownloader::new(dir.path().join("media"), DEFAULT_DOWNLOAD_TIMEOUT).unwrap();
        assert!(downloader.download("1", &[]).await.is_empty());
        assert!(!dir.path().join("media").exists());
    }
}
