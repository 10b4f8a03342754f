//! Tracking of the rate-limit headers the X API returns.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use serde::Serialize;

const LIMIT_HEADER: &str = "x-rate-limit-limit";
const REMAINING_HEADER: &str = "x-rate-limit-remaining";
const RESET_HEADER: &str = "x-rate-limit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Last observed rate-limit window for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitWindow {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// When the window resets.
    pub reset_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

impl RateLimitWindow {
    /// Parse the window headers; `None` when the response carried none.
    pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Self> {
        let limit = header_u64(headers, LIMIT_HEADER);
        let remaining = header_u64(headers, REMAINING_HEADER);
        let reset_at = header_u64(headers, RESET_HEADER)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        if limit.is_none() && remaining.is_none() && reset_at.is_none() {
            return None;
        }

        Some(Self {
            limit,
            remaining,
            reset_at,
            observed_at: now,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Rate-limit windows keyed by endpoint, as exposed to callers.
pub type RateLimitSnapshot = BTreeMap<String, RateLimitWindow>;

/// Records the most recent window per endpoint.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    windows: RwLock<HashMap<String, RateLimitWindow>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the headers of a response from `endpoint`.
    pub fn record(&self, endpoint: &str, headers: &HeaderMap) {
        if let Some(window) = RateLimitWindow::from_headers(headers, Utc::now()) {
            if window.is_exhausted() {
                tracing::warn!(
                    endpoint,
                    reset_at = ?window.reset_at,
                    "Rate limit window exhausted"
                );
            }
            self.windows.write().insert(endpoint.to_string(), window);
        }
    }

    pub fn get(&self, endpoint: &str) -> Option<RateLimitWindow> {
        self.windows.read().get(endpoint).cloned()
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        self.windows
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// How long to wait before retrying a throttled request.
///
/// `retry-after` wins; otherwise the distance to `x-rate-limit-reset`.
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(secs) = header_u64(headers, RETRY_AFTER_HEADER) {
        return Some(Duration::from_secs(secs));
    }
    let reset = header_u64(headers, RESET_HEADER).and_then(|s| i64::try_from(s).ok())?;
    let wait = reset.saturating_sub(now.timestamp()).max(0);
    u64::try_from(wait).ok().map(Duration::from_secs)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
