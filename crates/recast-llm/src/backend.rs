//! LLM backend trait, shared retry logic, and a mock backend for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures and rate limits).
/// A provider-supplied retry-after wins over the computed backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= max_retries => return Err(e),
            Err(e) => {
                let wait = e.retry_after().unwrap_or(backoff);
                tracing::warn!(
                    backend = backend_name,
                    attempt = attempt + 1,
                    max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for LLM backend providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for testing purposes.
///
/// Returns queued replies in order; once the queue is empty every call
/// fails with a backend error.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct MockBackend {
    replies: parking_lot::Mutex<std::collections::VecDeque<Result<CompletionResponse>>>,
    request_log: parking_lot::Mutex<Vec<CompletionRequest>>,
}

#[cfg(any(test, feature = "testing"))]
impl MockBackend {
    pub fn new(replies: Vec<Result<CompletionResponse>>) -> Self {
        Self {
            replies: parking_lot::Mutex::new(replies.into()),
            request_log: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// A mock backend with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(CompletionResponse::new(
            "mock_msg_1",
            "mock-model",
            text,
            crate::types::Usage::new(10, 20),
        ))])
    }

    /// A mock backend whose first call fails with `error`.
    pub fn with_error(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().push(request);
        self.replies.lock().pop_front().unwrap_or_else(|| {
            Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
