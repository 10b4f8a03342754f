//! LLM client abstraction for Recast.
//!
//! The [`LlmBackend`] trait hides the provider; [`OpenAiBackend`] talks to
//! any OpenAI-compatible chat completions endpoint. [`LlmRewriter`] builds
//! on a backend to implement the pipeline's rewrite contract.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐
//! │ LlmRewriter  │ ──► │ LlmBackend trait │
//! └──────────────┘     └──────────────────┘
//!                          │          │
//!                          ▼          ▼
//!                    ┌──────────┐ ┌──────┐
//!                    │  OpenAI  │ │ Mock │
//!                    └──────────┘ └──────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod rewriter;
pub mod types;

pub use backend::{LlmBackend, SharedBackend, with_retry};
#[cfg(any(test, feature = "testing"))]
pub use backend::MockBackend;
pub use error::{LlmError, RateLimitInfo, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use rewriter::{LlmRewriter, MAX_POST_CHARS, clean_response, fit_to_limit};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};
