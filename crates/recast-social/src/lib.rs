//! X (Twitter) collaborators for Recast.
//!
//! [`XClient`] implements both the fetch and publish contracts against the
//! X API v2 and records the rate-limit windows each response reports.
//! [`HttpMediaDownloader`] saves attached media next to the database so a
//! republished post can carry it.

pub mod client;
pub mod error;
pub mod media;
pub mod ratelimit;

pub use client::{DEFAULT_BASE_URL, XClient, XConfig};
pub use error::{Result, SocialError};
pub use media::{DEFAULT_DOWNLOAD_TIMEOUT, HttpMediaDownloader, extension_for};
pub use ratelimit::{RateLimitSnapshot, RateLimitTracker, RateLimitWindow};
