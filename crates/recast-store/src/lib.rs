//! SQLite persistence for Recast posts.
//!
//! [`PostStore`] keeps one row per fetched post and implements the
//! [`recast_types::PostRepository`] contract used by the workflow pipeline.

pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{PostStore, StatusCounts};
