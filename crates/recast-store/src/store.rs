//! Post store backed by SQLite.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::{debug, info};

use recast_types::{
    Category, CollaboratorResult, NewPost, Post, PostRepository, PostStatus, PostUpdate, Timestamp,
};

use crate::{Result, StoreError};

/// Current schema version, tracked in `PRAGMA user_version`.
const SCHEMA_VERSION: i32 = 1;

const POST_COLUMNS: &str = "external_id, target, original_text, rewritten_text, category, status, \
     media_urls, local_media_paths, source_created_at, created_at, published_at, published_id";

/// Posts per status for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub downloaded: u64,
    pub processed: u64,
    pub polished: u64,
    pub published: u64,
}

/// Thin repository over SQLite for posts.
///
/// Thread-safe via an internal `Mutex<Connection>`.
pub struct PostStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for PostStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStore").finish_non_exhaustive()
    }
}

impl PostStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        info!(path = %path.display(), "Post store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        let current: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if current >= SCHEMA_VERSION {
            debug!(version = current, "Schema up to date");
            return Ok(());
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                external_id TEXT PRIMARY KEY,
                target TEXT NOT NULL,
                original_text TEXT NOT NULL,
                rewritten_text TEXT,
                category INTEGER,
                status TEXT NOT NULL,
                media_urls TEXT NOT NULL DEFAULT '[]',
                local_media_paths TEXT NOT NULL DEFAULT '[]',
                source_created_at TEXT,
                created_at TEXT NOT NULL,
                published_at TEXT,
                published_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_posts_target_status
                ON posts(target, status);
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        info!(from = current, to = SCHEMA_VERSION, "Post schema migrated");
        Ok(())
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Insert a newly fetched post with status `downloaded`.
    pub fn insert(&self, post: NewPost) -> Result<Post> {
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
            // Stored with microsecond precision.
            created_at: Utc::now().trunc_subsecs(6),
            published_at: None,
            published_id: None,
        };

        let conn = self.conn();
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO posts ({POST_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                stored.external_id,
                stored.target,
                stored.original_text,
                stored.rewritten_text,
                stored.category.map(Category::code),
                stored.status.as_str(),
                serde_json::to_string(&stored.media_urls)?,
                serde_json::to_string(&stored.local_media_paths)?,
                stored.source_created_at.map(format_dt),
                format_dt(stored.created_at),
                stored.published_at.map(format_dt),
                stored.published_id,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Duplicate(stored.external_id));
        }
        Ok(stored)
    }

    /// Apply a partial update. Fields left `None` keep their stored value.
    pub fn apply_update(&self, external_id: &str, update: PostUpdate) -> Result<Post> {
        let conn = self.conn();
        let mut post = query_post(&conn, external_id)?
            .ok_or_else(|| StoreError::NotFound(external_id.to_string()))?;

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
            post.published_at = Some(at.trunc_subsecs(6));
        }
        if let Some(id) = update.published_id {
            post.published_id = Some(id);
        }

        conn.execute(
            "UPDATE posts SET rewritten_text = ?2, category = ?3, status = ?4,
                 local_media_paths = ?5, published_at = ?6, published_id = ?7
             WHERE external_id = ?1",
            params![
                post.external_id,
                post.rewritten_text,
                post.category.map(Category::code),
                post.status.as_str(),
                serde_json::to_string(&post.local_media_paths)?,
                post.published_at.map(format_dt),
                post.published_id,
            ],
        )?;
        Ok(post)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Run a trivial query to confirm the database answers.
    pub fn ping(&self) -> Result<()> {
        self.conn().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    pub fn contains(&self, external_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM posts WHERE external_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn find(&self, external_id: &str) -> Result<Option<Post>> {
        query_post(&self.conn(), external_id)
    }

    /// Posts for `target`, most recent first.
    pub fn list_for_target(
        &self,
        target: &str,
        status: Option<PostStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE target = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY COALESCE(source_created_at, created_at) DESC, rowid DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![target, status.map(PostStatus::as_str), sql_limit(limit)],
            row_to_post,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Posts of one category across all targets, most recent first.
    pub fn list_by_category(
        &self,
        category: Category,
        limit: Option<usize>,
    ) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE category = ?1
             ORDER BY COALESCE(source_created_at, created_at) DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![category.code(), sql_limit(limit)], row_to_post)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent posts across all targets.
    pub fn list_recent(
        &self,
        status: Option<PostStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY COALESCE(source_created_at, created_at) DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            params![status.map(PostStatus::as_str), sql_limit(limit)],
            row_to_post,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Count posts per status for `target`.
    pub fn count_by_status(&self, target: &str) -> Result<StatusCounts> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM posts WHERE target = ?1 GROUP BY status")?;
        let rows = stmt.query_map(params![target], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            let n = u64::try_from(n).unwrap_or(0);
            match PostStatus::parse(&status) {
                Some(PostStatus::Downloaded) => counts.downloaded = n,
                Some(PostStatus::Processed) => counts.processed = n,
                Some(PostStatus::Polished) => counts.polished = n,
                Some(PostStatus::Published) => counts.published = n,
                None => debug!(status = %status, "Ignoring unknown post status"),
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl PostRepository for PostStore {
    async fn exists(&self, external_id: &str) -> CollaboratorResult<bool> {
        Ok(self.contains(external_id)?)
    }

    async fn create(&self, post: NewPost) -> CollaboratorResult<Post> {
        Ok(self.insert(post)?)
    }

    async fn update(&self, external_id: &str, update: PostUpdate) -> CollaboratorResult<Post> {
        Ok(self.apply_update(external_id, update)?)
    }

    async fn get(&self, external_id: &str) -> CollaboratorResult<Option<Post>> {
        Ok(self.find(external_id)?)
    }

    async fn list_by_target(
        &self,
        target: &str,
        status: Option<PostStatus>,
        limit: Option<usize>,
    ) -> CollaboratorResult<Vec<Post>> {
        Ok(self.list_for_target(target, status, limit)?)
    }

    async fn list_by_category(
        &self,
        category: Category,
        limit: Option<usize>,
    ) -> CollaboratorResult<Vec<Post>> {
        Ok(PostStore::list_by_category(self, category, limit)?)
    }
}

fn query_post(conn: &Connection, external_id: &str) -> Result<Option<Post>> {
    Ok(conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE external_id = ?1"),
            params![external_id],
            row_to_post,
        )
        .optional()?)
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
    limit
        .and_then(|n| i64::try_from(n).ok())
        .unwrap_or(-1)
}

fn format_dt(dt: Timestamp) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_dt(idx: usize, s: &str) -> rusqlite::Result<Timestamp> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_opt_dt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| parse_dt(idx, &s))
        .transpose()
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

#[derive(Debug, thiserror::Error)]
#[error("unknown value {0:?}")]
struct UnknownValue(String);

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let category = match row.get::<_, Option<u8>>(4)? {
        Some(code) => Some(
            Category::from_code(code)
                .ok_or_else(|| conversion_error(4, UnknownValue(code.to_string())))?,
        ),
        None => None,
    };
    let status_raw: String = row.get(5)?;
    let status = PostStatus::parse(&status_raw)
        .ok_or_else(|| conversion_error(5, UnknownValue(status_raw)))?;
    let local_media_paths: Vec<PathBuf> = parse_json(row, 7)?;

    Ok(Post {
        external_id: row.get(0)?,
        target: row.get(1)?,
        original_text: row.get(2)?,
        rewritten_text: row.get(3)?,
        category,
        status,
        media_urls: parse_json(row, 6)?,
        local_media_paths,
        source_created_at: parse_opt_dt(row, 8)?,
        created_at: parse_dt(9, &row.get::<_, String>(9)?)?,
        published_at: parse_opt_dt(row, 10)?,
        published_id: row.get(11)?,
    })
}
