//! Manual post actions outside a tracked pipeline run.
//!
//! These reuse the step logic against single posts or a whole category.
//! Each action runs on its own task, so a caller that goes away cannot stop
//! a publish between the upstream call and the status update.

use std::future::Future;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use recast_types::{Category, Post, PostStatus, PostUpdate};

use crate::error::{ActionError, ActionResult};
use crate::orchestrator::COUNT_RANGE;
use crate::steps::{self, Collaborators, PUBLISH_CANDIDATE_WINDOW};

/// Accepted range for a dispatch `limit`.
pub const DISPATCH_LIMIT_RANGE: RangeInclusive<usize> = 1..=PUBLISH_CANDIDATE_WINDOW;

/// Result of rewriting one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolishOutcome {
    pub external_id: String,
    pub rewritten_text: String,
    /// True when the post already had a rewrite and nothing was changed.
    pub already_polished: bool,
}

/// Result of publishing one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub external_id: String,
    pub published_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Published,
    Failed,
}

/// Per-post entry of a category dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchItem {
    pub external_id: String,
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of publishing every eligible post of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub category: Category,
    pub processed_count: usize,
    pub results: Vec<DispatchItem>,
}

/// Download, rewrite, and publish posts on demand.
#[derive(Clone)]
pub struct PostActions {
    ctx: Collaborators,
}

impl PostActions {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { ctx: collaborators }
    }

    /// Fetch up to `count` posts for `target` and store the unknown ones.
    ///
    /// Returns the newly stored posts. An empty fetch is `NothingToDo`.
    pub async fn download(&self, target: &str, count: usize) -> ActionResult<Vec<Post>> {
        let target = target.trim().trim_start_matches('@').to_string();
        if target.is_empty() {
            return Err(ActionError::Validation("target is required".to_string()));
        }
        if !COUNT_RANGE.contains(&count) {
            return Err(ActionError::Validation(format!(
                "count must be between {} and {}, got {count}",
                COUNT_RANGE.start(),
                COUNT_RANGE.end()
            )));
        }
        detached(download_new(self.ctx.clone(), target, count)).await
    }

    /// Rewrite one post, classifying it first when it has no category.
    ///
    /// A rewrite failure is returned, not replaced by the original text.
    pub async fn polish(&self, external_id: &str) -> ActionResult<PolishOutcome> {
        detached(polish_one(self.ctx.clone(), external_id.to_string())).await
    }

    /// Publish one stored post.
    pub async fn publish(&self, external_id: &str) -> ActionResult<PublishOutcome> {
        detached(publish_one(self.ctx.clone(), external_id.to_string())).await
    }

    /// Publish the most recent eligible post for `target`, the same pick the
    /// pipeline's publish step makes.
    pub async fn publish_latest(
        &self,
        target: &str,
        category: Option<Category>,
    ) -> ActionResult<PublishOutcome> {
        let target = target.trim_start_matches('@').to_string();
        detached(publish_newest(self.ctx.clone(), target, category)).await
    }

    /// Rewrite and publish every unpublished post of `category`, newest first.
    ///
    /// A failed publish is reported on its entry and the rest continue. A rate
    /// limit stops the dispatch; the remaining posts stay eligible.
    pub async fn dispatch(
        &self,
        category: Category,
        limit: Option<usize>,
    ) -> ActionResult<DispatchReport> {
        if let Some(limit) = limit
            && !DISPATCH_LIMIT_RANGE.contains(&limit)
        {
            return Err(ActionError::Validation(format!(
                "limit must be between {} and {}, got {limit}",
                DISPATCH_LIMIT_RANGE.start(),
                DISPATCH_LIMIT_RANGE.end()
            )));
        }
        let limit = limit.unwrap_or(*DISPATCH_LIMIT_RANGE.end());
        detached(dispatch_category(self.ctx.clone(), category, limit)).await
    }
}

async fn download_new(ctx: Collaborators, target: String, count: usize) -> ActionResult<Vec<Post>> {
    let fetched = ctx.fetcher.fetch_recent(&target, count).await?;
    if fetched.is_empty() {
        return Err(ActionError::NothingToDo(format!("no posts found for {target}")));
    }
    let batch = steps::store_new(&ctx, &target, fetched).await?;
    info!(
        target = %target,
        saved = batch.saved.len(),
        skipped = batch.skipped,
        "Manual download finished"
    );
    Ok(batch.saved)
}

async fn polish_one(ctx: Collaborators, external_id: String) -> ActionResult<PolishOutcome> {
    let post = find(&ctx, &external_id).await?;
    if let Some(text) = post.rewritten_text {
        return Ok(PolishOutcome {
            external_id,
            rewritten_text: text,
            already_polished: true,
        });
    }

    let category = post
        .category
        .unwrap_or_else(|| Category::classify(&post.original_text));
    let text = ctx.rewriter.rewrite(&post.original_text, category).await?;

    let mut update = PostUpdate::new()
        .rewritten_text(text.as_str())
        .category(category);
    if post.status != PostStatus::Published {
        update = update.status(PostStatus::Polished);
    }
    ctx.repository.update(&external_id, update).await?;
    info!(external_id = %external_id, category = %category, "Post polished");

    Ok(PolishOutcome {
        external_id,
        rewritten_text: text,
        already_polished: false,
    })
}

async fn publish_one(ctx: Collaborators, external_id: String) -> ActionResult<PublishOutcome> {
    let post = find(&ctx, &external_id).await?;
    if post.status == PostStatus::Published || post.published_id.is_some() {
        return Err(ActionError::AlreadyPublished(external_id));
    }
    let published_id = steps::publish_post(&ctx, &post).await?;
    info!(external_id = %external_id, published_id = %published_id, "Post published");
    Ok(PublishOutcome {
        external_id,
        published_id,
    })
}

async fn publish_newest(
    ctx: Collaborators,
    target: String,
    category: Option<Category>,
) -> ActionResult<PublishOutcome> {
    let post = steps::latest_candidate(&ctx, &target, category)
        .await?
        .ok_or_else(|| ActionError::NothingToDo(format!("no eligible post for {target}")))?;
    let published_id = steps::publish_post(&ctx, &post).await?;
    info!(
        target = %target,
        external_id = %post.external_id,
        published_id = %published_id,
        "Latest post published"
    );
    Ok(PublishOutcome {
        external_id: post.external_id,
        published_id,
    })
}

async fn dispatch_category(
    ctx: Collaborators,
    category: Category,
    limit: usize,
) -> ActionResult<DispatchReport> {
    let candidates: Vec<Post> = ctx
        .repository
        .list_by_category(category, None)
        .await?
        .into_iter()
        .filter(|p| p.status.is_publishable() && p.published_id.is_none())
        .take(limit)
        .collect();

    let mut results = Vec::with_capacity(candidates.len());
    for mut post in candidates {
        if post.rewritten_text.is_none() {
            let text = match ctx.rewriter.rewrite(&post.original_text, category).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        external_id = %post.external_id,
                        error = %err,
                        "Rewrite failed, keeping original text"
                    );
                    post.original_text.clone()
                }
            };
            let update = PostUpdate::new()
                .rewritten_text(text.as_str())
                .status(PostStatus::Polished);
            ctx.repository.update(&post.external_id, update).await?;
            post.rewritten_text = Some(text);
        }

        match steps::publish_post(&ctx, &post).await {
            Ok(published_id) => results.push(DispatchItem {
                external_id: post.external_id,
                status: DispatchStatus::Published,
                published_id: Some(published_id),
                error: None,
            }),
            Err(err) => {
                warn!(external_id = %post.external_id, error = %err, "Dispatch publish failed");
                let rate_limited = err.is_rate_limited();
                results.push(DispatchItem {
                    external_id: post.external_id,
                    status: DispatchStatus::Failed,
                    published_id: None,
                    error: Some(err.to_string()),
                });
                if rate_limited {
                    break;
                }
            }
        }
    }

    info!(category = %category, processed = results.len(), "Category dispatch finished");
    Ok(DispatchReport {
        category,
        processed_count: results.len(),
        results,
    })
}

async fn find(ctx: &Collaborators, external_id: &str) -> ActionResult<Post> {
    ctx.repository
        .get(external_id)
        .await?
        .ok_or_else(|| ActionError::PostNotFound(external_id.to_string()))
}

/// Run `work` on its own task and wait for it.
async fn detached<T, F>(work: F) -> ActionResult<T>
where
    F: Future<Output = ActionResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ActionError::Internal(format!("action task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePublisher, FakeRewriter, Fakes, fetched, statuses};
    use recast_types::CollaboratorError;

    fn sample_posts() -> Vec<recast_types::FetchedPost> {
        vec![
            fetched("1", "Breaking news: the bridge reopened", 0),
            fetched("2", "Huge sale on all plans this week", 10),
            fetched("3", "more news from the council", 20),
        ]
    }

    async fn downloaded(fakes: &Fakes) -> PostActions {
        let actions = PostActions::new(fakes.collaborators());
        actions.download("acct", 10).await.unwrap();
        actions
    }

    #[tokio::test]
    async fn test_download_stores_only_new_posts() {
        let fakes = Fakes::new(sample_posts());
        let actions = PostActions::new(fakes.collaborators());

        let first = actions.download("@acct", 10).await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|p| p.target == "acct"));

        let second = actions.download("acct", 10).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(fakes.repository.all().len(), 3);
    }

    #[tokio::test]
    async fn test_download_rejects_bad_input_and_empty_fetch() {
        let fakes = Fakes::new(Vec::new());
        let actions = PostActions::new(fakes.collaborators());

        assert!(matches!(
            actions.download("  ", 5).await,
            Err(ActionError::Validation(_))
        ));
        assert!(matches!(
            actions.download("acct", 0).await,
            Err(ActionError::Validation(_))
        ));
        assert!(matches!(
            actions.download("acct", 5).await,
            Err(ActionError::NothingToDo(_))
        ));
        assert_eq!(fakes.fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_polish_classifies_and_is_idempotent() {
        let fakes = Fakes::new(sample_posts());
        let actions = downloaded(&fakes).await;

        let outcome = actions.polish("2").await.unwrap();
        assert!(!outcome.already_polished);
        assert_eq!(outcome.rewritten_text, "rewritten: Huge sale on all plans this week");

        let stored = fakes.repository.all();
        let post = stored.iter().find(|p| p.external_id == "2").unwrap();
        assert_eq!(post.category, Some(Category::Promotional));
        assert_eq!(post.status, PostStatus::Polished);

        let again = actions.polish("2").await.unwrap();
        assert!(again.already_polished);
        assert_eq!(fakes.rewriter.calls().len(), 1);

        assert!(matches!(
            actions.polish("missing").await,
            Err(ActionError::PostNotFound(id)) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_polish_surfaces_rewrite_failure() {
        let fakes = Fakes::new(sample_posts()).with_rewriter(FakeRewriter::failing());
        let actions = downloaded(&fakes).await;

        let err = actions.polish("1").await.unwrap_err();
        assert!(matches!(err, ActionError::Collaborator(_)));
        assert_eq!(statuses(&fakes.repository.all())["1"], PostStatus::Downloaded);
    }

    #[tokio::test]
    async fn test_publish_one_post_once() {
        let fakes = Fakes::new(sample_posts());
        let actions = downloaded(&fakes).await;

        let outcome = actions.publish("1").await.unwrap();
        assert_eq!(outcome.published_id, "pub-1");
        assert_eq!(statuses(&fakes.repository.all())["1"], PostStatus::Published);

        assert!(matches!(
            actions.publish("1").await,
            Err(ActionError::AlreadyPublished(_))
        ));
        assert_eq!(fakes.publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_post_eligible() {
        let fakes = Fakes::new(sample_posts()).with_publisher(FakePublisher::failing_with(
            CollaboratorError::Forbidden("app lacks write access".to_string()),
        ));
        let actions = downloaded(&fakes).await;

        let err = actions.publish("1").await.unwrap_err();
        assert_eq!(err.to_string(), "forbidden: app lacks write access");
        assert_eq!(statuses(&fakes.repository.all())["1"], PostStatus::Downloaded);
    }

    #[tokio::test]
    async fn test_publish_latest_picks_newest_eligible() {
        let fakes = Fakes::new(sample_posts());
        let actions = downloaded(&fakes).await;

        assert_eq!(actions.publish_latest("acct", None).await.unwrap().external_id, "3");
        assert_eq!(actions.publish_latest("@acct", None).await.unwrap().external_id, "2");

        assert!(matches!(
            actions.publish_latest("nobody", None).await,
            Err(ActionError::NothingToDo(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_publishes_category_newest_first() {
        let fakes = Fakes::new(sample_posts());
        let actions = downloaded(&fakes).await;
        for id in ["1", "2", "3"] {
            actions.polish(id).await.unwrap();
        }

        let report = actions.dispatch(Category::News, None).await.unwrap();
        assert_eq!(report.processed_count, 2);
        let ids: Vec<&str> = report.results.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert!(report.results.iter().all(|r| r.status == DispatchStatus::Published));

        let again = actions.dispatch(Category::News, None).await.unwrap();
        assert_eq!(again.processed_count, 0);
        assert_eq!(statuses(&fakes.repository.all())["2"], PostStatus::Polished);
    }

    #[tokio::test]
    async fn test_dispatch_stops_on_rate_limit() {
        let fakes = Fakes::new(sample_posts()).with_publisher(FakePublisher::failing_with(
            CollaboratorError::rate_limited("daily cap"),
        ));
        let actions = downloaded(&fakes).await;
        for id in ["1", "3"] {
            actions.polish(id).await.unwrap();
        }

        let report = actions.dispatch(Category::News, Some(10)).await.unwrap();
        assert_eq!(report.processed_count, 1);
        assert_eq!(report.results[0].status, DispatchStatus::Failed);
        assert_eq!(report.results[0].error.as_deref(), Some("rate limited: daily cap"));

        assert!(matches!(
            actions.dispatch(Category::News, Some(0)).await,
            Err(ActionError::Validation(_))
        ));
    }
}
