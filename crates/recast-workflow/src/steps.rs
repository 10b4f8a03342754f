//! Units of work for the four pipeline steps.
//!
//! Each function owns everything it touches so it can run as a detached
//! task once its deadline fires.

use serde_json::json;
use tracing::{debug, warn};

use recast_types::{
    Category, CollaboratorResult, FetchedPost, NewPost, Post, PostStatus, PostUpdate,
    SharedMediaDownloader, SharedPostFetcher, SharedPostRepository, SharedPublisher,
    SharedRewriter, now,
};

use crate::error::StepResult;

/// How many recent posts the publish step considers.
pub const PUBLISH_CANDIDATE_WINDOW: usize = 50;

/// Collaborators driven by the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: SharedPostFetcher,
    pub media: SharedMediaDownloader,
    pub rewriter: SharedRewriter,
    pub publisher: SharedPublisher,
    pub repository: SharedPostRepository,
}

/// Posts stored from one fetched batch.
pub(crate) struct StoredBatch {
    pub saved: Vec<Post>,
    pub skipped: usize,
}

/// Persist the unknown posts of a fetched batch, with their media.
pub(crate) async fn store_new(
    ctx: &Collaborators,
    target: &str,
    fetched: Vec<FetchedPost>,
) -> CollaboratorResult<StoredBatch> {
    let mut saved = Vec::new();
    let mut skipped = 0usize;

    for item in fetched {
        if ctx.repository.exists(&item.external_id).await? {
            skipped += 1;
            continue;
        }

        let local_media = if item.media_urls.is_empty() {
            Vec::new()
        } else {
            ctx.media.download(&item.external_id, &item.media_urls).await
        };

        let post = NewPost::from_fetched(target, item).with_local_media(local_media);
        debug!(target = %target, external_id = %post.external_id, "Saving fetched post");
        saved.push(ctx.repository.create(post).await?);
    }

    Ok(StoredBatch { saved, skipped })
}

/// Fetch recent posts, persist the unknown ones and their media.
pub(crate) async fn download(ctx: Collaborators, target: String, count: usize) -> StepResult {
    let fetched = ctx.fetcher.fetch_recent(&target, count).await?;
    let fetched_count = fetched.len();
    let batch = store_new(&ctx, &target, fetched).await?;

    Ok(json!({
        "target": target,
        "fetched_count": fetched_count,
        "saved_count": batch.saved.len(),
        "skipped_count": batch.skipped,
    }))
}

/// Assign a category to every downloaded post and mark it ready for rewriting.
pub(crate) async fn classify(ctx: Collaborators, target: String) -> StepResult {
    let pending = ctx
        .repository
        .list_by_target(&target, Some(PostStatus::Downloaded), None)
        .await?;

    let mut processed_count = 0usize;
    for post in pending {
        let category = Category::classify(&post.original_text);
        let update = PostUpdate::new()
            .category(category)
            .status(PostStatus::Processed);
        ctx.repository.update(&post.external_id, update).await?;
        processed_count += 1;
    }

    Ok(json!({ "processed_count": processed_count }))
}

/// Rewrite every classified post, falling back to the original text.
pub(crate) async fn polish(ctx: Collaborators, target: String) -> StepResult {
    let processed = ctx
        .repository
        .list_by_target(&target, Some(PostStatus::Processed), None)
        .await?;

    let mut polished_count = 0usize;
    let mut fallback_count = 0usize;
    for post in processed.into_iter().filter(|p| p.rewritten_text.is_none()) {
        let category = post.category.unwrap_or(Category::General);
        let text = match ctx.rewriter.rewrite(&post.original_text, category).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    external_id = %post.external_id,
                    error = %err,
                    "Rewrite failed, keeping original text"
                );
                fallback_count += 1;
                post.original_text.clone()
            }
        };

        let update = PostUpdate::new()
            .rewritten_text(text)
            .status(PostStatus::Polished);
        ctx.repository.update(&post.external_id, update).await?;
        polished_count += 1;
    }

    Ok(json!({
        "polished_count": polished_count,
        "fallback_count": fallback_count,
    }))
}

/// The most recent unpublished post of `target` that may be published.
pub(crate) async fn latest_candidate(
    ctx: &Collaborators,
    target: &str,
    category: Option<Category>,
) -> CollaboratorResult<Option<Post>> {
    let recent = ctx
        .repository
        .list_by_target(target, None, Some(PUBLISH_CANDIDATE_WINDOW))
        .await?;

    Ok(recent
        .into_iter()
        .filter(|p| p.status.is_publishable() && p.published_id.is_none())
        .filter(|p| category.is_none() || p.category == category)
        .max_by_key(|p| p.recency()))
}

/// Publish `post` and record the identifier assigned by the publish target.
pub(crate) async fn publish_post(ctx: &Collaborators, post: &Post) -> CollaboratorResult<String> {
    let published_id = ctx
        .publisher
        .publish(post.publish_text(), &post.local_media_paths)
        .await?;

    ctx.repository
        .update(
            &post.external_id,
            PostUpdate::new().published(published_id.as_str(), now()),
        )
        .await?;
    Ok(published_id)
}

/// Publish the most recent eligible post for `target`.
pub(crate) async fn publish(
    ctx: Collaborators,
    target: String,
    category: Option<Category>,
    auto_posting: bool,
) -> StepResult {
    if !auto_posting {
        return Ok(json!({ "posted_count": 0, "message": "auto posting disabled" }));
    }

    let Some(post) = latest_candidate(&ctx, &target, category).await? else {
        let message = match category {
            Some(c) => format!("no eligible {c} post for {target}"),
            None => format!("no eligible post for {target}"),
        };
        return Ok(json!({ "posted_count": 0, "message": message }));
    };

    let published_id = publish_post(&ctx, &post).await?;

    Ok(json!({
        "posted_count": 1,
        "published_id": published_id,
        "external_id": post.external_id,
    }))
}
