//! Pipeline controller: drives the four steps in order and aggregates status.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{error, info};

use recast_types::Category;

use crate::error::{Result, StepResult};
use crate::executor;
use crate::record::{WorkflowHandle, WorkflowRecord};
use crate::step::{StepName, StepStatus};
use crate::steps::{self, Collaborators};

/// Validated parameters for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParams {
    pub target: String,
    pub count: usize,
    /// Restricts which post the publish step may select.
    pub category: Option<Category>,
    pub step_timeout: Duration,
    pub publish_timeout: Duration,
}

impl RunParams {
    /// Deadline for `step`.
    pub fn deadline(&self, step: StepName) -> Duration {
        match step {
            StepName::Publish => self.publish_timeout,
            _ => self.step_timeout,
        }
    }
}

/// Runs the fixed step sequence against a workflow record.
///
/// Every step runs regardless of how the previous one ended. A later step
/// that finds nothing to act on records a no-op result.
pub struct PipelineController {
    collaborators: Collaborators,
    auto_posting: bool,
}

impl PipelineController {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            auto_posting: true,
        }
    }

    /// When disabled, the publish step completes without calling the publisher.
    pub fn with_auto_posting(mut self, enabled: bool) -> Self {
        self.auto_posting = enabled;
        self
    }

    pub fn auto_posting(&self) -> bool {
        self.auto_posting
    }

    /// Run every step and return the final record.
    ///
    /// Never leaves the record `running`: a fault in the sequencing itself
    /// forces the pipeline to `failed`.
    pub async fn run(&self, workflow: &WorkflowHandle, params: &RunParams) -> WorkflowRecord {
        info!(
            workflow_id = %workflow.id(),
            target = %params.target,
            count = params.count,
            "Pipeline started"
        );

        let outcome = AssertUnwindSafe(self.sequence(workflow, params))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(status)) => {
                let record = workflow.snapshot();
                info!(
                    workflow_id = %workflow.id(),
                    status = %status,
                    total_duration = record.total_duration.unwrap_or_default(),
                    "Pipeline finished"
                );
                record
            }
            Ok(Err(err)) => {
                error!(workflow_id = %workflow.id(), error = %err, "Pipeline aborted");
                workflow.abort();
                workflow.snapshot()
            }
            Err(_) => {
                error!(workflow_id = %workflow.id(), "Pipeline panicked");
                workflow.abort();
                workflow.snapshot()
            }
        }
    }

    async fn sequence(&self, workflow: &WorkflowHandle, params: &RunParams) -> Result<StepStatus> {
        for step in StepName::ALL {
            let work = self.unit_of_work(step, params);
            executor::execute(workflow, step, params.deadline(step), work).await?;
        }
        workflow.finalize()
    }

    fn unit_of_work(&self, step: StepName, params: &RunParams) -> BoxFuture<'static, StepResult> {
        let ctx = self.collaborators.clone();
        let target = params.target.clone();
        match step {
            StepName::Download => steps::download(ctx, target, params.count).boxed(),
            StepName::Classify => steps::classify(ctx, target).boxed(),
            StepName::Polish => steps::polish(ctx, target).boxed(),
            StepName::Publish => {
                steps::publish(ctx, target, params.category, self.auto_posting).boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Summary;
    use crate::testing::{FakeFetcher, FakePublisher, FakeRewriter, Fakes, fetched, statuses};
    use recast_types::{CollaboratorError, PostStatus};

    fn params() -> RunParams {
        RunParams {
            target: "acct".to_string(),
            count: 5,
            category: None,
            step_timeout: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(1200),
        }
    }

    fn workflow() -> WorkflowHandle {
        WorkflowHandle::new(WorkflowRecord::new(
            "wf-pipe",
            Summary::new(),
            recast_types::now(),
        ))
    }

    fn sample_posts() -> Vec<recast_types::FetchedPost> {
        vec![
            fetched("1", "Breaking news: the bridge reopened", 0),
            fetched("2", "Huge sale on all plans this week", 10),
            fetched("3", "a quiet afternoon", 5),
        ]
    }

    #[tokio::test]
    async fn test_happy_path_completes_every_step() {
        let fakes = Fakes::new(sample_posts());
        let controller = PipelineController::new(fakes.collaborators());
        let record = controller.run(&workflow(), &params()).await;

        assert_eq!(record.status, StepStatus::Completed);
        assert!(
            record
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Completed)
        );
        assert!(record.completed_at.is_some());
        assert!(record.total_duration.unwrap() >= 0.0);

        let download = record.step(StepName::Download).result.clone().unwrap();
        assert_eq!(download["fetched_count"], 3);
        assert_eq!(download["saved_count"], 3);
        assert_eq!(download["skipped_count"], 0);

        let publish = record.step(StepName::Publish).result.clone().unwrap();
        assert_eq!(publish["posted_count"], 1);
        assert_eq!(publish["external_id"], "2");
        assert_eq!(publish["published_id"], "pub-1");

        let published = fakes.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "rewritten: Huge sale on all plans this week");

        let states = statuses(&fakes.repository.all());
        assert_eq!(states["1"], PostStatus::Polished);
        assert_eq!(states["2"], PostStatus::Published);
        assert_eq!(states["3"], PostStatus::Polished);
    }

    #[tokio::test]
    async fn test_rerun_skips_known_posts_and_publishes_next() {
        let fakes = Fakes::new(sample_posts());
        let controller = PipelineController::new(fakes.collaborators());
        controller.run(&workflow(), &params()).await;
        let second = controller.run(&workflow(), &params()).await;

        let download = second.step(StepName::Download).result.clone().unwrap();
        assert_eq!(download["saved_count"], 0);
        assert_eq!(download["skipped_count"], 3);
        assert_eq!(
            second.step(StepName::Classify).result.clone().unwrap()["processed_count"],
            0
        );
        assert_eq!(
            second.step(StepName::Publish).result.clone().unwrap()["external_id"],
            "3"
        );
    }

    #[tokio::test]
    async fn test_steps_start_in_fixed_order() {
        let fakes = Fakes::new(sample_posts());
        let controller = PipelineController::new(fakes.collaborators());
        controller.run(&workflow(), &params()).await;

        let fetch_at = fakes.fetcher.calls()[0];
        let lists = fakes.repository.list_calls();
        let classify_at = lists
            .iter()
            .find(|(s, _)| *s == Some(PostStatus::Downloaded))
            .unwrap()
            .1;
        let polish_at = lists
            .iter()
            .find(|(s, _)| *s == Some(PostStatus::Processed))
            .unwrap()
            .1;
        let publish_at = lists.iter().find(|(s, _)| s.is_none()).unwrap().1;

        assert!(fetch_at <= classify_at);
        assert!(classify_at <= polish_at);
        assert!(polish_at <= publish_at);

        let record_starts: Vec<_> = controller
            .run(&workflow(), &params())
            .await
            .steps
            .iter()
            .map(|s| s.start_time.unwrap())
            .collect();
        assert!(record_starts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_timeout_does_not_stop_later_steps() {
        let fakes = Fakes::new(sample_posts())
            .with_fetcher(FakeFetcher::new(sample_posts()).with_delay(Duration::from_secs(5)));
        let controller = PipelineController::new(fakes.collaborators());
        let params = RunParams {
            step_timeout: Duration::from_secs(1),
            ..params()
        };

        let record = controller.run(&workflow(), &params).await;

        assert_eq!(record.step(StepName::Download).status, StepStatus::Timeout);
        let classify = record.step(StepName::Classify);
        assert!(classify.start_time.is_some());
        assert_eq!(classify.status, StepStatus::Completed);
        assert_eq!(classify.result.clone().unwrap()["processed_count"], 0);
        assert_eq!(
            record.step(StepName::Publish).result.clone().unwrap()["posted_count"],
            0
        );
        assert_eq!(record.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_failing_rewriter_falls_back_to_original_text() {
        let posts = vec![fetched("9", "just shipped the new release", 0)];
        let fakes = Fakes::new(posts).with_rewriter(FakeRewriter::failing());
        let controller = PipelineController::new(fakes.collaborators());
        let record = controller.run(&workflow(), &params()).await;

        let polish = record.step(StepName::Polish);
        assert_eq!(polish.status, StepStatus::Completed);
        assert_eq!(polish.result.clone().unwrap()["fallback_count"], 1);
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(fakes.rewriter.calls().len(), 1);
        assert_eq!(
            fakes.publisher.published()[0].0,
            "just shipped the new release"
        );
    }

    #[tokio::test]
    async fn test_rate_limited_publish_fails_pipeline() {
        let fakes = Fakes::new(sample_posts()).with_publisher(FakePublisher::failing_with(
            CollaboratorError::rate_limited("daily posting limit reached"),
        ));
        let controller = PipelineController::new(fakes.collaborators());
        let record = controller.run(&workflow(), &params()).await;

        for step in [StepName::Download, StepName::Classify, StepName::Polish] {
            assert_eq!(record.step(step).status, StepStatus::Completed);
        }
        let publish = record.step(StepName::Publish);
        assert_eq!(publish.status, StepStatus::Failed);
        assert!(publish.error.as_deref().unwrap().starts_with("rate limited"));
        assert_eq!(record.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_publish_error_conditions_are_named_on_step() {
        let cases = [
            (CollaboratorError::rate_limited("daily cap"), "rate limited: daily cap"),
            (
                CollaboratorError::Unauthorized("token expired".to_string()),
                "unauthorized: token expired",
            ),
            (
                CollaboratorError::Forbidden("app lacks write access".to_string()),
                "forbidden: app lacks write access",
            ),
            (
                CollaboratorError::MalformedContent("duplicate content".to_string()),
                "malformed content: duplicate content",
            ),
        ];

        for (err, expected) in cases {
            let fakes = Fakes::new(sample_posts()).with_publisher(FakePublisher::failing_with(err));
            let controller = PipelineController::new(fakes.collaborators());
            let record = controller.run(&workflow(), &params()).await;

            let publish = record.step(StepName::Publish);
            assert_eq!(publish.status, StepStatus::Failed, "{expected}");
            assert_eq!(publish.error.as_deref(), Some(expected));
            assert_eq!(record.status, StepStatus::Failed);

            let states = statuses(&fakes.repository.all());
            assert!(states.values().all(|s| *s != PostStatus::Published));
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_absorbed() {
        let fakes = Fakes::new(Vec::new()).with_fetcher(
            FakeFetcher::new(Vec::new())
                .with_error(CollaboratorError::Unauthorized("bad bearer token".to_string())),
        );
        let controller = PipelineController::new(fakes.collaborators());
        let record = controller.run(&workflow(), &params()).await;

        let download = record.step(StepName::Download);
        assert_eq!(download.status, StepStatus::Failed);
        assert_eq!(download.error.as_deref(), Some("unauthorized: bad bearer token"));
        assert_eq!(record.step(StepName::Publish).status, StepStatus::Completed);
        assert_eq!(record.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_category_filter_restricts_publish_candidate() {
        let fakes = Fakes::new(sample_posts());
        let controller = PipelineController::new(fakes.collaborators());
        let params = RunParams {
            category: Some(Category::News),
            ..params()
        };
        let record = controller.run(&workflow(), &params).await;

        assert_eq!(
            record.step(StepName::Publish).result.clone().unwrap()["external_id"],
            "1"
        );
    }

    #[tokio::test]
    async fn test_auto_posting_disabled_skips_publisher() {
        let fakes = Fakes::new(sample_posts());
        let controller = PipelineController::new(fakes.collaborators()).with_auto_posting(false);
        let record = controller.run(&workflow(), &params()).await;

        let publish = record.step(StepName::Publish).result.clone().unwrap();
        assert_eq!(publish["posted_count"], 0);
        assert_eq!(publish["message"], "auto posting disabled");
        assert!(fakes.publisher.published().is_empty());
        assert_eq!(record.status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_sequencing_fault_forces_failed() {
        let fakes = Fakes::new(sample_posts());
        let controller = PipelineController::new(fakes.collaborators());
        let wf = workflow();
        // A step that is already running cannot be started again.
        wf.begin_step(StepName::Download).unwrap();

        let record = controller.run(&wf, &params()).await;

        assert_eq!(record.status, StepStatus::Failed);
        assert!(record.completed_at.is_some());
        assert!(record.total_duration.is_some());
        assert_eq!(record.step(StepName::Download).status, StepStatus::Failed);
        assert_eq!(record.step(StepName::Classify).status, StepStatus::Pending);
    }
}
