//! Orchestrator facade used by the HTTP surface and the CLI.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Instrument, error, info, info_span};

use recast_types::Category;

use crate::actions::PostActions;
use crate::error::{Result, WorkflowError};
use crate::pipeline::{PipelineController, RunParams};
use crate::record::{Summary, WorkflowId, WorkflowRecord};
use crate::registry::WorkflowRegistry;
use crate::steps::Collaborators;

/// Accepted range for `count`.
pub const COUNT_RANGE: RangeInclusive<usize> = 1..=100;
/// Accepted range for a caller-supplied step timeout, in seconds.
pub const STEP_TIMEOUT_RANGE: RangeInclusive<u64> = 10..=300;

/// Defaults applied to incoming run requests.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// Used when a request names no target.
    pub default_target: Option<String>,
    pub default_count: usize,
    pub step_timeout: Duration,
    pub publish_timeout: Duration,
    pub auto_posting: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_target: None,
            default_count: 1,
            step_timeout: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(1200),
            auto_posting: true,
        }
    }
}

/// A request to run the pipeline once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default, alias = "scrape_x_username")]
    pub target: Option<String>,
    /// Older clients send the account as `username`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    /// Category code, 1-6.
    #[serde(default, alias = "tweet_type")]
    pub category: Option<u8>,
    #[serde(default, alias = "timeout")]
    pub step_timeout_secs: Option<u64>,
}

impl RunRequest {
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }
}

/// How a run was started, recorded in the summary.
#[derive(Debug, Clone, Copy)]
enum RunMode {
    Background,
    Sync,
}

impl RunMode {
    fn as_str(self) -> &'static str {
        match self {
            RunMode::Background => "background",
            RunMode::Sync => "sync",
        }
    }
}

/// Starts, tracks, and evicts workflow runs.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<WorkflowRegistry>,
    controller: Arc<PipelineController>,
    actions: PostActions,
    settings: WorkflowSettings,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, settings: WorkflowSettings) -> Self {
        let actions = PostActions::new(collaborators.clone());
        let controller =
            PipelineController::new(collaborators).with_auto_posting(settings.auto_posting);
        Self {
            registry: Arc::new(WorkflowRegistry::new()),
            controller: Arc::new(controller),
            actions,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// On-demand actions over the same collaborators as the pipeline.
    pub fn actions(&self) -> &PostActions {
        &self.actions
    }

    /// Resolve defaults and check bounds.
    pub fn validate(&self, request: &RunRequest) -> Result<RunParams> {
        let target = [
            request.target.as_deref(),
            request.username.as_deref(),
            self.settings.default_target.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .ok_or_else(|| WorkflowError::validation("target is required"))?
        .trim_start_matches('@')
        .to_string();
        if target.is_empty() {
            return Err(WorkflowError::validation("target is required"));
        }

        let count = request.count.unwrap_or(self.settings.default_count);
        if !COUNT_RANGE.contains(&count) {
            return Err(WorkflowError::validation(format!(
                "count must be between {} and {}, got {count}",
                COUNT_RANGE.start(),
                COUNT_RANGE.end()
            )));
        }

        let category = match request.category {
            Some(code) => Some(Category::from_code(code).ok_or_else(|| {
                WorkflowError::validation(format!("category must be between 1 and 6, got {code}"))
            })?),
            None => None,
        };

        let step_timeout = match request.step_timeout_secs {
            Some(secs) if !STEP_TIMEOUT_RANGE.contains(&secs) => {
                return Err(WorkflowError::validation(format!(
                    "timeout must be between {} and {} seconds, got {secs}",
                    STEP_TIMEOUT_RANGE.start(),
                    STEP_TIMEOUT_RANGE.end()
                )));
            }
            Some(secs) => Duration::from_secs(secs),
            None => self.settings.step_timeout,
        };

        Ok(RunParams {
            target,
            count,
            category,
            step_timeout,
            publish_timeout: self.settings.publish_timeout,
        })
    }

    /// Start a run in the background and return its id immediately.
    pub fn start(&self, request: &RunRequest) -> Result<WorkflowId> {
        let params = self.validate(request)?;
        let handle = self.registry.create(summary(&params, RunMode::Background));
        let id = handle.id().to_string();
        info!(workflow_id = %id, target = %params.target, "Workflow accepted");

        let controller = self.controller.clone();
        let span = info_span!("workflow", workflow_id = %id);
        tokio::spawn(
            async move {
                controller.run(&handle, &params).await;
            }
            .instrument(span),
        );
        Ok(id)
    }

    /// Run the pipeline and wait for it to reach a terminal status.
    ///
    /// The pipeline runs on its own task, so dropping the returned future
    /// stops the wait but not the run.
    pub async fn run_to_completion(&self, request: &RunRequest) -> Result<WorkflowRecord> {
        let params = self.validate(request)?;
        let handle = self.registry.create(summary(&params, RunMode::Sync));
        let span = info_span!("workflow", workflow_id = %handle.id());

        let controller = self.controller.clone();
        let task_handle = handle.clone();
        let joined = tokio::spawn(
            async move { controller.run(&task_handle, &params).await }.instrument(span),
        )
        .await;

        match joined {
            Ok(record) => Ok(record),
            Err(err) => {
                error!(workflow_id = %handle.id(), error = %err, "Pipeline task lost");
                handle.abort();
                Ok(handle.snapshot())
            }
        }
    }

    pub fn status(&self, id: &str) -> Result<WorkflowRecord> {
        self.registry
            .get(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<WorkflowRecord> {
        self.registry.list()
    }

    /// Drop bookkeeping for runs older than `max_age`. In-flight work is not stopped.
    pub fn evict(&self, max_age: Duration) -> usize {
        let removed = self.registry.evict_older_than(max_age);
        info!(removed, max_age_secs = max_age.as_secs(), "Workflow cleanup");
        removed
    }
}

fn summary(params: &RunParams, mode: RunMode) -> Summary {
    let mut summary = Summary::new();
    summary.insert("target".into(), json!(params.target));
    summary.insert("count".into(), json!(params.count));
    summary.insert("category".into(), json!(params.category.map(Category::as_str)));
    summary.insert("step_timeout_secs".into(), json!(params.step_timeout.as_secs()));
    summary.insert(
        "publish_timeout_secs".into(),
        json!(params.publish_timeout.as_secs()),
    );
    summary.insert("mode".into(), json!(mode.as_str()));
    summary
}
