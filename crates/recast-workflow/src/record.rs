//! Workflow records and the shared handle used while a run is in flight.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use recast_types::{Timestamp, now};

use crate::error::{Result, WorkflowError};
use crate::step::{StepName, StepOutcome, StepRecord, StepStatus, seconds_between};

/// Identifier of a workflow run.
pub type WorkflowId = String;

/// Free-form invocation metadata.
pub type Summary = serde_json::Map<String, serde_json::Value>;

/// Error recorded on a step that was still running when the pipeline aborted.
const ABORTED_STEP_ERROR: &str = "pipeline aborted before the step finished";

/// Aggregate pipeline status for a set of attempted steps.
///
/// `completed` if and only if every step completed, `failed` otherwise.
pub fn aggregate_status(steps: &[StepStatus]) -> StepStatus {
    if steps.iter().all(|s| *s == StepStatus::Completed) {
        StepStatus::Completed
    } else {
        StepStatus::Failed
    }
}

/// One end-to-end pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    #[serde(rename = "workflow_id")]
    pub id: WorkflowId,
    pub status: StepStatus,
    pub steps: Vec<StepRecord>,
    pub summary: Summary,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    /// Seconds between `created_at` and `completed_at`.
    pub total_duration: Option<f64>,
}

impl WorkflowRecord {
    /// A pending record with the four steps in execution order.
    pub fn new(id: impl Into<WorkflowId>, summary: Summary, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            status: StepStatus::Pending,
            steps: StepName::ALL.iter().map(|n| StepRecord::new(*n)).collect(),
            summary,
            created_at,
            completed_at: None,
            total_duration: None,
        }
    }

    pub fn step(&self, name: StepName) -> &StepRecord {
        &self.steps[name.index()]
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Start a step; the pipeline becomes `running` with its first step.
    pub fn begin_step(&mut self, name: StepName, at: Timestamp) -> Result<()> {
        self.ensure_mutable(StepStatus::Running)?;
        self.steps[name.index()].begin(at)?;
        if self.status == StepStatus::Pending {
            self.status = StepStatus::Running;
        }
        Ok(())
    }

    /// Record a step's outcome.
    pub fn finish_step(
        &mut self,
        name: StepName,
        outcome: StepOutcome,
        at: Timestamp,
    ) -> Result<StepStatus> {
        self.ensure_mutable(outcome.status())?;
        self.steps[name.index()].finish(outcome, at)
    }

    /// Compute the aggregate status once every step has been attempted.
    pub fn finalize(&mut self, at: Timestamp) -> Result<StepStatus> {
        let statuses: Vec<StepStatus> = self.steps.iter().map(|s| s.status).collect();
        let status = aggregate_status(&statuses);
        self.ensure_mutable(status)?;

        if let Some(unfinished) = self.steps.iter().find(|s| !s.status.is_terminal()) {
            return Err(WorkflowError::Internal(format!(
                "cannot finalize workflow {}: step {} is {}",
                self.id, unfinished.name, unfinished.status
            )));
        }

        self.close(status, at);
        Ok(status)
    }

    /// Force the pipeline into `failed` after a sequencing fault.
    ///
    /// Steps left `running` are failed; `pending` steps stay untouched.
    /// Returns false if the record was already terminal.
    pub fn abort(&mut self, at: Timestamp) -> bool {
        if self.is_terminal() {
            return false;
        }
        for step in &mut self.steps {
            if step.status == StepStatus::Running {
                let _ = step.finish(StepOutcome::Failed(ABORTED_STEP_ERROR.to_string()), at);
            }
        }
        self.close(StepStatus::Failed, at);
        true
    }

    /// Add metadata to the summary while the run is still open.
    pub fn annotate(&mut self, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        self.ensure_mutable(self.status)?;
        self.summary.insert(key.into(), value);
        Ok(())
    }

    /// Fraction of steps that completed (0.0 - 1.0).
    pub fn progress(&self) -> f64 {
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        completed as f64 / self.steps.len() as f64
    }

    /// The step currently running, if any.
    pub fn current_step(&self) -> Option<StepName> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Running)
            .map(|s| s.name)
    }

    fn close(&mut self, status: StepStatus, at: Timestamp) {
        self.status = status;
        self.completed_at = Some(at);
        self.total_duration = Some(seconds_between(self.created_at, at));
    }

    fn ensure_mutable(&self, to: StepStatus) -> Result<()> {
        if self.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                subject: format!("workflow {}", self.id),
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared handle
// ─────────────────────────────────────────────────────────────────────────────

/// Shared, lock-protected access to a live workflow record.
///
/// The registry owns the handle; the pipeline controller borrows it for one
/// run. Locks are held only for the duration of a single mutation, never
/// across an await point.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    id: WorkflowId,
    inner: Arc<RwLock<WorkflowRecord>>,
}

impl WorkflowHandle {
    pub fn new(record: WorkflowRecord) -> Self {
        Self {
            id: record.id.clone(),
            inner: Arc::new(RwLock::new(record)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A consistent copy of the record.
    pub fn snapshot(&self) -> WorkflowRecord {
        self.inner.read().clone()
    }

    pub fn status(&self) -> StepStatus {
        self.inner.read().status
    }

    pub fn created_at(&self) -> Timestamp {
        self.inner.read().created_at
    }

    pub fn begin_step(&self, name: StepName) -> Result<()> {
        self.inner.write().begin_step(name, now())
    }

    pub fn finish_step(&self, name: StepName, outcome: StepOutcome) -> Result<StepStatus> {
        self.inner.write().finish_step(name, outcome, now())
    }

    pub fn finalize(&self) -> Result<StepStatus> {
        self.inner.write().finalize(now())
    }

    pub fn abort(&self) -> bool {
        self.inner.write().abort(now())
    }

    pub fn annotate(&self, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        self.inner.write().annotate(key, value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Projections
// ─────────────────────────────────────────────────────────────────────────────

/// Status projection returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowView {
    #[serde(flatten)]
    pub record: WorkflowRecord,
    /// Fraction of completed steps.
    pub progress: f64,
    /// Name of the step currently running.
    pub current_step: Option<StepName>,
}

impl From<WorkflowRecord> for WorkflowView {
    fn from(record: WorkflowRecord) -> Self {
        let progress = record.progress();
        let current_step = record.current_step();
        Self {
            record,
            progress,
            current_step,
        }
    }
}

/// Compact listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: WorkflowId,
    pub status: StepStatus,
    pub target: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub total_duration: Option<f64>,
}

impl From<&WorkflowRecord> for WorkflowSummary {
    fn from(record: &WorkflowRecord) -> Self {
        Self {
            workflow_id: record.id.clone(),
            status: record.status,
            target: record
                .summary
                .get("target")
                .and_then(|v| v.as_str())
                .map(String::from),
            created_at: record.created_at,
            completed_at: record.completed_at,
            total_duration: record.total_duration,
        }
    }
}
