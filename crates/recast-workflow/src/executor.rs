//! Step executor: runs one unit of work under a deadline.
//!
//! The unit of work is spawned onto its own task and raced against a timer.
//! When the timer wins the join handle is dropped, which detaches the task:
//! it keeps running in the background and may still touch the repository
//! after the step has been recorded as `timeout`.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{Result, StepResult};
use crate::record::WorkflowHandle;
use crate::step::{StepName, StepOutcome, StepStatus};

/// Message recorded when a unit of work panics.
pub const PANIC_MESSAGE: &str = "unit of work panicked";

/// Run `work` for `step` of `workflow`, bounded by `deadline`.
///
/// Step-level failures are absorbed into the record; the returned error only
/// reports a state-machine violation (the step was not `pending`).
pub async fn execute<F>(
    workflow: &WorkflowHandle,
    step: StepName,
    deadline: Duration,
    work: F,
) -> Result<StepStatus>
where
    F: Future<Output = StepResult> + Send + 'static,
{
    workflow.begin_step(step)?;
    info!(
        workflow_id = %workflow.id(),
        step = %step,
        deadline_secs = deadline.as_secs_f64(),
        "Step started"
    );

    let started = Instant::now();
    let task = tokio::spawn(work);
    let outcome = match tokio::time::timeout(deadline, task).await {
        Ok(Ok(Ok(value))) => StepOutcome::Completed(value),
        Ok(Ok(Err(err))) => StepOutcome::Failed(err.to_string()),
        Ok(Err(join_err)) if join_err.is_panic() => StepOutcome::Failed(PANIC_MESSAGE.to_string()),
        Ok(Err(join_err)) => StepOutcome::Failed(format!("unit of work aborted: {join_err}")),
        Err(_elapsed) => StepOutcome::TimedOut(deadline),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        StepOutcome::Completed(_) => info!(
            workflow_id = %workflow.id(),
            step = %step,
            duration_ms,
            "Step completed"
        ),
        StepOutcome::Failed(error) => warn!(
            workflow_id = %workflow.id(),
            step = %step,
            duration_ms,
            error = %error,
            "Step failed"
        ),
        StepOutcome::TimedOut(_) => warn!(
            workflow_id = %workflow.id(),
            step = %step,
            duration_ms,
            "Step timed out; abandoning unit of work"
        ),
    }

    workflow.finish_step(step, outcome)
}
