//! Workflow orchestration for Recast.
//!
//! Runs the fixed `download -> classify -> polish -> publish` pipeline once
//! per invocation. Each step runs under its own deadline and records its own
//! outcome; a failed or timed-out step never stops later steps. Callers poll
//! the [`WorkflowRegistry`] (through the [`Orchestrator`]) for progress.
//!
//! ```text
//! Orchestrator ──► WorkflowRegistry (owns records)
//!      │
//!      └─► PipelineController ──► executor::execute (per step, with deadline)
//!                                     └─► unit of work (collaborator calls)
//! ```
//!
//! # Known limitations
//!
//! - A timed-out unit of work is abandoned, not cancelled. It may still write
//!   to the repository after its step has been recorded as `timeout`.
//! - Two runs for the same target are not serialized and can both publish
//!   the same post.
//! - Records live in memory only.

pub mod actions;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod step;
pub mod steps;
pub mod sweeper;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use actions::{
    DispatchItem, DispatchReport, DispatchStatus, PolishOutcome, PostActions, PublishOutcome,
};
pub use error::{ActionError, ActionResult, Result, StepError, StepResult, WorkflowError};
pub use orchestrator::{Orchestrator, RunRequest, WorkflowSettings};
pub use pipeline::{PipelineController, RunParams};
pub use record::{
    Summary, WorkflowHandle, WorkflowId, WorkflowRecord, WorkflowSummary, WorkflowView,
    aggregate_status,
};
pub use registry::WorkflowRegistry;
pub use step::{StepName, StepOutcome, StepRecord, StepStatus};
pub use steps::Collaborators;
pub use sweeper::spawn_eviction_sweeper;
