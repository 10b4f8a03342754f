//! Error types for the workflow crate.

use thiserror::Error;

use recast_types::CollaboratorError;

use crate::step::StepStatus;

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised by the orchestrator and the record state machine.
///
/// Step-level failures never surface here: they are recorded on the step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Bad input to `start` or `run_to_completion`.
    #[error("validation error: {0}")]
    Validation(String),

    /// No workflow with the given id.
    #[error("workflow {0} not found")]
    NotFound(String),

    /// A state change the record's state machine does not allow.
    #[error("invalid transition for {subject}: {from} -> {to}")]
    InvalidTransition {
        subject: String,
        from: StepStatus,
        to: StepStatus,
    },

    /// A fault in the orchestration logic itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Errors raised by manual post actions.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("post {0} not found")]
    PostNotFound(String),

    /// Nothing matched the action's selection.
    #[error("{0}")]
    NothingToDo(String),

    #[error("post {0} is already published")]
    AlreadyPublished(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for manual post actions.
pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Failure produced by a step's unit of work.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("{0}")]
    Internal(String),
}

/// Outcome type of a unit of work.
pub type StepResult = std::result::Result<serde_json::Value, StepError>;
