//! Step records and their state machine.
//!
//! A step moves `pending -> running -> {completed | failed | timeout}` and
//! never leaves a terminal status. Timestamps are only written through the
//! transition methods, so `duration` is present exactly when both ends are.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use recast_types::Timestamp;

use crate::error::{Result, WorkflowError};

/// Execution status shared by steps and whole workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Timeout => "timeout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(StepStatus::Pending),
            "running" => Some(StepStatus::Running),
            "completed" => Some(StepStatus::Completed),
            "failed" => Some(StepStatus::Failed),
            "timeout" => Some(StepStatus::Timeout),
            _ => None,
        }
    }

    /// True for `completed`, `failed`, and `timeout`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Timeout
        )
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Download,
    Classify,
    Polish,
    Publish,
}

impl StepName {
    /// Fixed execution order.
    pub const ALL: [StepName; 4] = [
        StepName::Download,
        StepName::Classify,
        StepName::Polish,
        StepName::Publish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Download => "download",
            StepName::Classify => "classify",
            StepName::Polish => "polish",
            StepName::Publish => "publish",
        }
    }

    /// Position in [`StepName::ALL`].
    pub fn index(self) -> usize {
        match self {
            StepName::Download => 0,
            StepName::Classify => 1,
            StepName::Polish => 2,
            StepName::Publish => 3,
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a unit of work ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed(serde_json::Value),
    Failed(String),
    TimedOut(Duration),
}

impl StepOutcome {
    pub fn status(&self) -> StepStatus {
        match self {
            StepOutcome::Completed(_) => StepStatus::Completed,
            StepOutcome::Failed(_) => StepStatus::Failed,
            StepOutcome::TimedOut(_) => StepStatus::Timeout,
        }
    }
}

/// Execution record for one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// Seconds between `start_time` and `end_time`.
    pub duration: Option<f64>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl StepRecord {
    /// A fresh `pending` record.
    pub fn new(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            duration: None,
            error: None,
            result: None,
        }
    }

    /// `pending -> running`.
    pub fn begin(&mut self, at: Timestamp) -> Result<()> {
        self.check_transition(StepStatus::Pending, StepStatus::Running)?;
        self.status = StepStatus::Running;
        self.start_time = Some(at);
        Ok(())
    }

    /// `running -> completed | failed | timeout`.
    pub fn finish(&mut self, outcome: StepOutcome, at: Timestamp) -> Result<StepStatus> {
        let to = outcome.status();
        self.check_transition(StepStatus::Running, to)?;

        match outcome {
            StepOutcome::Completed(value) => self.result = Some(value),
            StepOutcome::Failed(message) => self.error = Some(message),
            StepOutcome::TimedOut(deadline) => self.error = Some(timeout_message(deadline)),
        }
        self.status = to;
        self.end_time = Some(at);
        self.duration = self.start_time.map(|start| seconds_between(start, at));
        Ok(to)
    }

    pub fn complete(&mut self, value: serde_json::Value, at: Timestamp) -> Result<StepStatus> {
        self.finish(StepOutcome::Completed(value), at)
    }

    pub fn fail(&mut self, message: impl Into<String>, at: Timestamp) -> Result<StepStatus> {
        self.finish(StepOutcome::Failed(message.into()), at)
    }

    pub fn time_out(&mut self, deadline: Duration, at: Timestamp) -> Result<StepStatus> {
        self.finish(StepOutcome::TimedOut(deadline), at)
    }

    fn check_transition(&self, expected: StepStatus, to: StepStatus) -> Result<()> {
        if self.status != expected {
            return Err(WorkflowError::InvalidTransition {
                subject: format!("step {}", self.name),
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

/// Error text recorded when a step's deadline fires.
pub fn timeout_message(deadline: Duration) -> String {
    format!("step exceeded its deadline of {}s", deadline.as_secs_f64())
}

/// Non-negative seconds from `start` to `end`.
pub(crate) fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    let micros = (end - start).num_microseconds().unwrap_or(i64::MAX);
    (micros.max(0) as f64) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> Timestamp {
        chrono::DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    #[test]
    fn test_new_record_is_pending_and_empty() {
        let step = StepRecord::new(StepName::Polish);
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.start_time.is_none());
        assert!(step.end_time.is_none());
        assert!(step.duration.is_none());
        assert!(step.error.is_none());
        assert!(step.result.is_none());
    }

    #[test]
    fn test_complete_sets_result_and_duration() {
        let mut step = StepRecord::new(StepName::Download);
        step.begin(t0()).unwrap();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.duration.is_none());

        let status = step
            .finish(
                StepOutcome::Completed(serde_json::json!({"saved_count": 2})),
                t0() + TimeDelta::milliseconds(1500),
            )
            .unwrap();

        assert_eq!(status, StepStatus::Completed);
        assert_eq!(step.duration, Some(1.5));
        assert_eq!(step.result, Some(serde_json::json!({"saved_count": 2})));
        assert!(step.error.is_none());
    }

    #[test]
    fn test_timeout_names_deadline() {
        let mut step = StepRecord::new(StepName::Publish);
        step.begin(t0()).unwrap();
        step.time_out(Duration::from_secs(1200), t0() + TimeDelta::seconds(1200)).unwrap();

        assert_eq!(step.status, StepStatus::Timeout);
        assert!(step.error.as_deref().unwrap().contains("1200s"));
        assert!(step.result.is_none());
    }

    #[test]
    fn test_failed_records_error_only() {
        let mut step = StepRecord::new(StepName::Classify);
        step.begin(t0()).unwrap();
        step.finish(StepOutcome::Failed("boom".to_string()), t0())
            .unwrap();

        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.as_deref(), Some("boom"));
        assert!(step.result.is_none());
        assert_eq!(step.duration, Some(0.0));
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut step = StepRecord::new(StepName::Download);
        step.begin(t0()).unwrap();
        let err = step.begin(t0()).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: StepStatus::Running,
                to: StepStatus::Running,
                ..
            }
        ));
    }

    #[test]
    fn test_finish_without_begin_is_rejected() {
        let mut step = StepRecord::new(StepName::Download);
        let err = step
            .finish(StepOutcome::Completed(serde_json::Value::Null), t0())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.end_time.is_none());
    }

    #[test]
    fn test_terminal_step_cannot_finish_again() {
        let mut step = StepRecord::new(StepName::Download);
        step.begin(t0()).unwrap();
        step.finish(StepOutcome::Failed("first".to_string()), t0())
            .unwrap();
        assert!(
            step.finish(StepOutcome::Completed(serde_json::Value::Null), t0())
                .is_err()
        );
        assert_eq!(step.error.as_deref(), Some("first"));
        assert!(step.result.is_none());
    }

    #[test]
    fn test_duration_never_negative_when_clock_steps_back() {
        let mut step = StepRecord::new(StepName::Download);
        step.begin(t0()).unwrap();
        step.finish(
            StepOutcome::Completed(serde_json::Value::Null),
            t0() - TimeDelta::seconds(3),
        )
        .unwrap();
        assert_eq!(step.duration, Some(0.0));
    }

    #[test]
    fn test_step_names_serialize_in_order() {
        let names: Vec<String> = StepName::ALL
            .iter()
            .map(|n| serde_json::to_value(n).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["download", "classify", "polish", "publish"]);
        for (i, name) in StepName::ALL.iter().enumerate() {
            assert_eq!(name.index(), i);
        }
    }
}
