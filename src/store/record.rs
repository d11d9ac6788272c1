//! Run Records
//!
//! Persistent record types tracking workflow executions. A
//! [`WorkflowInstance`] is one execution attempt of a workflow; a
//! [`ModuleRun`] is one execution of a single step within an instance.
//!
//! Records are owned by the store. The execution engine holds only record
//! ids after creation, so persisted state reflects ground truth even if
//! the engine process dies mid-run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an instance or module run.
///
/// Transitions: `pending → running → {finished, failed}`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created but not yet started
    Pending,
    /// Currently executing
    Running,
    /// Ended with a nonzero exit code or an execution error
    Failed,
    /// Ended with exit code zero
    Finished,
}

impl RunStatus {
    /// Returns true for the two terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Finished)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Finished => "finished",
        };
        write!(f, "{}", label)
    }
}

/// One execution attempt of a workflow.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkflowInstance {
    /// Unique identifier assigned by the store
    pub id: i64,

    /// The workflow this instance executes
    pub workflow_id: i64,

    /// Current lifecycle status
    pub status: RunStatus,

    /// When this attempt started
    pub started_at: DateTime<Utc>,

    /// When this attempt ended; cleared when the instance is reused
    pub finished_at: Option<DateTime<Utc>>,
}

/// One execution of a single step within a workflow instance.
///
/// Created at the moment the step begins executing, not when the
/// workflow starts; one record per attempted step per instance.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModuleRun {
    /// Unique identifier assigned by the store
    pub id: i64,

    /// The owning workflow instance
    pub workflow_instance_id: i64,

    /// The step this run executed
    pub workflow_step_id: i64,

    /// Current lifecycle status
    pub status: RunStatus,

    /// Reference to the input artifact consumed by this run
    pub input_ref: Option<String>,

    /// Reference to the output artifact produced by this run
    pub output_ref: Option<String>,

    /// When the step began executing
    pub started_at: DateTime<Utc>,

    /// When the step reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,

    /// Cumulative captured output, updated after every line
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Finished.is_terminal());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RunStatus::Running.to_string(), "running");
        assert_eq!(RunStatus::Finished.to_string(), "finished");
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&RunStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");

        let parsed: RunStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, RunStatus::Pending);
    }

    #[test]
    fn test_module_run_roundtrip() {
        let run = ModuleRun {
            id: 7,
            workflow_instance_id: 1,
            workflow_step_id: 3,
            status: RunStatus::Running,
            input_ref: Some("seed.txt".to_string()),
            output_ref: None,
            started_at: Utc::now(),
            finished_at: None,
            log: "line one\nline two".to_string(),
        };

        let json = serde_json::to_string(&run).unwrap();
        let parsed: ModuleRun = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, 7);
        assert_eq!(parsed.status, RunStatus::Running);
        assert_eq!(parsed.log, "line one\nline two");
        assert!(parsed.finished_at.is_none());
    }
}
