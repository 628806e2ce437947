//! Task record and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::plugin::{TranscodeJob, TranscodeParams, TranscodePlugin};

/// Process-unique task identifier.
pub type TaskId = String;

/// Lifecycle status of a task.
///
/// Transitions only move forward:
/// `Pending -> Running | Cancelled`, `Running -> Succeeded | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a valid transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Running | TaskStatus::Cancelled) => true,
            (
                TaskStatus::Running,
                TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled,
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted transcoding job.
///
/// The scheduler's store owns the canonical record; every `Task` handed out
/// is a snapshot.
#[derive(Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: TranscodeParams,
    /// Format key the plugin was resolved from (e.g. ".flv").
    pub format: String,
    pub status: TaskStatus,
    /// Execution attempts started so far.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Message of the most recent failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip)]
    plugin: Arc<dyn TranscodePlugin>,
}

impl Task {
    pub(crate) fn new(
        input: PathBuf,
        output: PathBuf,
        params: TranscodeParams,
        format: String,
        plugin: Arc<dyn TranscodePlugin>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input,
            output,
            params,
            format,
            status: TaskStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
            plugin,
        }
    }

    /// The plugin bound at submission. Never changes.
    pub fn plugin(&self) -> &Arc<dyn TranscodePlugin> {
        &self.plugin
    }

    /// Builds the execution request handed to the plugin.
    pub fn job(&self) -> TranscodeJob {
        TranscodeJob {
            task_id: self.id.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("format", &self.format)
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .field("plugin", &self.plugin.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlugin;

    #[test]
    fn test_status_transitions() {
        use TaskStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Succeeded));
        for terminal in [Succeeded, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Running, Succeeded, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_new_task() {
        let task = Task::new(
            PathBuf::from("a.flv"),
            PathBuf::from("a.mp4"),
            TranscodeParams::new(),
            ".flv".to_string(),
            Arc::new(MockPlugin::new("flv")),
        );

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 0);
        assert_eq!(task.plugin().kind(), "flv");
        assert_eq!(task.job().task_id, task.id);
    }

    #[test]
    fn test_task_serialization() {
        let task = Task::new(
            PathBuf::from("a.flv"),
            PathBuf::from("a.mp4"),
            TranscodeParams::new(),
            ".flv".to_string(),
            Arc::new(MockPlugin::new("flv")),
        );

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["format"], ".flv");
        assert!(json.get("plugin").is_none());
        assert!(json.get("started_at").is_none());
    }
}
