use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic for `TaskEventKind::Started` events.
pub const TOPIC_TASK_STARTED: &str = "dag.task.started";
/// Topic for `TaskEventKind::Completed` events.
pub const TOPIC_TASK_COMPLETED: &str = "dag.task.completed";
/// Topic for `TaskEventKind::Failed` events.
pub const TOPIC_TASK_FAILED: &str = "dag.task.failed";

/// Identifier of a node in the task graph. Chosen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle of a task within one `run`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TaskStatus {
    /// Registered, waiting on dependencies.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Returned an error or panicked.
    Failed { error: String },
    /// Never launched because an earlier task failed or the run was cancelled.
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskEventKind {
    Started,
    Completed,
    Failed,
}

impl TaskEventKind {
    pub fn topic(self) -> &'static str {
        match self {
            TaskEventKind::Started => TOPIC_TASK_STARTED,
            TaskEventKind::Completed => TOPIC_TASK_COMPLETED,
            TaskEventKind::Failed => TOPIC_TASK_FAILED,
        }
    }
}

/// Payload published to the event bus for each task transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind, task_id: &TaskId, error: Option<String>) -> Self {
        Self {
            kind,
            task_id: task_id.0.clone(),
            error,
            at: Utc::now(),
        }
    }
}
