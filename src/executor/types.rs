use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a task in the queue.
///
/// Wrapper around a UUID string. Doubles as the handle clients poll progress with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generates a new random UUID v4-based TaskId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents the lifecycle state of a task in the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been submitted but not yet picked up by any worker.
    Pending,
    /// Task is currently being processed by a worker.
    /// This state is accompanied by a `lease_expires` timestamp in `TaskEntry`.
    Running,
    /// Task finished successfully.
    Completed,
    /// Task handler returned an `Err`.
    Failed { error: String },
}

/// The definition of a unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    /// A generic execution task.
    Execute {
        /// The name of the registered handler to invoke (e.g., "import_catalog").
        handler: String,
        /// Arbitrary JSON payload passed to the handler function.
        payload: serde_json::Value,
    },
}

impl Task {
    pub fn execute(handler: &str, payload: serde_json::Value) -> Self {
        Task::Execute {
            handler: handler.to_string(),
            payload,
        }
    }

    pub fn handler_name(&self) -> &str {
        match self {
            Task::Execute { handler, .. } => handler,
        }
    }
}

/// The internal representation of a task stored within the `TaskQueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    /// The actual work definition.
    pub task: Task,
    /// Current execution status.
    pub status: TaskStatus,
    /// Index of the worker currently processing this task (if Running).
    pub assigned_to: Option<usize>,
    /// Timestamp (ms) when the task was submitted.
    pub created_at: u64,
    /// Timestamp (ms) when the current execution lease expires.
    /// If `now > lease_expires`, the task is considered abandoned and can be reclaimed.
    pub lease_expires: Option<u64>,
    /// Timestamp (ms) when the task reached `Completed` or `Failed`.
    #[serde(default)]
    pub finished_at: Option<u64>,
}

impl TaskEntry {
    pub fn pending(task: Task, created_at: u64) -> Self {
        Self {
            task,
            status: TaskStatus::Pending,
            assigned_to: None,
            created_at,
            lease_expires: None,
            finished_at: None,
        }
    }
}
