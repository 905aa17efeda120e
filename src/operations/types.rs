//! Operation & Progress Types
//!
//! An `Operation` is the durable ledger entry for one bulk import or bulk delete.
//! A `ProgressSnapshot` is the ephemeral status a client polls while it runs.

use crate::events::types::EventKind;
use crate::executor::types::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct OperationId(pub String);

impl OperationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Import,
    Delete,
}

impl OperationKind {
    /// Name of the task handler that runs this kind of operation.
    pub fn handler_name(self) -> &'static str {
        match self {
            OperationKind::Import => "import_catalog",
            OperationKind::Delete => "purge_catalog",
        }
    }

    /// Event emitted to subscribers when an operation of this kind completes.
    pub fn completion_event(self) -> EventKind {
        match self {
            OperationKind::Import => EventKind::ImportCompleted,
            OperationKind::Delete => EventKind::BulkDeleteCompleted,
        }
    }

    fn progress_prefix(self) -> &'static str {
        match self {
            OperationKind::Import => "import",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.progress_prefix())
    }
}

/// Durable lifecycle: `pending -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Pending and processing operations block new submissions for the owner.
    pub fn is_active(self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Allowed forward moves. Terminal states are final, so a second terminal
    /// transition is rejected.
    pub fn can_transition_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Completed) | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub owner: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub created_at: u64,
    pub updated_at: u64,
    /// Staged upload backing an import.
    pub file_path: Option<String>,
    /// Handle of the queued task running this operation.
    pub task_id: Option<TaskId>,
}

#[derive(Debug, Clone)]
pub struct NewOperation {
    pub owner: String,
    pub kind: OperationKind,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    /// Whole percent, 0-100.
    pub progress: u8,
    pub message: String,
}

impl ProgressSnapshot {
    /// What pollers see when no snapshot exists yet (or it expired).
    pub fn pending() -> Self {
        Self {
            status: ProgressStatus::Pending,
            progress: 0,
            message: "Initializing...".to_string(),
        }
    }

    pub fn processing(progress: u8, message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Processing,
            progress: progress.min(100),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Complete,
            progress: 100,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Failed,
            progress: 0,
            message: message.into(),
        }
    }
}

/// Import and delete progress live in separate key namespaces.
pub fn progress_key(kind: OperationKind, task_id: &TaskId) -> String {
    format!("{}_progress_{}", kind.progress_prefix(), task_id)
}

/// Response for a successful bulk submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub operation_id: OperationId,
    pub task_id: TaskId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveOperationResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<ActiveOperation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveOperation {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub task_id: Option<TaskId>,
}

impl From<&Operation> for ActiveOperation {
    fn from(op: &Operation) -> Self {
        Self {
            operation_id: op.id.clone(),
            kind: op.kind,
            status: op.status,
            task_id: op.task_id.clone(),
        }
    }
}

/// Payload carried by pipeline tasks through the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTaskPayload {
    pub operation_id: OperationId,
    pub owner: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Why a pipeline run ended in `failed`. The display text is what pollers see.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("{0}")]
    Store(#[from] crate::storage::StoreError),
    #[error("Row reader stopped unexpectedly: {0}")]
    Reader(String),
}
