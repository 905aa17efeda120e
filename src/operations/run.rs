//! Operation Run Tracker
//!
//! One `OperationRun` accompanies a pipeline from start to terminal state. It keeps the
//! ledger status and the progress snapshot moving together:
//!
//! - `start`: ledger `processing`, snapshot `{processing, 0, <message>}`.
//! - `report`: snapshot only, best-effort.
//! - `complete` / `fail`: terminal snapshot, then the terminal ledger transition.
//!
//! A store error inside `start` or `complete` marks the run failed before it is
//! returned, so the owner's active marker is always released.

use super::types::*;
use crate::executor::types::TaskId;
use crate::storage::{OperationLedger, ProgressStore, StoreResult};

use std::fmt;
use std::sync::Arc;

pub struct OperationRun {
    pub operation_id: OperationId,
    pub owner: String,
    pub kind: OperationKind,
    pub task_id: TaskId,
    key: String,
    progress: Arc<dyn ProgressStore>,
    ledger: Arc<dyn OperationLedger>,
}

impl OperationRun {
    pub fn new(
        operation: &Operation,
        task_id: TaskId,
        progress: Arc<dyn ProgressStore>,
        ledger: Arc<dyn OperationLedger>,
    ) -> Self {
        Self {
            operation_id: operation.id.clone(),
            owner: operation.owner.clone(),
            kind: operation.kind,
            key: progress_key(operation.kind, &task_id),
            task_id,
            progress,
            ledger,
        }
    }

    pub fn progress_key(&self) -> &str {
        &self.key
    }

    pub async fn start(&self, message: &str) -> StoreResult<()> {
        if let Err(e) = self.begin_processing(message).await {
            self.fail(&e).await;
            return Err(e);
        }
        tracing::info!(
            operation_id = %self.operation_id,
            task_id = %self.task_id,
            owner = %self.owner,
            kind = %self.kind,
            "Operation started"
        );
        Ok(())
    }

    async fn begin_processing(&self, message: &str) -> StoreResult<()> {
        self.ledger
            .transition(&self.operation_id, OperationStatus::Processing)
            .await?;
        self.progress
            .put(&self.key, ProgressSnapshot::processing(0, message))
            .await
    }

    /// Progress is advisory: a failed write is logged and the run carries on.
    pub async fn report(&self, percent: u8, message: impl Into<String>) {
        let snapshot = ProgressSnapshot::processing(percent, message);
        if let Err(e) = self.progress.put(&self.key, snapshot).await {
            tracing::warn!(key = %self.key, error = %e, "Failed to write progress snapshot");
        }
    }

    pub async fn complete(&self, message: impl Into<String>) -> StoreResult<()> {
        if let Err(e) = self.finish(message.into()).await {
            self.fail(&e).await;
            return Err(e);
        }
        tracing::info!(
            operation_id = %self.operation_id,
            task_id = %self.task_id,
            kind = %self.kind,
            "Operation completed"
        );
        Ok(())
    }

    async fn finish(&self, message: String) -> StoreResult<()> {
        self.progress
            .put(&self.key, ProgressSnapshot::complete(message))
            .await?;
        self.ledger
            .transition(&self.operation_id, OperationStatus::Completed)
            .await?;
        Ok(())
    }

    /// Records the terminal failure. Both writes are attempted even if one fails;
    /// the caller still owns returning the original error to the task substrate.
    pub async fn fail(&self, error: &(dyn fmt::Display + Sync)) {
        let message = error.to_string();
        tracing::error!(
            operation_id = %self.operation_id,
            task_id = %self.task_id,
            kind = %self.kind,
            error = %message,
            "Operation failed"
        );

        if let Err(e) = self
            .progress
            .put(&self.key, ProgressSnapshot::failed(message))
            .await
        {
            tracing::warn!(key = %self.key, error = %e, "Failed to write failure snapshot");
        }
        if let Err(e) = self
            .ledger
            .transition(&self.operation_id, OperationStatus::Failed)
            .await
        {
            tracing::warn!(operation_id = %self.operation_id, error = %e, "Failed to mark operation failed");
        }
    }
}
