//! Bulk Delete Pipeline
//!
//! Deletes every record an owner has, `batch_size` ids at a time. The total is counted
//! once up front; after each batch a `processing` snapshot reports
//! `floor(deleted / total * 100)`. The loop ends when a fetch comes back empty, so
//! records created mid-run may also be removed and the percent is clamped at 100.

use crate::events::notifier::Notifier;
use crate::operations::run::OperationRun;
use crate::operations::types::PipelineError;
use crate::storage::RecordStore;

use serde_json::json;
use std::sync::Arc;

pub const START_MESSAGE: &str = "Starting deletion...";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub total: u64,
    pub deleted: u64,
    pub batches: u64,
}

pub struct PurgePipeline {
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    batch_size: usize,
}

impl PurgePipeline {
    pub fn new(records: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>, batch_size: usize) -> Self {
        Self {
            records,
            notifier,
            batch_size: batch_size.max(1),
        }
    }

    /// Runs the deletion to a terminal state; failures are recorded, then returned.
    pub async fn run(&self, run: &OperationRun) -> Result<PurgeSummary, PipelineError> {
        run.start(START_MESSAGE).await?;

        let summary = match self.purge(run).await {
            Ok(summary) => summary,
            Err(err) => {
                run.fail(&err).await;
                return Err(err);
            }
        };

        run.complete(format!("Deleted {} products", summary.deleted))
            .await?;
        tracing::info!(
            operation_id = %run.operation_id,
            deleted = summary.deleted,
            batches = summary.batches,
            "Bulk delete finished"
        );

        self.notifier
            .notify(
                &run.owner,
                run.kind.completion_event(),
                json!({
                    "operation_id": run.operation_id,
                    "deleted_count": summary.deleted,
                }),
            )
            .await;

        Ok(summary)
    }

    async fn purge(&self, run: &OperationRun) -> Result<PurgeSummary, PipelineError> {
        let mut summary = PurgeSummary {
            total: self.records.count_owned(&run.owner).await?,
            ..Default::default()
        };
        if summary.total == 0 {
            return Ok(summary);
        }

        loop {
            let ids = self.records.owned_ids(&run.owner, self.batch_size).await?;
            if ids.is_empty() {
                break;
            }

            summary.deleted += self.records.delete_ids(&ids).await?;
            summary.batches += 1;

            let percent = (summary.deleted.saturating_mul(100) / summary.total).min(100) as u8;
            run.report(percent, format!("Deleted {} products...", summary.deleted))
                .await;
        }

        Ok(summary)
    }
}
