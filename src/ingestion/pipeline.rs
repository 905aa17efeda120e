//! Import Pipeline
//!
//! Streams a CSV file into the record store for one owner:
//!
//! 1. Rows are parsed off-thread (see `reader`) and arrive in file order.
//! 2. Accepted rows go into a batch map keyed by normalized SKU, so a later row for the
//!    same SKU replaces the earlier one (last row wins within a batch).
//! 3. When the map holds `batch_size` SKUs it is upserted in one call and cleared.
//!    Duplicates that straddle a batch boundary are resolved by the upsert itself.
//! 4. Every `progress_every` accepted rows a `processing` snapshot is written with
//!    `floor(bytes_read / total * 100)`, held below 100 until the terminal snapshot.
//!
//! Flushed batches stay committed if a later step fails.

use super::reader::{read_rows, READ_AHEAD_ROWS};
use super::types::{IngestSettings, IngestSummary};
use crate::catalog::types::RecordDraft;
use crate::events::notifier::Notifier;
use crate::operations::run::OperationRun;
use crate::operations::types::PipelineError;
use crate::storage::RecordStore;

use serde_json::json;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const START_MESSAGE: &str = "Starting import...";
pub const COMPLETE_MESSAGE: &str = "Import complete!";

pub struct IngestPipeline {
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    settings: IngestSettings,
}

impl IngestPipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            records,
            notifier,
            settings,
        }
    }

    /// Runs the import to a terminal state. On failure the `failed` snapshot and ledger
    /// status are written before the error is returned.
    ///
    /// `total_bytes` of `None` (or zero) keeps reported progress at 0 until completion.
    pub async fn run<R>(
        &self,
        run: &OperationRun,
        input: R,
        total_bytes: Option<u64>,
    ) -> Result<IngestSummary, PipelineError>
    where
        R: Read + Send + 'static,
    {
        run.start(START_MESSAGE).await?;

        let summary = match self.ingest(run, input, total_bytes).await {
            Ok(summary) => summary,
            Err(err) => {
                run.fail(&err).await;
                return Err(err);
            }
        };

        run.complete(COMPLETE_MESSAGE).await?;
        tracing::info!(
            operation_id = %run.operation_id,
            rows = summary.rows_processed,
            batches = summary.batches_flushed,
            "Import finished"
        );

        self.notifier
            .notify(
                &run.owner,
                run.kind.completion_event(),
                json!({
                    "operation_id": run.operation_id,
                    "rows_processed": summary.rows_processed,
                }),
            )
            .await;

        Ok(summary)
    }

    async fn ingest<R>(
        &self,
        run: &OperationRun,
        input: R,
        total_bytes: Option<u64>,
    ) -> Result<IngestSummary, PipelineError>
    where
        R: Read + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(READ_AHEAD_ROWS);
        let reader = tokio::task::spawn_blocking(move || read_rows(input, tx));

        let batch_size = self.settings.batch_size.max(1);
        let progress_every = self.settings.progress_every.max(1);
        let mut batch: HashMap<String, RecordDraft> = HashMap::with_capacity(batch_size);
        let mut summary = IngestSummary::default();

        while let Some(row) = rx.recv().await {
            let row = row?;
            batch.insert(row.draft.sku.clone(), row.draft);
            summary.rows_processed += 1;

            if batch.len() >= batch_size {
                self.flush(&run.owner, &mut batch, &mut summary).await?;
            }

            if summary.rows_processed % progress_every == 0 {
                run.report(
                    percent_of(row.bytes_read, total_bytes),
                    format!("Processed {} records...", summary.rows_processed),
                )
                .await;
            }
        }

        reader
            .await
            .map_err(|e| PipelineError::Reader(e.to_string()))?;

        if !batch.is_empty() {
            self.flush(&run.owner, &mut batch, &mut summary).await?;
        }
        Ok(summary)
    }

    async fn flush(
        &self,
        owner: &str,
        batch: &mut HashMap<String, RecordDraft>,
        summary: &mut IngestSummary,
    ) -> Result<(), PipelineError> {
        let drafts: Vec<RecordDraft> = batch.drain().map(|(_, draft)| draft).collect();
        let applied = self.records.upsert_batch(owner, drafts).await?;
        summary.batches_flushed += 1;
        tracing::debug!(owner, applied, batch = summary.batches_flushed, "Flushed import batch");
        Ok(())
    }
}

/// 100 is reserved for the terminal snapshot.
pub fn percent_of(consumed: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => (consumed.saturating_mul(100) / total).min(99) as u8,
        _ => 0,
    }
}
