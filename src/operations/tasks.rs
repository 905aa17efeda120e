//! Pipeline task handlers.
//!
//! Each bulk operation runs as one queued task. The handler rebuilds the `OperationRun`
//! from the ledger and hands it to the pipeline. A pipeline `Err` is returned to the
//! executor, which marks the task `Failed` and logs the error text.

use super::handlers::remove_staged;
use super::run::OperationRun;
use super::types::{OperationKind, PipelineTaskPayload};
use crate::app::AppState;
use crate::executor::registry::TaskHandlerRegistry;
use crate::executor::types::{Task, TaskId};
use crate::ingestion::pipeline::IngestPipeline;
use crate::purge::pipeline::PurgePipeline;

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub fn register_pipeline_handlers(registry: &TaskHandlerRegistry, state: &AppState) {
    let import_state = state.clone();
    registry.register(OperationKind::Import.handler_name(), move |task_id, task| {
        let state = import_state.clone();
        async move { run_import(&state, task_id, task).await }
    });

    let purge_state = state.clone();
    registry.register(OperationKind::Delete.handler_name(), move |task_id, task| {
        let state = purge_state.clone();
        async move { run_purge(&state, task_id, task).await }
    });
}

async fn load_run(
    state: &AppState,
    task_id: TaskId,
    task: Task,
) -> Result<(OperationRun, PipelineTaskPayload)> {
    let Task::Execute { payload, .. } = task;
    let job: PipelineTaskPayload =
        serde_json::from_value(payload).context("Invalid pipeline task payload")?;
    let operation = state
        .ledger
        .get(&job.operation_id)
        .await
        .with_context(|| format!("Operation {} not found", job.operation_id))?;
    let run = OperationRun::new(
        &operation,
        task_id,
        state.progress.clone(),
        state.ledger.clone(),
    );
    Ok((run, job))
}

async fn run_import(state: &AppState, task_id: TaskId, task: Task) -> Result<()> {
    let (run, job) = load_run(state, task_id, task).await?;
    let Some(path) = job.file_path.map(PathBuf::from) else {
        let err = anyhow!("Import {} has no staged file", run.operation_id);
        run.fail(&err).await;
        return Err(err);
    };

    let result = import_file(state, &run, &path).await;
    remove_staged(&path).await;
    let summary = result?;
    tracing::debug!(
        task_id = %run.task_id,
        rows = summary.rows_processed,
        "Import task done"
    );
    Ok(())
}

async fn import_file(
    state: &AppState,
    run: &OperationRun,
    path: &Path,
) -> Result<crate::ingestion::types::IngestSummary> {
    let (file, size) = match open_staged(path).await {
        Ok(opened) => opened,
        Err(e) => {
            run.fail(&e).await;
            return Err(e).with_context(|| format!("open {}", path.display()));
        }
    };
    let pipeline = IngestPipeline::new(
        state.records.clone(),
        state.notifier.clone(),
        state.settings,
    );
    Ok(pipeline.run(run, file, size).await?)
}

async fn open_staged(path: &Path) -> std::io::Result<(std::fs::File, Option<u64>)> {
    let file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await.ok().map(|metadata| metadata.len());
    Ok((file.into_std().await, size))
}

async fn run_purge(state: &AppState, task_id: TaskId, task: Task) -> Result<()> {
    let (run, _) = load_run(state, task_id, task).await?;
    let pipeline = PurgePipeline::new(
        state.records.clone(),
        state.notifier.clone(),
        state.settings.batch_size,
    );
    let summary = pipeline.run(&run).await?;
    tracing::debug!(
        task_id = %run.task_id,
        deleted = summary.deleted,
        "Purge task done"
    );
    Ok(())
}
