use super::types::*;
use crate::api_error::{api_conflict, api_internal, api_store_error, api_validation_error, ApiError};
use crate::app::AppState;
use crate::auth::Owner;
use crate::executor::types::{Task, TaskId};
use crate::storage::StoreError;

use anyhow::Context;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use std::path::Path as FsPath;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const OPERATION_HISTORY_LIMIT: usize = 50;

const NO_FILE: &str = "No file uploaded";
const NOT_CSV: &str = "Invalid file type. Please upload a CSV.";

fn admission_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(reason) => {
            tracing::debug!(reason = %reason, "Submission refused");
            api_conflict(
                "operation_active",
                "Another bulk operation is already in progress",
            )
        }
        other => api_store_error("Failed to create operation", other),
    }
}

/// Marks an admitted operation failed when it never made it onto the queue.
async fn abandon(state: &AppState, operation_id: &OperationId) {
    if let Err(e) = state
        .ledger
        .transition(operation_id, OperationStatus::Failed)
        .await
    {
        tracing::warn!(operation_id = %operation_id, error = %e, "Failed to abandon operation");
    }
}

/// Queues the pipeline task for an admitted operation and links the two.
async fn schedule(state: &AppState, operation: Operation) -> Result<SubmissionResponse, ApiError> {
    let payload = PipelineTaskPayload {
        operation_id: operation.id.clone(),
        owner: operation.owner.clone(),
        file_path: operation.file_path.clone(),
    };
    let submitted = serde_json::to_value(&payload)
        .map_err(anyhow::Error::from)
        .and_then(|payload| {
            state
                .queue
                .submit(Task::execute(operation.kind.handler_name(), payload))
        });
    let task_id = match submitted {
        Ok(task_id) => task_id,
        Err(e) => {
            abandon(state, &operation.id).await;
            return Err(api_internal("Failed to queue operation", &e));
        }
    };

    state
        .ledger
        .attach_task(&operation.id, &task_id)
        .await
        .map_err(|e| api_store_error("Failed to record task", e))?;
    tracing::info!(
        operation_id = %operation.id,
        task_id = %task_id,
        owner = %operation.owner,
        kind = %operation.kind,
        "Operation queued"
    );

    Ok(SubmissionResponse {
        operation_id: operation.id,
        task_id,
    })
}

/// Accepts a multipart upload with a `file` part ending in `.csv`.
///
/// The admission check runs before any bytes are written, so a refused upload leaves
/// nothing behind. The file is streamed to `<upload_dir>/tmp/<uuid>-<name>`.
pub async fn handle_upload(
    State(state): State<AppState>,
    owner: Owner,
    mut multipart: Multipart,
) -> Result<Json<SubmissionResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_validation_error(&e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        return accept_upload(&state, &owner, field).await.map(Json);
    }
    Err(api_validation_error(NO_FILE))
}

async fn accept_upload(
    state: &AppState,
    owner: &Owner,
    mut field: Field<'_>,
) -> Result<SubmissionResponse, ApiError> {
    // Keep only the final path component of whatever the client sent.
    let file_name = field
        .file_name()
        .and_then(|name| FsPath::new(name).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .to_string();
    if file_name.is_empty() {
        return Err(api_validation_error(NO_FILE));
    }
    if !file_name.ends_with(".csv") {
        return Err(api_validation_error(NOT_CSV));
    }

    let staging = state.upload_dir.join("tmp");
    let path = staging.join(format!("{}-{}", Uuid::new_v4(), file_name));
    let operation = state
        .ledger
        .begin(NewOperation {
            owner: owner.as_str().to_string(),
            kind: OperationKind::Import,
            file_path: Some(path.to_string_lossy().into_owned()),
        })
        .await
        .map_err(admission_error)?;

    match stage_upload(&staging, &path, &mut field).await {
        Ok(bytes) => {
            tracing::info!(operation_id = %operation.id, path = %path.display(), bytes, "Upload staged")
        }
        Err(e) => {
            remove_staged(&path).await;
            abandon(state, &operation.id).await;
            return Err(api_internal("Failed to save upload", &format!("{:#}", e)));
        }
    }

    schedule(state, operation).await
}

async fn stage_upload(staging: &FsPath, path: &FsPath, field: &mut Field<'_>) -> anyhow::Result<u64> {
    tokio::fs::create_dir_all(staging)
        .await
        .with_context(|| format!("create {}", staging.display()))?;
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.context("read upload")? {
        file.write_all(&chunk).await.context("write upload")?;
        written += chunk.len() as u64;
    }
    file.flush().await.context("flush upload")?;
    Ok(written)
}

/// Staged uploads are disposable; failing to remove one is only logged.
pub async fn remove_staged(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
        }
    }
}

pub async fn handle_delete_all(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let operation = state
        .ledger
        .begin(NewOperation {
            owner: owner.as_str().to_string(),
            kind: OperationKind::Delete,
            file_path: None,
        })
        .await
        .map_err(admission_error)?;
    Ok(Json(schedule(&state, operation).await?))
}

/// An unknown or expired handle reads the same as one that has not started yet.
async fn read_progress(
    state: &AppState,
    kind: OperationKind,
    task_id: String,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let key = progress_key(kind, &TaskId(task_id));
    let snapshot = state
        .progress
        .get(&key)
        .await
        .map_err(|e| api_store_error("Failed to read progress", e))?
        .unwrap_or_else(ProgressSnapshot::pending);
    Ok(Json(snapshot))
}

pub async fn handle_upload_progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    read_progress(&state, OperationKind::Import, task_id).await
}

pub async fn handle_delete_progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    read_progress(&state, OperationKind::Delete, task_id).await
}

pub async fn handle_active_operation(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<ActiveOperationResponse>, ApiError> {
    let active = state
        .ledger
        .active_for(owner.as_str())
        .await
        .map_err(|e| api_store_error("Failed to read active operation", e))?;
    Ok(Json(ActiveOperationResponse {
        active: active.is_some(),
        operation: active.as_ref().map(ActiveOperation::from),
    }))
}

pub async fn handle_list_operations(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<Vec<Operation>>, ApiError> {
    let operations = state
        .ledger
        .list_for(owner.as_str(), OPERATION_HISTORY_LIMIT)
        .await
        .map_err(|e| api_store_error("Failed to list operations", e))?;
    Ok(Json(operations))
}
