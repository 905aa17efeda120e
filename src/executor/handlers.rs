use super::protocol::TaskStatusResponse;
use super::types::TaskId;
use crate::api_error::{api_not_found, ApiError};
use crate::app::AppState;

use axum::extract::{Path, State};
use axum::Json;

pub async fn handle_get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task_id = TaskId(task_id);

    match state.queue.get_task(&task_id) {
        Some(entry) => {
            tracing::debug!("Task status query: {} -> {:?}", task_id, entry.status);
            Ok(Json(TaskStatusResponse {
                handler: entry.task.handler_name().to_string(),
                task_id,
                status: entry.status,
                created_at: entry.created_at,
            }))
        }
        None => {
            tracing::debug!("Task not found: {}", task_id);
            Err(api_not_found("task not found"))
        }
    }
}
