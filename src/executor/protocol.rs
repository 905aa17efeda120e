//! Task API Protocol
//!
//! DTOs for the task status endpoint.

use super::types::*;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_TASK_STATUS: &str = "/tasks/:task_id";

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: TaskId,
    pub handler: String,
    pub status: TaskStatus,
    pub created_at: u64,
}
