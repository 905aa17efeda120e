//! Task Queue
//!
//! The local backlog of background work. Submission handlers push tasks here and
//! return immediately; the `TaskExecutor` worker pool pulls them off and runs them.
//!
//! ## Responsibilities
//! - **Submission**: Assigning a fresh `TaskId` and storing the task as `Pending`.
//! - **Claiming**: Atomically flipping `Pending -> Running` so only one worker runs a task.
//! - **Leasing**: Tracking lease expiry so a task whose worker died can be picked up again.
//! - **Completion**: Recording the terminal `Completed` / `Failed` state.
//! - **Eviction**: Dropping finished entries once their retention window has passed.

use super::types::*;
use crate::storage::now_ms;

use anyhow::Result;
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::Notify;

/// Lease granted to a worker when it claims a task.
pub const LEASE_DURATION_MS: u64 = 30_000;

/// The central component holding task state.
pub struct TaskQueue {
    /// Structure: `Task ID -> TaskEntry`.
    tasks: DashMap<TaskId, TaskEntry>,
    /// Wakes parked workers on submission.
    wake: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            wake: Notify::new(),
        }
    }

    /// Submits a new task. It becomes visible to workers immediately.
    pub fn submit(&self, task: Task) -> Result<TaskId> {
        let task_id = TaskId::new();
        tracing::debug!(
            task_id = %task_id,
            handler = task.handler_name(),
            "Queued task"
        );
        self.tasks
            .insert(task_id.clone(), TaskEntry::pending(task, now_ms()));
        self.wake.notify_waiters();
        Ok(task_id)
    }

    /// Resolves on the next submission.
    pub async fn work_available(&self) {
        self.wake.notified().await
    }

    /// Claims the oldest available task for `worker_id`, if any.
    pub fn claim_next(&self, worker_id: usize) -> Option<(TaskId, Task)> {
        for (task_id, entry) in self.pending_tasks() {
            match self.try_claim_task(&task_id, worker_id) {
                Ok(true) => {
                    tracing::info!(
                        task_id = %task_id,
                        worker_id,
                        handler = entry.task.handler_name(),
                        "Worker claimed task"
                    );
                    return Some((task_id, entry.task));
                }
                Ok(false) => continue,
                Err(e) => tracing::warn!(task_id = %task_id, error = %e, "Failed to claim task"),
            }
        }
        None
    }

    /// Retrieves all tasks that are eligible for execution.
    ///
    /// Eligible tasks are:
    /// 1. Status is `Pending`.
    /// 2. Status is `Running` BUT the lease has expired (worker crashed).
    pub fn pending_tasks(&self) -> Vec<(TaskId, TaskEntry)> {
        let now = now_ms();
        let mut tasks: Vec<(TaskId, TaskEntry)> = self
            .tasks
            .iter()
            .filter(|entry| is_available(entry.value(), now))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        // Oldest first so submission order is roughly preserved.
        tasks.sort_by_key(|(_, entry)| entry.created_at);
        tasks
    }

    /// Attempts to lock an available task for execution by a worker.
    ///
    /// Sets the task status to `Running` and establishes a lease.
    pub fn try_claim_task(&self, task_id: &TaskId, worker_id: usize) -> Result<bool> {
        let Some(mut entry) = self.tasks.get_mut(task_id) else {
            return Ok(false);
        };

        // Another worker might have raced us.
        if !is_available(&entry, now_ms()) {
            return Ok(false);
        }

        entry.status = TaskStatus::Running;
        entry.assigned_to = Some(worker_id);
        entry.lease_expires = Some(now_ms() + LEASE_DURATION_MS);

        tracing::debug!(task_id = %task_id, worker_id, "Claimed task");
        Ok(true)
    }

    /// Extends the lease of a currently running task.
    pub fn renew_lease(&self, task_id: &TaskId) -> Result<()> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow::anyhow!("Task not found"))?;

        if entry.status != TaskStatus::Running {
            return Err(anyhow::anyhow!(
                "Task not running (status: {:?})",
                entry.status
            ));
        }

        entry.lease_expires = Some(now_ms() + LEASE_DURATION_MS);
        tracing::trace!(task_id = %task_id, "Renewed lease");
        Ok(())
    }

    /// Marks a task as either `Completed` or `Failed`.
    /// Clears the lease so it is no longer tracked for expiration.
    pub fn complete_task(&self, task_id: &TaskId, result: Result<()>) -> Result<()> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow::anyhow!("Task not found"))?;

        match result {
            Ok(_) => {
                entry.status = TaskStatus::Completed;
                tracing::info!(task_id = %task_id, "Task completed");
            }
            Err(e) => {
                entry.status = TaskStatus::Failed {
                    error: format!("{:#}", e),
                };
                tracing::error!(task_id = %task_id, error = %format!("{:#}", e), "Task failed");
            }
        }
        entry.lease_expires = None;
        entry.finished_at = Some(now_ms());
        Ok(())
    }

    /// Removes `Completed` / `Failed` entries that finished at least `older_than` ago.
    /// Returns how many were dropped.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(older_than.as_millis() as u64);
        let before = self.tasks.len();
        self.tasks
            .retain(|_, entry| !entry.finished_at.is_some_and(|finished| finished <= cutoff));
        let evicted = before.saturating_sub(self.tasks.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted finished tasks");
        }
        evicted
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<TaskEntry> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }

    /// Returns `(pending, running, completed, failed)` counts.
    pub fn status_counts(&self) -> (usize, usize, usize, usize) {
        let mut pending = 0;
        let mut running = 0;
        let mut completed = 0;
        let mut failed = 0;

        for entry in self.tasks.iter() {
            match entry.status {
                TaskStatus::Pending => pending += 1,
                TaskStatus::Running => running += 1,
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed { .. } => failed += 1,
            }
        }

        (pending, running, completed, failed)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn is_available(entry: &TaskEntry, now: u64) -> bool {
    match entry.status {
        TaskStatus::Pending => true,
        TaskStatus::Running => entry.lease_expires.is_some_and(|lease| now > lease),
        _ => false,
    }
}
