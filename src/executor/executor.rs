//! Worker Pool
//!
//! Runs queued tasks off the request path. Each worker claims the oldest available task,
//! runs its handler under a renewed lease and records the outcome on the queue.
//! Idle workers park until a submission wakes them, with a periodic re-check so tasks
//! whose lease expired are picked up again even when nothing new arrives.

use super::queue::{TaskQueue, LEASE_DURATION_MS};
use super::registry::TaskHandlerRegistry;
use super::types::*;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on how long an idle worker sleeps before re-scanning the queue.
const IDLE_RECHECK: Duration = Duration::from_millis(250);

pub struct TaskExecutor {
    queue: Arc<TaskQueue>,
    handlers: Arc<TaskHandlerRegistry>,
    worker_count: usize,
}

impl TaskExecutor {
    /// `worker_count` is clamped to at least one.
    pub fn new(
        queue: Arc<TaskQueue>,
        handlers: Arc<TaskHandlerRegistry>,
        worker_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            handlers,
            worker_count: worker_count.max(1),
        })
    }

    /// Spawns the workers and returns immediately.
    pub async fn start(self: Arc<Self>) {
        tracing::info!(workers = self.worker_count, "Starting task workers");

        for worker_id in 0..self.worker_count {
            let executor = self.clone();
            tokio::spawn(async move {
                executor.worker_loop(worker_id).await;
            });
        }
    }

    async fn worker_loop(&self, worker_id: usize) {
        tracing::debug!(worker_id, "Worker started");

        loop {
            match self.queue.claim_next(worker_id) {
                Some((task_id, task)) => self.execute_with_lease(&task_id, task).await,
                None => {
                    // Timing out here is the normal idle path.
                    let _ = tokio::time::timeout(IDLE_RECHECK, self.queue.work_available()).await;
                }
            }
        }
    }

    /// Runs one claimed task to completion while a sidecar keeps its lease alive.
    pub async fn execute_with_lease(&self, task_id: &TaskId, task: Task) {
        let handler = task.handler_name().to_string();
        let started = Instant::now();
        let renewal = self.spawn_lease_renewal(task_id);

        let result = self.handlers.execute(task_id, &task).await;
        renewal.abort();

        tracing::debug!(
            task_id = %task_id,
            handler = %handler,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Handler returned"
        );
        if let Err(e) = self.queue.complete_task(task_id, result) {
            tracing::error!(task_id = %task_id, error = %e, "Failed to record task outcome");
        }
    }

    fn spawn_lease_renewal(&self, task_id: &TaskId) -> tokio::task::JoinHandle<()> {
        let queue = self.queue.clone();
        let task_id = task_id.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(LEASE_DURATION_MS / 3));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if queue.renew_lease(&task_id).is_err() {
                    tracing::trace!(task_id = %task_id, "Lease renewal stopped");
                    break;
                }
            }
        })
    }
}
