//! Task Handler Registry
//!
//! Maps task names (`import_catalog`, `purge_catalog`, `deliver_event`) to async
//! closures. The queue stays generic; the pipelines and the event dispatcher plug
//! themselves in at startup.

use super::types::*;

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A registered handler. It receives the id the task was queued under plus the task.
pub type TaskHandlerFn = Arc<dyn Fn(TaskId, Task) -> HandlerFuture + Send + Sync>;

#[derive(Default)]
pub struct TaskHandlerRegistry {
    handlers: DashMap<String, TaskHandlerFn>,
}

impl TaskHandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `handler` under `handler_name`, replacing any previous binding.
    pub fn register<F, Fut>(&self, handler_name: &str, handler: F)
    where
        F: Fn(TaskId, Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler_fn: TaskHandlerFn =
            Arc::new(move |task_id, task| Box::pin(handler(task_id, task)) as HandlerFuture);
        if self
            .handlers
            .insert(handler_name.to_string(), handler_fn)
            .is_some()
        {
            tracing::warn!(handler = handler_name, "Replaced task handler");
        } else {
            tracing::debug!(handler = handler_name, "Registered task handler");
        }
    }

    /// Runs the handler bound to the task's name. An unknown name is an error, which
    /// the executor records as a failed task.
    pub async fn execute(&self, task_id: &TaskId, task: &Task) -> Result<()> {
        let name = task.handler_name();
        // Clone the Arc out so the shard lock is not held across the await.
        let Some(handler_fn) = self.handlers.get(name).map(|entry| entry.value().clone()) else {
            tracing::error!(task_id = %task_id, handler = name, "Unknown task handler");
            anyhow::bail!("Unknown task handler: {}", name);
        };

        tracing::debug!(task_id = %task_id, handler = name, "Executing task");
        handler_fn(task_id.clone(), task.clone()).await
    }

    /// Registered names, sorted.
    pub fn list_handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}
