//! The seam through which pipelines and catalog handlers emit events.
//!
//! Emitters never call subscriber URLs themselves. `QueuedNotifier` turns each event into
//! a `deliver_event` task, so delivery runs on the worker pool and cannot slow down or
//! fail the emitter.

use super::types::{DeliveryTaskPayload, EventKind};
use crate::executor::queue::TaskQueue;
use crate::executor::types::Task;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const DELIVER_EVENT_HANDLER: &str = "deliver_event";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner: &str, event: EventKind, payload: Value);
}

pub struct QueuedNotifier {
    queue: Arc<TaskQueue>,
}

impl QueuedNotifier {
    pub fn new(queue: Arc<TaskQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Notifier for QueuedNotifier {
    async fn notify(&self, owner: &str, event: EventKind, payload: Value) {
        let job = DeliveryTaskPayload {
            owner: owner.to_string(),
            event,
            payload,
        };
        let payload = match serde_json::to_value(&job) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(owner, event = %event, error = %e, "Failed to encode event");
                return;
            }
        };

        match self.queue.submit(Task::execute(DELIVER_EVENT_HANDLER, payload)) {
            Ok(task_id) => {
                tracing::debug!(owner, event = %event, task_id = %task_id, "Queued event delivery")
            }
            Err(e) => tracing::error!(owner, event = %event, error = %e, "Failed to queue event"),
        }
    }
}

/// Collects notifications in memory for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    events: std::sync::Mutex<Vec<(String, EventKind, Value)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, EventKind, Value)> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, owner: &str, event: EventKind, payload: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push((owner.to_string(), event, payload));
        }
    }
}
