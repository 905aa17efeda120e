//! Event Dispatcher
//!
//! Fans one event out to every active, subscribed webhook of an owner. Each delivery is
//! a single POST of `{"event": ..., "payload": ...}` with a bounded timeout. Failures are
//! logged and counted, never retried: at most one attempt per event per subscription.
//! Deliveries run concurrently and independently, so a slow or broken URL does not
//! hold up the others.

use super::notifier::DELIVER_EVENT_HANDLER;
use super::types::{DeliveryReport, DeliveryTaskPayload, EventEnvelope, EventKind};
use crate::executor::registry::TaskHandlerRegistry;
use crate::executor::types::Task;
use crate::storage::{StoreError, SubscriptionStore};

use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to load subscriptions: {0}")]
    Store(#[from] StoreError),
}

pub struct EventDispatcher {
    subscriptions: Arc<dyn SubscriptionStore>,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl EventDispatcher {
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>, timeout: Duration) -> Self {
        Self {
            subscriptions,
            http_client: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn dispatch(
        &self,
        owner: &str,
        event: EventKind,
        payload: Value,
    ) -> Result<DeliveryReport, DispatchError> {
        let targets: Vec<String> = self
            .subscriptions
            .list_for(owner)
            .await?
            .into_iter()
            .filter(|subscription| subscription.wants(event))
            .map(|subscription| subscription.url)
            .collect();

        let mut report = DeliveryReport {
            matched: targets.len(),
            ..Default::default()
        };
        if targets.is_empty() {
            tracing::debug!(owner, event = %event, "No subscribers for event");
            return Ok(report);
        }

        let envelope = Arc::new(EventEnvelope { event, payload });
        let mut deliveries = JoinSet::new();
        for url in targets {
            let client = self.http_client.clone();
            let envelope = envelope.clone();
            let timeout = self.timeout;
            deliveries.spawn(async move {
                let result = deliver(&client, &url, &envelope, timeout).await;
                (url, result)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((url, Ok(()))) => {
                    report.delivered += 1;
                    tracing::info!(url = %url, event = %event, "Webhook sent");
                }
                Ok((url, Err(e))) => {
                    report.failed += 1;
                    tracing::error!(url = %url, event = %event, error = %e, "Failed to send webhook");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(event = %event, error = %e, "Webhook delivery task aborted");
                }
            }
        }

        Ok(report)
    }
}

async fn deliver(
    client: &reqwest::Client,
    url: &str,
    envelope: &EventEnvelope,
    timeout: Duration,
) -> Result<(), reqwest::Error> {
    client
        .post(url)
        .json(envelope)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

/// Wires the dispatcher behind the `deliver_event` task.
pub fn register_delivery_handler(registry: &TaskHandlerRegistry, dispatcher: Arc<EventDispatcher>) {
    registry.register(DELIVER_EVENT_HANDLER, move |task_id, task| {
        let dispatcher = dispatcher.clone();
        async move {
            let Task::Execute { payload, .. } = task;
            let job: DeliveryTaskPayload =
                serde_json::from_value(payload).context("Invalid deliver_event payload")?;
            let report = dispatcher
                .dispatch(&job.owner, job.event, job.payload)
                .await
                .with_context(|| format!("Dispatch of {} failed", job.event))?;
            tracing::debug!(
                task_id = %task_id,
                matched = report.matched,
                delivered = report.delivered,
                failed = report.failed,
                "Event dispatched"
            );
            Ok(())
        }
    });
}
