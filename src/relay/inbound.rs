//! Inbound Relay
//!
//! Receives arbitrary requests against a token-addressed test endpoint. The capture is
//! persisted first; only then is a JSON rendering published to the token's topic. The
//! publish is best-effort: once the request is stored the caller gets its acknowledgment
//! whether or not anyone is watching.

use super::broker::Publisher;
use super::types::{CapturedRequest, InboundRequest};
use super::RelayError;
use crate::storage::{InboundStore, StoreError};

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct InboundRelay {
    store: Arc<dyn InboundStore>,
    publisher: Arc<dyn Publisher>,
}

/// What live viewers receive for each captured request.
#[derive(Serialize)]
struct Notification<'a> {
    id: u64,
    method: &'a str,
    headers: &'a BTreeMap<String, String>,
    body: &'a str,
    query_params: &'a BTreeMap<String, String>,
    received_at: u64,
}

pub fn render_notification(request: &InboundRequest) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Notification {
        id: request.id.0,
        method: &request.method,
        headers: &request.headers,
        body: &request.body,
        query_params: &request.query_params,
        received_at: request.received_at,
    })
}

impl InboundRelay {
    pub fn new(store: Arc<dyn InboundStore>, publisher: Arc<dyn Publisher>) -> Self {
        Self { store, publisher }
    }

    pub async fn receive(
        &self,
        token: Uuid,
        captured: CapturedRequest,
    ) -> Result<InboundRequest, RelayError> {
        let endpoint = self
            .store
            .endpoint_by_token(&token)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => RelayError::UnknownEndpoint(token),
                other => RelayError::Store(other),
            })?;

        let request = self.store.record_request(&endpoint.token, captured).await?;
        tracing::info!(
            token = %token,
            method = %request.method,
            request_id = request.id.0,
            "Captured inbound request"
        );

        self.publish(&endpoint.topic(), &request).await;
        Ok(request)
    }

    async fn publish(&self, topic: &str, request: &InboundRequest) {
        let message = match render_notification(request) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(topic, error = %e, "Failed to render inbound notification");
                return;
            }
        };
        match self.publisher.publish(topic, message).await {
            Ok(viewers) => tracing::debug!(topic, viewers, "Published inbound notification"),
            Err(e) => tracing::warn!(topic, error = %e, "Failed to publish inbound notification"),
        }
    }
}
