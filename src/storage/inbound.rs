use super::{now_ms, InboundStore, StoreError, StoreResult};
use crate::relay::types::{CapturedRequest, InboundEndpoint, InboundRequest, InboundRequestId};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub struct MemoryInboundStore {
    endpoints: DashMap<Uuid, InboundEndpoint>,
    /// Structure: `owner -> token of the owner's current endpoint`.
    current: DashMap<String, Uuid>,
    /// Structure: `token -> captures in receipt order`.
    requests: DashMap<Uuid, Vec<InboundRequest>>,
    next_id: AtomicU64,
}

impl MemoryInboundStore {
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
            current: DashMap::new(),
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryInboundStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_token(token: &Uuid) -> StoreError {
    StoreError::NotFound(format!("endpoint {}", token))
}

#[async_trait]
impl InboundStore for MemoryInboundStore {
    async fn current_endpoint(&self, owner: &str) -> StoreResult<InboundEndpoint> {
        let token = *self
            .current
            .entry(owner.to_string())
            .or_insert_with(|| {
                let endpoint = InboundEndpoint {
                    token: Uuid::new_v4(),
                    owner: owner.to_string(),
                    created_at: now_ms(),
                };
                tracing::info!(owner, token = %endpoint.token, "Created inbound endpoint");
                let token = endpoint.token;
                self.endpoints.insert(token, endpoint);
                token
            });
        self.endpoint_by_token(&token).await
    }

    async fn endpoint_by_token(&self, token: &Uuid) -> StoreResult<InboundEndpoint> {
        self.endpoints
            .get(token)
            .map(|endpoint| endpoint.clone())
            .ok_or_else(|| unknown_token(token))
    }

    async fn record_request(
        &self,
        token: &Uuid,
        captured: CapturedRequest,
    ) -> StoreResult<InboundRequest> {
        if !self.endpoints.contains_key(token) {
            return Err(unknown_token(token));
        }
        let request = InboundRequest {
            id: InboundRequestId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            token: *token,
            method: captured.method,
            headers: captured.headers,
            body: captured.body,
            query_params: captured.query_params,
            received_at: now_ms(),
        };
        self.requests
            .entry(*token)
            .or_default()
            .push(request.clone());
        Ok(request)
    }

    async fn recent_requests(&self, token: &Uuid, limit: usize) -> StoreResult<Vec<InboundRequest>> {
        Ok(self
            .requests
            .get(token)
            .map(|requests| requests.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
