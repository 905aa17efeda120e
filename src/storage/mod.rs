//! Storage Module
//!
//! The persistence boundary. Every collaborator the pipelines and handlers touch is
//! an injected trait object, so the core logic runs the same against the in-memory
//! implementations here (used by the binary and the tests) and against an external
//! database or cache.
//!
//! ## Stores
//! - **`RecordStore`**: catalog records, unique on `(owner, sku)`. Bulk upsert/delete for
//!   the pipelines, single-record CRUD for the catalog page.
//! - **`OperationLedger`**: durable Operation history and the one-active-operation-per-owner
//!   admission marker.
//! - **`ProgressStore`**: ephemeral key -> `ProgressSnapshot` map with a retention window.
//! - **`SubscriptionStore`**: outbound webhook registrations.
//! - **`InboundStore`**: tester endpoints and the requests captured against them.

pub mod inbound;
pub mod ledger;
pub mod progress;
pub mod records;
pub mod subscriptions;

#[cfg(test)]
mod tests;

use crate::catalog::types::{Record, RecordDraft, RecordId, RecordPage, RecordPatch, RecordQuery};
use crate::events::types::{Subscription, SubscriptionDraft, SubscriptionId};
use crate::executor::types::TaskId;
use crate::operations::types::{NewOperation, Operation, OperationId, OperationStatus, ProgressSnapshot};
use crate::relay::types::{CapturedRequest, InboundEndpoint, InboundRequest};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert each draft, or on `(owner, sku)` conflict overwrite name, description,
    /// active flag and updated timestamp. Returns the number of drafts applied.
    async fn upsert_batch(&self, owner: &str, drafts: Vec<RecordDraft>) -> StoreResult<usize>;
    async fn count_owned(&self, owner: &str) -> StoreResult<u64>;
    /// Up to `limit` ids owned by `owner`, lowest id first.
    async fn owned_ids(&self, owner: &str, limit: usize) -> StoreResult<Vec<RecordId>>;
    /// Deletes exactly the given ids; returns how many existed.
    async fn delete_ids(&self, ids: &[RecordId]) -> StoreResult<u64>;

    /// Fails with `Conflict` if the owner already has the SKU.
    async fn create(&self, owner: &str, draft: RecordDraft) -> StoreResult<Record>;
    async fn get(&self, owner: &str, id: RecordId) -> StoreResult<Record>;
    async fn update(&self, owner: &str, id: RecordId, patch: RecordPatch) -> StoreResult<Record>;
    async fn delete(&self, owner: &str, id: RecordId) -> StoreResult<Record>;
    /// Newest first, `PAGE_SIZE` per page.
    async fn list(&self, owner: &str, query: &RecordQuery) -> StoreResult<RecordPage>;
}

#[async_trait]
pub trait OperationLedger: Send + Sync {
    /// Creates a `pending` operation. Fails with `Conflict` when the owner already has
    /// an operation in `pending` or `processing`.
    async fn begin(&self, new: NewOperation) -> StoreResult<Operation>;
    async fn attach_task(&self, id: &OperationId, task_id: &TaskId) -> StoreResult<Operation>;
    /// Moves along the lifecycle; illegal moves (including a second terminal
    /// transition) fail with `Conflict`.
    async fn transition(&self, id: &OperationId, status: OperationStatus) -> StoreResult<Operation>;
    async fn get(&self, id: &OperationId) -> StoreResult<Operation>;
    async fn active_for(&self, owner: &str) -> StoreResult<Option<Operation>>;
    /// Newest first.
    async fn list_for(&self, owner: &str, limit: usize) -> StoreResult<Vec<Operation>>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn put(&self, key: &str, snapshot: ProgressSnapshot) -> StoreResult<()>;
    /// `None` when never written or past its retention window.
    async fn get(&self, key: &str) -> StoreResult<Option<ProgressSnapshot>>;
    /// Reclaims expired entries. Stores that expire keys natively keep the default.
    async fn sweep_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Newest first.
    async fn list_for(&self, owner: &str) -> StoreResult<Vec<Subscription>>;
    async fn create(&self, owner: &str, draft: SubscriptionDraft) -> StoreResult<Subscription>;
    async fn update(
        &self,
        owner: &str,
        id: SubscriptionId,
        draft: SubscriptionDraft,
    ) -> StoreResult<Subscription>;
    async fn delete(&self, owner: &str, id: SubscriptionId) -> StoreResult<()>;
}

#[async_trait]
pub trait InboundStore: Send + Sync {
    /// The owner's oldest endpoint, created on first use.
    async fn current_endpoint(&self, owner: &str) -> StoreResult<InboundEndpoint>;
    async fn endpoint_by_token(&self, token: &Uuid) -> StoreResult<InboundEndpoint>;
    async fn record_request(
        &self,
        token: &Uuid,
        captured: CapturedRequest,
    ) -> StoreResult<InboundRequest>;
    /// Newest first.
    async fn recent_requests(&self, token: &Uuid, limit: usize) -> StoreResult<Vec<InboundRequest>>;
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
