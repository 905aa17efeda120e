//! Test fixtures shared by the pipeline tests.

use super::run::OperationRun;
use super::types::{NewOperation, OperationKind, ProgressSnapshot, ProgressStatus};
use crate::catalog::types::{
    normalize_sku, Record, RecordDraft, RecordId, RecordPage, RecordPatch, RecordQuery,
};
use crate::events::notifier::RecordingNotifier;
use crate::executor::types::TaskId;
use crate::storage::ledger::MemoryLedger;
use crate::storage::progress::MemoryProgressStore;
use crate::storage::records::MemoryRecordStore;
use crate::storage::{OperationLedger, ProgressStore, RecordStore, StoreError, StoreResult};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Progress store that remembers every accepted write, in order. Writes of a
/// status passed to `reject` fail instead.
pub struct RecordingProgressStore {
    inner: MemoryProgressStore,
    history: Mutex<Vec<(String, ProgressSnapshot)>>,
    rejected: Mutex<Vec<ProgressStatus>>,
}

impl RecordingProgressStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryProgressStore::new(Duration::from_secs(3600)),
            history: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
        })
    }

    pub fn reject(&self, status: ProgressStatus) {
        self.rejected.lock().unwrap().push(status);
    }

    pub fn history_for(&self, key: &str) -> Vec<ProgressSnapshot> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(written, _)| written == key)
            .map(|(_, snapshot)| snapshot.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressStore for RecordingProgressStore {
    async fn put(&self, key: &str, snapshot: ProgressSnapshot) -> StoreResult<()> {
        if self.rejected.lock().unwrap().contains(&snapshot.status) {
            return Err(StoreError::Unexpected(anyhow::anyhow!("progress cache unavailable")));
        }
        self.history
            .lock()
            .unwrap()
            .push((key.to_string(), snapshot.clone()));
        self.inner.put(key, snapshot).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ProgressSnapshot>> {
        self.inner.get(key).await
    }
}

/// Record store whose bulk writes start failing after `healthy_calls` succeed.
pub struct FlakyRecordStore {
    inner: Arc<MemoryRecordStore>,
    healthy_calls: usize,
    calls: AtomicUsize,
}

impl FlakyRecordStore {
    pub fn new(inner: Arc<MemoryRecordStore>, healthy_calls: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            healthy_calls,
            calls: AtomicUsize::new(0),
        })
    }

    fn check(&self) -> StoreResult<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy_calls {
            return Err(StoreError::Unexpected(anyhow::anyhow!("database unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyRecordStore {
    async fn upsert_batch(&self, owner: &str, drafts: Vec<RecordDraft>) -> StoreResult<usize> {
        self.check()?;
        self.inner.upsert_batch(owner, drafts).await
    }

    async fn count_owned(&self, owner: &str) -> StoreResult<u64> {
        self.inner.count_owned(owner).await
    }

    async fn owned_ids(&self, owner: &str, limit: usize) -> StoreResult<Vec<RecordId>> {
        self.inner.owned_ids(owner, limit).await
    }

    async fn delete_ids(&self, ids: &[RecordId]) -> StoreResult<u64> {
        self.check()?;
        self.inner.delete_ids(ids).await
    }

    async fn create(&self, owner: &str, draft: RecordDraft) -> StoreResult<Record> {
        self.inner.create(owner, draft).await
    }

    async fn get(&self, owner: &str, id: RecordId) -> StoreResult<Record> {
        self.inner.get(owner, id).await
    }

    async fn update(&self, owner: &str, id: RecordId, patch: RecordPatch) -> StoreResult<Record> {
        self.inner.update(owner, id, patch).await
    }

    async fn delete(&self, owner: &str, id: RecordId) -> StoreResult<Record> {
        self.inner.delete(owner, id).await
    }

    async fn list(&self, owner: &str, query: &RecordQuery) -> StoreResult<RecordPage> {
        self.inner.list(owner, query).await
    }
}

/// Finds an owner's record by SKU through the search listing.
pub async fn record_by_sku(store: &dyn RecordStore, owner: &str, sku: &str) -> Option<Record> {
    let sku = normalize_sku(sku);
    let query = RecordQuery {
        q: Some(sku.clone()),
        page: None,
    };
    let page = store.list(owner, &query).await.unwrap();
    page.items.into_iter().find(|record| record.sku == sku)
}

/// The stores a pipeline run touches, all in memory.
pub struct Harness {
    pub records: Arc<MemoryRecordStore>,
    pub ledger: Arc<MemoryLedger>,
    pub progress: Arc<RecordingProgressStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            records: Arc::new(MemoryRecordStore::new()),
            ledger: Arc::new(MemoryLedger::new()),
            progress: RecordingProgressStore::new(),
            notifier: RecordingNotifier::new(),
        }
    }

    /// Admits a new operation and returns the run tracker a task handler would build.
    pub async fn begin(&self, owner: &str, kind: OperationKind) -> OperationRun {
        let operation = self
            .ledger
            .begin(NewOperation {
                owner: owner.to_string(),
                kind,
                file_path: None,
            })
            .await
            .unwrap();
        let task_id = TaskId::new();
        let operation = self.ledger.attach_task(&operation.id, &task_id).await.unwrap();
        OperationRun::new(
            &operation,
            task_id,
            self.progress.clone(),
            self.ledger.clone(),
        )
    }

    pub fn snapshots(&self, run: &OperationRun) -> Vec<ProgressSnapshot> {
        self.progress.history_for(run.progress_key())
    }
}
