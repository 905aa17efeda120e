//! In-memory catalog record store.
//!
//! Records live in `records` keyed by id; `by_sku` is the `(owner, sku)` unique index.
//! Every insert goes through a `by_sku` entry, which holds that key's shard lock, so
//! concurrent upserts of the same SKU serialize on the index instead of duplicating.
//! Lock order is always `by_sku` then `records`; paths that start from `records`
//! release it before touching the index.

use super::{now_ms, RecordStore, StoreError, StoreResult};
use crate::catalog::types::{
    normalize_sku, Record, RecordDraft, RecordId, RecordPage, RecordPatch, RecordQuery, PAGE_SIZE,
};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

type SkuKey = (String, String);

pub struct MemoryRecordStore {
    records: DashMap<RecordId, Record>,
    by_sku: DashMap<SkuKey, RecordId>,
    next_id: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            by_sku: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn allocate_id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn new_record(&self, id: RecordId, owner: &str, draft: RecordDraft, now: u64) -> Record {
        Record {
            id,
            owner: owner.to_string(),
            sku: draft.sku,
            name: draft.name,
            description: draft.description,
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    fn upsert_one(&self, owner: &str, draft: RecordDraft, now: u64) {
        match self.by_sku.entry((owner.to_string(), draft.sku.clone())) {
            Entry::Occupied(mut slot) => {
                let id = *slot.get();
                if let Some(mut record) = self.records.get_mut(&id) {
                    record.name = draft.name;
                    record.description = draft.description;
                    record.is_active = draft.is_active;
                    record.updated_at = now;
                    return;
                }
                // Index entry outlived a concurrent delete; re-insert under a fresh id.
                let id = self.allocate_id();
                self.records
                    .insert(id, self.new_record(id, owner, draft, now));
                slot.insert(id);
            }
            Entry::Vacant(slot) => {
                let id = self.allocate_id();
                self.records
                    .insert(id, self.new_record(id, owner, draft, now));
                slot.insert(id);
            }
        }
    }

    fn unindex(&self, owner: &str, sku: &str, id: RecordId) {
        self.by_sku
            .remove_if(&(owner.to_string(), sku.to_string()), |_, indexed| *indexed == id);
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert_batch(&self, owner: &str, drafts: Vec<RecordDraft>) -> StoreResult<usize> {
        let now = now_ms();
        let applied = drafts.len();
        for draft in drafts {
            self.upsert_one(owner, draft, now);
        }
        Ok(applied)
    }

    async fn count_owned(&self, owner: &str) -> StoreResult<u64> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.owner == owner)
            .count() as u64)
    }

    async fn owned_ids(&self, owner: &str, limit: usize) -> StoreResult<Vec<RecordId>> {
        let mut ids: Vec<RecordId> = self
            .records
            .iter()
            .filter(|record| record.owner == owner)
            .map(|record| record.id)
            .collect();
        ids.sort_unstable();
        ids.truncate(limit);
        Ok(ids)
    }

    async fn delete_ids(&self, ids: &[RecordId]) -> StoreResult<u64> {
        let mut deleted = 0u64;
        for id in ids {
            if let Some((_, record)) = self.records.remove(id) {
                self.unindex(&record.owner, &record.sku, record.id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn create(&self, owner: &str, draft: RecordDraft) -> StoreResult<Record> {
        let now = now_ms();
        match self.by_sku.entry((owner.to_string(), draft.sku.clone())) {
            Entry::Occupied(slot) if self.records.contains_key(slot.get()) => {
                Err(StoreError::Conflict("SKU already exists".to_string()))
            }
            Entry::Occupied(mut slot) => {
                let id = self.allocate_id();
                let record = self.new_record(id, owner, draft, now);
                self.records.insert(id, record.clone());
                slot.insert(id);
                Ok(record)
            }
            Entry::Vacant(slot) => {
                let id = self.allocate_id();
                let record = self.new_record(id, owner, draft, now);
                self.records.insert(id, record.clone());
                slot.insert(id);
                Ok(record)
            }
        }
    }

    async fn get(&self, owner: &str, id: RecordId) -> StoreResult<Record> {
        self.records
            .get(&id)
            .filter(|record| record.owner == owner)
            .map(|record| record.clone())
            .ok_or_else(|| StoreError::NotFound(format!("record {}", id)))
    }

    async fn update(&self, owner: &str, id: RecordId, patch: RecordPatch) -> StoreResult<Record> {
        let current = self.get(owner, id).await?;

        if let Some(sku) = patch.sku.as_deref().map(normalize_sku) {
            if sku != current.sku {
                match self.by_sku.entry((owner.to_string(), sku)) {
                    Entry::Occupied(slot) if *slot.get() != id => {
                        return Err(StoreError::Conflict("SKU already exists".to_string()));
                    }
                    Entry::Occupied(_) => {}
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.unindex(owner, &current.sku, id);
            }
        }

        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("record {}", id)))?;
        if let Some(sku) = patch.sku {
            record.sku = normalize_sku(&sku);
        }
        if let Some(name) = patch.name {
            record.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            record.description = description.trim().to_string();
        }
        if let Some(is_active) = patch.is_active {
            record.is_active = is_active;
        }
        record.updated_at = now_ms();
        Ok(record.clone())
    }

    async fn delete(&self, owner: &str, id: RecordId) -> StoreResult<Record> {
        let (_, record) = self
            .records
            .remove_if(&id, |_, record| record.owner == owner)
            .ok_or_else(|| StoreError::NotFound(format!("record {}", id)))?;
        self.unindex(owner, &record.sku, id);
        Ok(record)
    }

    async fn list(&self, owner: &str, query: &RecordQuery) -> StoreResult<RecordPage> {
        let needle = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut items: Vec<Record> = self
            .records
            .iter()
            .filter(|record| record.owner == owner)
            .filter(|record| match &needle {
                Some(needle) => {
                    record.sku.to_lowercase().contains(needle)
                        || record.name.to_lowercase().contains(needle)
                }
                None => true,
            })
            .map(|record| record.clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = items.len();
        let num_pages = total.div_ceil(PAGE_SIZE).max(1);
        let page = query.page.unwrap_or(1).clamp(1, num_pages);
        let items = items
            .into_iter()
            .skip((page - 1) * PAGE_SIZE)
            .take(PAGE_SIZE)
            .collect();

        Ok(RecordPage {
            items,
            page,
            num_pages,
            total,
        })
    }
}
