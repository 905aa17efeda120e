use super::{now_ms, StoreError, StoreResult, SubscriptionStore};
use crate::events::types::{Subscription, SubscriptionDraft, SubscriptionId};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MemorySubscriptionStore {
    subscriptions: DashMap<SubscriptionId, Subscription>,
    next_id: AtomicU64,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: SubscriptionId) -> StoreError {
    StoreError::NotFound(format!("webhook {}", id))
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn list_for(&self, owner: &str) -> StoreResult<Vec<Subscription>> {
        let mut subscriptions: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|subscription| subscription.owner == owner)
            .map(|subscription| subscription.clone())
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(subscriptions)
    }

    async fn create(&self, owner: &str, draft: SubscriptionDraft) -> StoreResult<Subscription> {
        let now = now_ms();
        let subscription = Subscription {
            id: SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            owner: owner.to_string(),
            url: draft.url,
            events: draft.events,
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn update(
        &self,
        owner: &str,
        id: SubscriptionId,
        draft: SubscriptionDraft,
    ) -> StoreResult<Subscription> {
        let mut subscription = self
            .subscriptions
            .get_mut(&id)
            .filter(|subscription| subscription.owner == owner)
            .ok_or_else(|| not_found(id))?;
        subscription.url = draft.url;
        subscription.events = draft.events;
        subscription.is_active = draft.is_active;
        subscription.updated_at = now_ms();
        Ok(subscription.clone())
    }

    async fn delete(&self, owner: &str, id: SubscriptionId) -> StoreResult<()> {
        self.subscriptions
            .remove_if(&id, |_, subscription| subscription.owner == owner)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}
