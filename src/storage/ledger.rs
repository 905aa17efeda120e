//! In-memory operation ledger.
//!
//! Besides the operation history, the ledger keeps an `active` marker map with at most
//! one entry per owner. `begin` claims the marker through a map entry, so two concurrent
//! submissions for the same owner cannot both pass admission; the terminal transition
//! releases it.

use super::{now_ms, OperationLedger, StoreError, StoreResult};
use crate::executor::types::TaskId;
use crate::operations::types::{NewOperation, Operation, OperationId, OperationStatus};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

pub struct MemoryLedger {
    operations: DashMap<OperationId, Operation>,
    /// Structure: `owner -> id of the owner's pending/processing operation`.
    active: DashMap<String, OperationId>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            operations: DashMap::new(),
            active: DashMap::new(),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationLedger for MemoryLedger {
    async fn begin(&self, new: NewOperation) -> StoreResult<Operation> {
        match self.active.entry(new.owner.clone()) {
            Entry::Occupied(slot) => Err(StoreError::Conflict(format!(
                "operation {} is already in progress",
                slot.get()
            ))),
            Entry::Vacant(slot) => {
                let now = now_ms();
                let operation = Operation {
                    id: OperationId::new(),
                    owner: new.owner,
                    kind: new.kind,
                    status: OperationStatus::Pending,
                    created_at: now,
                    updated_at: now,
                    file_path: new.file_path,
                    task_id: None,
                };
                self.operations
                    .insert(operation.id.clone(), operation.clone());
                slot.insert(operation.id.clone());
                tracing::debug!(
                    operation_id = %operation.id,
                    owner = %operation.owner,
                    kind = %operation.kind,
                    "Operation created"
                );
                Ok(operation)
            }
        }
    }

    async fn attach_task(&self, id: &OperationId, task_id: &TaskId) -> StoreResult<Operation> {
        let mut operation = self
            .operations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("operation {}", id)))?;
        operation.task_id = Some(task_id.clone());
        operation.updated_at = now_ms();
        Ok(operation.clone())
    }

    async fn transition(&self, id: &OperationId, status: OperationStatus) -> StoreResult<Operation> {
        let updated = {
            let mut operation = self
                .operations
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("operation {}", id)))?;
            if !operation.status.can_transition_to(status) {
                return Err(StoreError::Conflict(format!(
                    "operation {} cannot move from {:?} to {:?}",
                    id, operation.status, status
                )));
            }
            operation.status = status;
            operation.updated_at = now_ms();
            operation.clone()
        };

        if status.is_terminal() {
            self.active
                .remove_if(&updated.owner, |_, active_id| active_id == id);
        }
        Ok(updated)
    }

    async fn get(&self, id: &OperationId) -> StoreResult<Operation> {
        self.operations
            .get(id)
            .map(|operation| operation.clone())
            .ok_or_else(|| StoreError::NotFound(format!("operation {}", id)))
    }

    async fn active_for(&self, owner: &str) -> StoreResult<Option<Operation>> {
        let Some(id) = self.active.get(owner).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self
            .operations
            .get(&id)
            .map(|operation| operation.clone())
            .filter(|operation| operation.status.is_active()))
    }

    async fn list_for(&self, owner: &str, limit: usize) -> StoreResult<Vec<Operation>> {
        let mut operations: Vec<Operation> = self
            .operations
            .iter()
            .filter(|operation| operation.owner == owner)
            .map(|operation| operation.clone())
            .collect();
        operations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        operations.truncate(limit);
        Ok(operations)
    }
}
