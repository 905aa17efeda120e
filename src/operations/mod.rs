//! Operations Module
//!
//! Admission, tracking and progress reporting for bulk operations.
//!
//! ## Lifecycle
//! 1. **Admission**: A submission handler calls `OperationLedger::begin`, which refuses
//!    the request when the owner already has a `pending` or `processing` operation.
//! 2. **Scheduling**: The admitted operation is queued as an `import_catalog` or
//!    `purge_catalog` task; its `TaskId` doubles as the progress handle.
//! 3. **Running**: The task handler drives the pipeline through an `OperationRun`,
//!    which keeps the ledger status and the progress snapshot in step.
//! 4. **Terminal**: `completed` or `failed`, exactly once. Either releases admission.
//!
//! Progress for an unknown, unstarted or expired handle reads as
//! `{pending, 0, "Initializing..."}`.

pub mod handlers;
pub mod run;
pub mod tasks;
pub mod types;

#[cfg(test)]
pub mod testing;
