//! Task Executor Module
//!
//! The asynchronous task substrate. Request handlers never run bulk work inline:
//! they enqueue a named task and hand the `TaskId` back to the client, and a pool
//! of workers runs it off the request path.
//!
//! ## Architecture Overview
//! The executor follows a **Pull-based** model with **Lease** management:
//! 1. **Submission**: Tasks are pushed to the `TaskQueue` as `Pending`.
//! 2. **Execution**: Workers poll the queue for `Pending` tasks.
//! 3. **Leasing**: To execute a task, a worker "claims" it by setting a lease expiration.
//!    If the worker dies, the lease expires and another worker may retry the task.
//! 4. **Completion**: A handler `Err` marks the task `Failed` and is logged, which is how
//!    pipeline failures surface to operators.
//!
//! ## Submodules
//! - **`queue`**: Task state storage, claiming and leasing.
//! - **`executor`**: Manages the worker pool and the execution lifecycle (claim -> run -> complete).
//! - **`registry`**: Maps string identifiers (e.g., "import_catalog") to executable Rust code.
//! - **`protocol`**: HTTP DTOs for task status.

pub mod executor;
pub mod handlers;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod types;
