//! Catalog Operations Service Library
//!
//! This library crate defines the modules that make up the service. It serves as the
//! foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`storage`**: The persistence boundary. Store traits plus in-memory implementations
//!   for records, the operation ledger, progress snapshots, subscriptions and captures.
//! - **`executor`**: The asynchronous task substrate. Bulk work and webhook deliveries run
//!   as queued tasks on a worker pool with lease-based claiming.
//! - **`operations`**: Admission control (one active bulk operation per owner), the run
//!   tracker that keeps ledger and progress in step, and the submission/progress API.
//! - **`ingestion`**: The streaming, deduplicating CSV import pipeline.
//! - **`purge`**: The batched bulk delete pipeline.
//! - **`events`**: Outbound webhook fan-out and subscription management.
//! - **`relay`**: The inbound webhook tester with live Server-Sent Events streaming.
//! - **`catalog`**: Single-record CRUD emitting `product.*` events.

pub mod api_error;
pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod events;
pub mod executor;
pub mod ingestion;
pub mod observability;
pub mod operations;
pub mod purge;
pub mod relay;
pub mod storage;
