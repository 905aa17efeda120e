//! Ingestion Module
//!
//! Bulk import of catalog records from an uploaded CSV file.
//!
//! ## Workflow
//! 1. **Read**: A blocking `csv` reader resolves the `sku`/`name`/`description` columns
//!    and streams normalized rows over a bounded channel.
//! 2. **Deduplicate**: Rows are buffered per batch keyed by SKU (last row wins).
//! 3. **Store**: Full batches are bulk-upserted into the `RecordStore`.
//! 4. **Report**: Progress snapshots during the run, terminal state at the end, and an
//!    `import.completed` event to subscribers.

pub mod pipeline;
pub mod reader;
pub mod types;

#[cfg(test)]
mod tests;
