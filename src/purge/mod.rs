//! Purge Module
//!
//! Bulk deletion of all records an owner has, with the same progress and ledger contract
//! as the import pipeline and a `bulk_delete.completed` event at the end.

pub mod pipeline;
