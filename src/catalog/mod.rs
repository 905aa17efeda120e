//! Catalog Module
//!
//! The owner-scoped product list and its single-record CRUD endpoints. Every
//! create/update/delete emits the matching `product.*` event with the record as payload.

pub mod handlers;
pub mod types;
