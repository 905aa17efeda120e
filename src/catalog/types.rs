//! Catalog Record Types
//!
//! The product record owned by a user, plus the request/response shapes of the
//! CRUD page.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage-assigned record identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog record. `(owner, sku)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub owner: String,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Field values for an insert or upsert. The owner is passed separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordDraft {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl RecordDraft {
    pub fn new(sku: &str, name: &str, description: &str) -> Self {
        Self {
            sku: normalize_sku(sku),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            is_active: true,
        }
    }
}

/// Partial update from the inline editor; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    /// Case-insensitive substring matched against SKU or name.
    pub q: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub items: Vec<Record>,
    pub page: usize,
    pub num_pages: usize,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
}

pub const PAGE_SIZE: usize = 20;

/// SKUs are case-insensitive identities: trimmed and lower-cased everywhere they enter.
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_lowercase()
}

fn default_active() -> bool {
    true
}
