use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of events subscribers can register for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "product.created")]
    ProductCreated,
    #[serde(rename = "product.updated")]
    ProductUpdated,
    #[serde(rename = "product.deleted")]
    ProductDeleted,
    #[serde(rename = "import.completed")]
    ImportCompleted,
    #[serde(rename = "bulk_delete.completed")]
    BulkDeleteCompleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ProductCreated => "product.created",
            EventKind::ProductUpdated => "product.updated",
            EventKind::ProductDeleted => "product.deleted",
            EventKind::ImportCompleted => "import.completed",
            EventKind::BulkDeleteCompleted => "bulk_delete.completed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body POSTed to subscriber URLs: `{"event": ..., "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub event: EventKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An owner's registration of a URL and the events it wants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: String,
    pub url: String,
    pub events: Vec<EventKind>,
    pub is_active: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Subscription {
    pub fn wants(&self, event: EventKind) -> bool {
        self.is_active && self.events.contains(&event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDraft {
    pub url: String,
    pub events: Vec<EventKind>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Queue payload for the `deliver_event` task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryTaskPayload {
    pub owner: String,
    pub event: EventKind,
    pub payload: serde_json::Value,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscriptions that were active and subscribed to the event.
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
}

fn default_active() -> bool {
    true
}
