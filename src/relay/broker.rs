//! Topic Broker
//!
//! In-process pub/sub: one `tokio::sync::broadcast` channel per topic, created when the
//! first viewer subscribes. Every receiver gets its own copy of each message published
//! after it subscribed; nothing is replayed. A viewer that falls more than `capacity`
//! messages behind skips the overflow instead of slowing the publisher.

use super::RelayError;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

pub const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// Publishing side of the pub/sub channel. Returns how many viewers got the message.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: String) -> Result<usize, RelayError>;
}

pub struct TopicBroker {
    /// Structure: `topic -> sender`; receivers are handed out by `subscribe`.
    topics: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl TopicBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drops topics nobody is listening to; returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.topics.len();
        self.topics.retain(|_, sender| sender.receiver_count() > 0);
        before.saturating_sub(self.topics.len())
    }
}

impl Default for TopicBroker {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

#[async_trait]
impl Publisher for TopicBroker {
    async fn publish(&self, topic: &str, message: String) -> Result<usize, RelayError> {
        let Some(sender) = self.topics.get(topic).map(|sender| sender.clone()) else {
            tracing::trace!(topic, "No viewers for topic");
            return Ok(0);
        };
        // `send` only errors when every receiver is gone.
        Ok(sender.send(message).unwrap_or(0))
    }
}
