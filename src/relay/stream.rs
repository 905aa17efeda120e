//! Stream Gateway
//!
//! Turns a topic subscription into a Server-Sent Events response. Each published message
//! becomes one `data: <message>` frame, in publish order, for as long as the client stays
//! connected. Optional keep-alive comments hold idle connections open; they carry no data.

use super::broker::TopicBroker;

use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

pub struct StreamGateway {
    broker: Arc<TopicBroker>,
    keepalive: Option<Duration>,
}

impl StreamGateway {
    pub fn new(broker: Arc<TopicBroker>, keepalive: Option<Duration>) -> Self {
        Self { broker, keepalive }
    }

    /// The raw frame stream for one topic.
    pub fn open(&self, topic: &str) -> impl Stream<Item = Result<Event, Infallible>> {
        let topic = topic.to_string();
        tracing::debug!(topic = %topic, "Viewer subscribed");
        BroadcastStream::new(self.broker.subscribe(&topic)).filter_map(move |item| match item {
            Ok(message) => Some(Ok(Event::default().data(message))),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(topic = %topic, skipped, "Viewer lagged; messages dropped");
                None
            }
        })
    }

    pub fn sse(&self, topic: &str) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let sse = Sse::new(self.open(topic));
        match self.keepalive {
            Some(interval) => sse.keep_alive(KeepAlive::new().interval(interval)),
            None => sse,
        }
    }
}
