//! Relay Module
//!
//! The webhook tester: each owner gets a private, token-addressed inbound URL. Requests
//! sent to it are captured and echoed live to any browser watching the endpoint.
//!
//! ## Components
//! - **`broker`**: Topic-addressed broadcast (pub/sub). The relay and the gateway only
//!   meet here, so zero or many viewers can watch one endpoint.
//! - **`inbound`**: `InboundRelay`, which persists each capture and publishes it.
//! - **`stream`**: `StreamGateway`, which forwards a topic as Server-Sent Events.
//! - **`handlers`**: HTTP surface for the tester page, the stream and the inbound URL.

pub mod broker;
pub mod handlers;
pub mod inbound;
pub mod stream;
pub mod types;


use crate::storage::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unknown inbound endpoint {0}")]
    UnknownEndpoint(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("publish failed: {0}")]
    Publish(String),
}
