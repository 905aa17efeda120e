//! Inbound Relay Data Types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stored in place of a request body that is not valid UTF-8.
pub const BINARY_BODY_PLACEHOLDER: &str = "[Binary Data]";

/// An owner's private, token-addressed receiving URL.
///
/// The token is the capability: anyone holding it may post to the endpoint.
/// It also names the pub/sub topic live viewers subscribe to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundEndpoint {
    pub token: Uuid,
    pub owner: String,
    pub created_at: u64,
}

impl InboundEndpoint {
    pub fn topic(&self) -> String {
        self.token.to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct InboundRequestId(pub u64);

/// One captured request, append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundRequest {
    pub id: InboundRequestId,
    pub token: Uuid,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub query_params: BTreeMap<String, String>,
    pub received_at: u64,
}

/// Everything captured from the wire before it gets an id.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub query_params: BTreeMap<String, String>,
}

impl CapturedRequest {
    /// Decodes the body as UTF-8, substituting the placeholder for binary payloads.
    pub fn decode_body(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => BINARY_BODY_PLACEHOLDER.to_string(),
        }
    }
}

/// Tester page: the endpoint plus its latest captures, newest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointDetail {
    pub endpoint: InboundEndpoint,
    pub inbound_path: String,
    pub requests: Vec<InboundRequest>,
}

pub const RECENT_REQUESTS_LIMIT: usize = 50;
