//! Owner identity at the request boundary.
//!
//! Authentication happens upstream; the authenticated user id arrives in the
//! `x-owner-id` header. Handlers that act on an owner's data take an `Owner`
//! extractor and scope every store call by it.

use crate::api_error::{api_unauthorized, ApiError};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(|owner| Owner(owner.to_string()))
            .ok_or_else(|| api_unauthorized("authentication required"))
    }
}
