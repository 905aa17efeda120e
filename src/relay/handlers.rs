use super::types::{CapturedRequest, EndpointDetail, InboundEndpoint, RECENT_REQUESTS_LIMIT};
use super::RelayError;
use crate::api_error::{api_internal, api_not_found, api_store_error, ApiError};
use crate::app::AppState;
use crate::auth::Owner;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

pub fn inbound_path(token: &Uuid) -> String {
    format!("/webhooks/inbound/{}/", token)
}

/// A token that is not a UUID cannot name an endpoint, so it reads as not found.
fn parse_token(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| api_not_found("endpoint not found"))
}

/// The endpoint must exist and belong to the caller; anything else is a 404.
async fn owned_endpoint(
    state: &AppState,
    owner: &Owner,
    token: &Uuid,
) -> Result<InboundEndpoint, ApiError> {
    let endpoint = state
        .inbound
        .endpoint_by_token(token)
        .await
        .map_err(|e| api_store_error("Failed to load endpoint", e))?;
    if endpoint.owner != owner.as_str() {
        return Err(api_not_found("endpoint not found"));
    }
    Ok(endpoint)
}

async fn endpoint_detail(
    state: &AppState,
    endpoint: InboundEndpoint,
) -> Result<EndpointDetail, ApiError> {
    let requests = state
        .inbound
        .recent_requests(&endpoint.token, RECENT_REQUESTS_LIMIT)
        .await
        .map_err(|e| api_store_error("Failed to load captured requests", e))?;
    Ok(EndpointDetail {
        inbound_path: inbound_path(&endpoint.token),
        endpoint,
        requests,
    })
}

/// Returns the caller's current endpoint, creating it on first use.
pub async fn handle_create_tester(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<EndpointDetail>, ApiError> {
    let endpoint = state
        .inbound
        .current_endpoint(owner.as_str())
        .await
        .map_err(|e| api_store_error("Failed to create endpoint", e))?;
    Ok(Json(endpoint_detail(&state, endpoint).await?))
}

pub async fn handle_tester_detail(
    State(state): State<AppState>,
    owner: Owner,
    Path(token): Path<String>,
) -> Result<Json<EndpointDetail>, ApiError> {
    let token = parse_token(&token)?;
    let endpoint = owned_endpoint(&state, &owner, &token).await?;
    Ok(Json(endpoint_detail(&state, endpoint).await?))
}

pub async fn handle_tester_stream(
    State(state): State<AppState>,
    owner: Owner,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let token = parse_token(&token)?;
    let endpoint = owned_endpoint(&state, &owner, &token).await?;
    tracing::info!(token = %token, owner = %owner.as_str(), "Opening live stream");
    Ok(state.gateway.sse(&endpoint.topic()))
}

/// Accepts any method. Malformed query strings are captured as empty rather than rejected.
pub async fn handle_inbound(
    State(state): State<AppState>,
    Path(token): Path<String>,
    method: Method,
    headers: HeaderMap,
    query: Option<Query<BTreeMap<String, String>>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = parse_token(&token)?;
    let captured = CapturedRequest {
        method: method.to_string(),
        headers: flatten_headers(&headers),
        body: CapturedRequest::decode_body(&body),
        query_params: query.map(|Query(params)| params).unwrap_or_default(),
    };

    match state.relay.receive(token, captured).await {
        Ok(_) => Ok((StatusCode::OK, "OK")),
        Err(RelayError::UnknownEndpoint(_)) => Err(api_not_found("endpoint not found")),
        Err(e) => Err(api_internal("Failed to record inbound request", &e)),
    }
}

/// Repeated header names are joined with `", "`.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    flat
}
