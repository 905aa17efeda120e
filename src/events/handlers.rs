use super::types::{EventKind, Subscription, SubscriptionDraft, SubscriptionId};
use crate::api_error::{api_store_error, api_validation_error, ApiError};
use crate::app::AppState;
use crate::auth::Owner;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

/// Checks the target URL and event set, dropping repeated events.
pub fn validate_draft(mut draft: SubscriptionDraft) -> Result<SubscriptionDraft, ApiError> {
    let url = draft.url.trim().to_string();
    let parsed =
        reqwest::Url::parse(&url).map_err(|_| api_validation_error("Enter a valid URL."))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(api_validation_error("URL must use http or https."));
    }
    draft.url = url;

    let mut events: Vec<EventKind> = Vec::with_capacity(draft.events.len());
    for event in draft.events {
        if !events.contains(&event) {
            events.push(event);
        }
    }
    if events.is_empty() {
        return Err(api_validation_error("Select at least one event."));
    }
    draft.events = events;
    Ok(draft)
}

fn parse_body(
    payload: Result<Json<SubscriptionDraft>, JsonRejection>,
) -> Result<SubscriptionDraft, ApiError> {
    let Json(draft) = payload.map_err(|rejection| api_validation_error(&rejection.body_text()))?;
    validate_draft(draft)
}

pub async fn handle_list_subscriptions(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let subscriptions = state
        .subscriptions
        .list_for(owner.as_str())
        .await
        .map_err(|e| api_store_error("Failed to list webhooks", e))?;
    Ok(Json(subscriptions))
}

pub async fn handle_create_subscription(
    State(state): State<AppState>,
    owner: Owner,
    payload: Result<Json<SubscriptionDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    let draft = parse_body(payload)?;
    let subscription = state
        .subscriptions
        .create(owner.as_str(), draft)
        .await
        .map_err(|e| api_store_error("Failed to create webhook", e))?;
    tracing::info!(
        owner = %owner.as_str(),
        subscription_id = %subscription.id,
        url = %subscription.url,
        "Webhook created"
    );
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn handle_update_subscription(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<u64>,
    payload: Result<Json<SubscriptionDraft>, JsonRejection>,
) -> Result<Json<Subscription>, ApiError> {
    let draft = parse_body(payload)?;
    let subscription = state
        .subscriptions
        .update(owner.as_str(), SubscriptionId(id), draft)
        .await
        .map_err(|e| api_store_error("Failed to update webhook", e))?;
    Ok(Json(subscription))
}

pub async fn handle_delete_subscription(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .subscriptions
        .delete(owner.as_str(), SubscriptionId(id))
        .await
        .map_err(|e| api_store_error("Failed to delete webhook", e))?;
    tracing::info!(owner = %owner.as_str(), subscription_id = id, "Webhook deleted");
    Ok(StatusCode::NO_CONTENT)
}
