use super::types::{Record, RecordDraft, RecordId, RecordMessage, RecordPage, RecordPatch, RecordQuery};
use crate::api_error::{api_not_found, api_store_error, api_validation_error, ApiError};
use crate::app::AppState;
use crate::auth::Owner;
use crate::events::types::EventKind;
use crate::storage::StoreError;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;

const DUPLICATE_SKU: &str = "SKU already exists";

/// SKU clashes are a form error here, not a 409.
fn record_error(message: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => api_validation_error(DUPLICATE_SKU),
        StoreError::NotFound(_) => api_not_found("Product not found"),
        other => api_store_error(message, other),
    }
}

async fn emit(state: &AppState, owner: &Owner, event: EventKind, record: &Record) {
    match serde_json::to_value(record) {
        Ok(payload) => state.notifier.notify(owner.as_str(), event, payload).await,
        Err(e) => tracing::warn!(record_id = %record.id, error = %e, "Failed to encode record event"),
    }
}

pub async fn handle_list_records(
    State(state): State<AppState>,
    owner: Owner,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordPage>, ApiError> {
    let page = state
        .records
        .list(owner.as_str(), &query)
        .await
        .map_err(|e| api_store_error("Failed to list products", e))?;
    Ok(Json(page))
}

pub async fn handle_create_record(
    State(state): State<AppState>,
    owner: Owner,
    payload: Result<Json<RecordDraft>, JsonRejection>,
) -> Result<Json<RecordMessage>, ApiError> {
    let Json(raw) = payload.map_err(|rejection| api_validation_error(&rejection.body_text()))?;
    let mut draft = RecordDraft::new(&raw.sku, &raw.name, &raw.description);
    draft.is_active = raw.is_active;
    if draft.sku.is_empty() {
        return Err(api_validation_error("SKU is required"));
    }
    if draft.name.is_empty() {
        return Err(api_validation_error("Name is required"));
    }

    let record = state
        .records
        .create(owner.as_str(), draft)
        .await
        .map_err(|e| record_error("Failed to create product", e))?;
    tracing::info!(owner = %owner.as_str(), record_id = %record.id, sku = %record.sku, "Product created");
    emit(&state, &owner, EventKind::ProductCreated, &record).await;

    Ok(Json(RecordMessage {
        message: "Product created successfully".to_string(),
        id: Some(record.id),
    }))
}

pub async fn handle_update_record(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<u64>,
    payload: Result<Json<RecordPatch>, JsonRejection>,
) -> Result<Json<RecordMessage>, ApiError> {
    let Json(patch) = payload.map_err(|rejection| api_validation_error(&rejection.body_text()))?;
    if patch.sku.as_deref().is_some_and(|sku| sku.trim().is_empty()) {
        return Err(api_validation_error("SKU is required"));
    }
    if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(api_validation_error("Name is required"));
    }

    let record = state
        .records
        .update(owner.as_str(), RecordId(id), patch)
        .await
        .map_err(|e| record_error("Failed to update product", e))?;
    emit(&state, &owner, EventKind::ProductUpdated, &record).await;

    Ok(Json(RecordMessage {
        message: "Product updated successfully".to_string(),
        id: None,
    }))
}

pub async fn handle_delete_record(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<u64>,
) -> Result<Json<RecordMessage>, ApiError> {
    let record = state
        .records
        .delete(owner.as_str(), RecordId(id))
        .await
        .map_err(|e| record_error("Failed to delete product", e))?;
    tracing::info!(owner = %owner.as_str(), record_id = %record.id, "Product deleted");
    emit(&state, &owner, EventKind::ProductDeleted, &record).await;

    Ok(Json(RecordMessage {
        message: "Product deleted successfully".to_string(),
        id: None,
    }))
}
