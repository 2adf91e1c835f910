use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

use super::{backend_error, capability, copied, CopyResponse, DeletedResponse};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::records::messages::{self, Message, MessageDraft};
use crate::AppState;

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<Message>>>, ApiError> {
    let cap = capability(&state)?;
    let items = messages::list(state.backend.records.as_ref(), &cap)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(items))
}

pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Message>>, ApiError> {
    let cap = capability(&state)?;
    let message = messages::get(state.backend.records.as_ref(), &cap, &id)
        .await
        .map_err(backend_error)?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    Ok(JSend::success(message))
}

pub async fn create_message(
    State(state): State<Arc<AppState>>,
    AppJson(draft): AppJson<MessageDraft>,
) -> Result<Json<JSend<Message>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let cap = capability(&state)?;
    let message = messages::create(state.backend.records.as_ref(), &cap, &draft)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(message))
}

pub async fn update_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(draft): AppJson<MessageDraft>,
) -> Result<Json<JSend<Message>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let cap = capability(&state)?;
    let message = messages::update(state.backend.records.as_ref(), &cap, &id, &draft)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(message))
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeletedResponse>>, ApiError> {
    let cap = capability(&state)?;
    let deleted = messages::delete(state.backend.records.as_ref(), &cap, &id)
        .await
        .map_err(backend_error)?;
    if !deleted {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(JSend::success(DeletedResponse { deleted }))
}

pub async fn copy_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<CopyResponse>>, ApiError> {
    let cap = capability(&state)?;
    let text = messages::get(state.backend.records.as_ref(), &cap, &id)
        .await
        .map(|m| m.map(|m| m.message));
    Ok(JSend::success(copied(&state, "message", &id, text)?))
}
