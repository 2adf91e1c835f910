use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::{backend_error, capability, copied, CopyResponse, DeletedResponse};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::records::templates::{self, Template, TemplateDraft};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ActiveTemplateResponse {
    pub template: Option<Template>,
    /// What the editor shows: the active template, or a fresh default draft.
    pub draft: TemplateDraft,
}

#[derive(Debug, Serialize)]
pub struct AutosaveResponse {
    pub scheduled: bool,
    pub delay_ms: u64,
}

pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<Template>>>, ApiError> {
    let cap = capability(&state)?;
    let items = templates::list(state.backend.records.as_ref(), &cap)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(items))
}

pub async fn active_template(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ActiveTemplateResponse>>, ApiError> {
    let cap = capability(&state)?;
    let template = templates::active(state.backend.records.as_ref(), &cap)
        .await
        .map_err(backend_error)?;
    let draft = template
        .as_ref()
        .map(TemplateDraft::from)
        .unwrap_or_default();
    Ok(JSend::success(ActiveTemplateResponse { template, draft }))
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Template>>, ApiError> {
    let cap = capability(&state)?;
    let template = templates::get(state.backend.records.as_ref(), &cap, &id)
        .await
        .map_err(backend_error)?
        .ok_or_else(|| ApiError::not_found("Template not found"))?;
    Ok(JSend::success(template))
}

pub async fn create_template(
    State(state): State<Arc<AppState>>,
    AppJson(draft): AppJson<TemplateDraft>,
) -> Result<Json<JSend<Template>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let cap = capability(&state)?;
    let template = templates::create(state.backend.records.as_ref(), &cap, &draft)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(template))
}

/// Explicit save. Any queued auto-save for the same template is dropped.
pub async fn update_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(draft): AppJson<TemplateDraft>,
) -> Result<Json<JSend<Template>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let cap = capability(&state)?;
    state.autosave.cancel(&templates::autosave_key(&id));
    let template = templates::update(state.backend.records.as_ref(), &cap, &id, &draft)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(template))
}

/// Record an edit; it is written back once edits pause.
pub async fn autosave_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(draft): AppJson<TemplateDraft>,
) -> Result<Json<JSend<AutosaveResponse>>, ApiError> {
    let cap = capability(&state)?;
    let scheduled = templates::schedule_autosave(
        &state.autosave,
        state.backend.records.clone(),
        cap,
        Some(&id),
        draft,
    );
    Ok(JSend::success(AutosaveResponse {
        scheduled,
        delay_ms: state.autosave.delay().as_millis() as u64,
    }))
}

pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeletedResponse>>, ApiError> {
    let cap = capability(&state)?;
    state.autosave.cancel(&templates::autosave_key(&id));
    let deleted = templates::delete(state.backend.records.as_ref(), &cap, &id)
        .await
        .map_err(backend_error)?;
    if !deleted {
        return Err(ApiError::not_found("Template not found"));
    }
    Ok(JSend::success(DeletedResponse { deleted }))
}

pub async fn copy_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<CopyResponse>>, ApiError> {
    let cap = capability(&state)?;
    let text = templates::get(state.backend.records.as_ref(), &cap, &id)
        .await
        .map(|t| t.map(|t| t.content));
    Ok(JSend::success(copied(&state, "template", &id, text)?))
}
