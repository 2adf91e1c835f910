use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::{backend_error, capability, copied, CopyResponse, DeletedResponse};
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::records::jobs::{self, Job, JobDraft, StatusFilter};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListJobsParams>,
) -> Result<Json<JSend<Vec<Job>>>, ApiError> {
    let filter: StatusFilter = params
        .status
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|e: jobs::UnknownStatus| ApiError::bad_request(e.to_string()))?;

    let cap = capability(&state)?;
    let items = jobs::list(state.backend.records.as_ref(), &cap, filter)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(items))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Job>>, ApiError> {
    let cap = capability(&state)?;
    let job = jobs::get(state.backend.records.as_ref(), &cap, &id)
        .await
        .map_err(backend_error)?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(JSend::success(job))
}

pub async fn create_job(
    State(state): State<Arc<AppState>>,
    AppJson(draft): AppJson<JobDraft>,
) -> Result<Json<JSend<Job>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let cap = capability(&state)?;
    let job = jobs::create(state.backend.records.as_ref(), &cap, &draft)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(job))
}

pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(draft): AppJson<JobDraft>,
) -> Result<Json<JSend<Job>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let cap = capability(&state)?;
    let job = jobs::update(state.backend.records.as_ref(), &cap, &id, &draft)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(job))
}

pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeletedResponse>>, ApiError> {
    let cap = capability(&state)?;
    let deleted = jobs::delete(state.backend.records.as_ref(), &cap, &id)
        .await
        .map_err(backend_error)?;
    if !deleted {
        return Err(ApiError::not_found("Job not found"));
    }
    Ok(JSend::success(DeletedResponse { deleted }))
}

/// Copies the posting link, or "title at company" when there is none.
pub async fn copy_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<CopyResponse>>, ApiError> {
    let cap = capability(&state)?;
    let text = jobs::get(state.backend.records.as_ref(), &cap, &id)
        .await
        .map(|job| {
            job.map(|job| match job.url {
                Some(url) if !url.is_empty() => url,
                _ => format!("{} at {}", job.title, job.company),
            })
        });
    Ok(JSend::success(copied(&state, "job", &id, text)?))
}
