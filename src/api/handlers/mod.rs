mod admin;
mod auth;
mod jobs;
mod messages;
mod pages;
mod resumes;
mod storage;
mod templates;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::access::Capability;
use crate::api::response::{ApiError, JSend};
use crate::backend::{codes, BackendError};
use crate::copy::{copy_key, CopyStatus};
use crate::AppState;

pub use admin::{admin_purge, health};
pub use auth::{current_session, login, logout, signup};
pub use jobs::{copy_job, create_job, delete_job, get_job, list_jobs, update_job};
pub use messages::{
    copy_message, create_message, delete_message, get_message, list_messages, update_message,
};
pub use pages::{fallback, home, jobs_page, login_page, messages_page, profile, templates_page};
pub use resumes::{
    cancel_edit, clear_latest, latest_preview, latest_resume, save_edit, set_draft, start_edit,
    upload_resume,
};
pub use storage::serve_signed;
pub use templates::{
    active_template, autosave_template, copy_template, create_template, delete_template,
    get_template, list_templates, update_template,
};

/// Map a backend failure to an ApiError. Backend codes are passed along.
fn backend_error(e: BackendError) -> ApiError {
    let err = match &e {
        BackendError::Unauthenticated => ApiError::unauthorized(e.to_string()),
        _ if e.code() == Some(codes::NO_ROWS) => ApiError::not_found("Record not found"),
        _ if e.is_permission_denied() => ApiError::forbidden(e.to_string()),
        BackendError::Api { status, message, .. } => ApiError::with_status(*status, message.clone()),
        BackendError::Transport(_) => ApiError::bad_gateway(e.to_string()),
        _ => ApiError::internal(e.to_string()),
    };
    err.with_code(e.code())
}

/// The signed-in owner, or 401.
fn capability(state: &AppState) -> Result<Capability, ApiError> {
    state.session.capability().map_err(backend_error)
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub text: String,
    pub status: CopyStatus,
}

/// Hand back the text to copy and set the item's transient copy mark.
fn copied(
    state: &AppState,
    kind: &str,
    id: &str,
    text: Result<Option<String>, BackendError>,
) -> Result<CopyResponse, ApiError> {
    let key = copy_key(kind, id);
    match text {
        Ok(Some(text)) => {
            state.copies.mark(&key, CopyStatus::Copied);
            Ok(CopyResponse {
                text,
                status: CopyStatus::Copied,
            })
        }
        Ok(None) => {
            state.copies.mark(&key, CopyStatus::Error);
            Err(ApiError::not_found(format!("{kind} not found")))
        }
        Err(e) => {
            state.copies.mark(&key, CopyStatus::Error);
            Err(backend_error(e))
        }
    }
}

/// Items whose copy mark is still showing.
pub async fn copy_status(State(state): State<Arc<AppState>>) -> Json<JSend<HashMap<String, CopyStatus>>> {
    JSend::success(state.copies.snapshot())
}
