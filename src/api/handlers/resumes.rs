use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{backend_error, capability};
use crate::access::Capability;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::editor::{EditorError, ResumeEditor};
use crate::ingest::{IngestError, UploadedFile};
use crate::records::resumes::{self, ResumeRecord};
use crate::viewer::{self, Preview};
use crate::workspace::Workspace;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

/// The resume as the profile page shows it, editor state included.
#[derive(Debug, Serialize)]
pub struct ResumeView {
    pub record: ResumeRecord,
    pub rendered: String,
    pub editing: bool,
    pub draft: Option<String>,
    pub saving: bool,
    pub error: Option<String>,
}

impl From<&ResumeEditor> for ResumeView {
    fn from(editor: &ResumeEditor) -> Self {
        Self {
            record: editor.record().clone(),
            rendered: editor.rendered(),
            editing: editor.is_editing(),
            draft: editor.draft().map(str::to_string),
            saving: editor.is_saving(),
            error: editor.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: bool,
}

fn ingest_error(e: IngestError) -> ApiError {
    let message = e.to_string();
    match e {
        IngestError::MissingFile => ApiError::bad_request(message),
        IngestError::Unauthenticated => ApiError::unauthorized(message),
        IngestError::InProgress => ApiError::conflict(message),
        IngestError::Parse(_) => ApiError::unprocessable(message),
        IngestError::Upload(_) => ApiError::bad_gateway(message),
        IngestError::Save { source, .. } => backend_error(source).reworded(message),
    }
}

fn editor_error(e: EditorError) -> ApiError {
    let message = e.to_string();
    match e {
        EditorError::InvalidJson(_) => ApiError::bad_request(message),
        EditorError::NotEditing | EditorError::SaveInProgress => ApiError::conflict(message),
        EditorError::Backend { source, .. } => backend_error(source).reworded(message),
    }
}

fn no_resume() -> ApiError {
    ApiError::not_found("No resume uploaded yet")
}

/// Latest resume of the signed-in owner, looked up once per owner.
pub(super) async fn load_latest(
    state: &AppState,
    cap: &Capability,
) -> Result<Option<ResumeRecord>, ApiError> {
    let mut workspace = state.workspace.lock().await;
    workspace.bind(cap.owner_id());
    if !workspace.is_loaded() {
        let latest = resumes::latest(state.backend.records.as_ref(), cap)
            .await
            .map_err(backend_error)?;
        workspace.mark_loaded(latest);
    }
    Ok(workspace.resume().map(|e| e.record().clone()))
}

/// Run `f` against the signed-in owner's editor.
async fn with_editor<T>(
    state: &AppState,
    f: impl FnOnce(&mut ResumeEditor) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let cap = capability(state)?;
    load_latest(state, &cap).await?;
    let mut workspace = state.workspace.lock().await;
    let editor = workspace.resume_mut().ok_or_else(no_resume)?;
    f(editor)
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_resume(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<ResumeView>>, ApiError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data: Bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

        if data.len() as u64 > state.config.max_upload_size {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {} bytes",
                state.config.max_upload_size
            )));
        }
        file = Some(UploadedFile::new(name, content_type, data));
    }

    let file = file.ok_or_else(|| ingest_error(IngestError::MissingFile))?;
    let cap = state.session.capability().ok();
    let record = state
        .ingest
        .ingest(file, cap.as_ref())
        .await
        .map_err(ingest_error)?;

    let mut workspace = state.workspace.lock().await;
    workspace.bind(&record.user_id);
    workspace.set_resume(record);
    let view = workspace
        .resume()
        .map(ResumeView::from)
        .ok_or_else(|| ApiError::internal("Resume vanished after upload"))?;
    Ok(JSend::success(view))
}

pub async fn latest_resume(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Option<ResumeView>>>, ApiError> {
    let cap = capability(&state)?;
    load_latest(&state, &cap).await?;
    let workspace = state.workspace.lock().await;
    Ok(JSend::success(workspace.resume().map(ResumeView::from)))
}

pub async fn latest_preview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Preview>>, ApiError> {
    let cap = capability(&state)?;
    let record = load_latest(&state, &cap).await?.ok_or_else(no_resume)?;
    let preview = viewer::load(state.backend.files.as_ref(), &cap, &record).await;
    Ok(JSend::success(preview))
}

pub async fn start_edit(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ResumeView>>, ApiError> {
    let view = with_editor(&state, |editor| {
        editor.edit();
        Ok(ResumeView::from(&*editor))
    })
    .await?;
    Ok(JSend::success(view))
}

pub async fn set_draft(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<DraftRequest>,
) -> Result<Json<JSend<ResumeView>>, ApiError> {
    let view = with_editor(&state, |editor| {
        editor.set_draft(req.text).map_err(editor_error)?;
        Ok(ResumeView::from(&*editor))
    })
    .await?;
    Ok(JSend::success(view))
}

pub async fn cancel_edit(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ResumeView>>, ApiError> {
    let view = with_editor(&state, |editor| {
        editor.cancel();
        Ok(ResumeView::from(&*editor))
    })
    .await?;
    Ok(JSend::success(view))
}

/// Releases the editor's save claim if `save_edit` is dropped before the
/// backend answers (client gone, request timed out).
struct SaveClaim {
    state: Arc<AppState>,
    resume_id: String,
    settled: bool,
}

fn abandon(workspace: &mut Workspace, resume_id: &str) {
    if let Some(editor) = workspace
        .resume_mut()
        .filter(|e| e.record().id == resume_id)
    {
        editor.abandon_save();
    }
}

impl Drop for SaveClaim {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(mut workspace) = self.state.workspace.try_lock() {
            abandon(&mut workspace, &self.resume_id);
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let state = Arc::clone(&self.state);
        let resume_id = std::mem::take(&mut self.resume_id);
        runtime.spawn(async move {
            abandon(&mut *state.workspace.lock().await, &resume_id);
        });
    }
}

/// The workspace lock is released while the update is in flight, so a
/// second save arriving meanwhile is turned away instead of queued.
pub async fn save_edit(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ResumeView>>, ApiError> {
    let cap = capability(&state)?;
    let (id, payload) =
        with_editor(&state, |editor| editor.begin_save().map_err(editor_error)).await?;
    let mut claim = SaveClaim {
        state: Arc::clone(&state),
        resume_id: id.clone(),
        settled: false,
    };

    let result = resumes::update_parsed_data(state.backend.records.as_ref(), &cap, &id, payload).await;

    let mut workspace = state.workspace.lock().await;
    claim.settled = true;
    let editor = workspace
        .resume_mut()
        .filter(|e| e.record().id == id)
        .ok_or_else(|| ApiError::conflict("The resume changed while saving"))?;
    editor.finish_save(result).map_err(editor_error)?;
    tracing::debug!(resume_id = %id, "Saved resume payload");
    Ok(JSend::success(ResumeView::from(&*editor)))
}

/// Back to the upload form. The stored resume is left alone.
pub async fn clear_latest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<ClearedResponse>>, ApiError> {
    let cap = capability(&state)?;
    let mut workspace = state.workspace.lock().await;
    workspace.bind(cap.owner_id());
    workspace.clear_resume();
    Ok(JSend::success(ClearedResponse { cleared: true }))
}
