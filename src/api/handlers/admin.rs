use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub rows_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JSend<HealthResponse>> {
    let backend = if state.backend.local.is_some() {
        "local"
    } else {
        "supabase"
    };
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: backend.to_string(),
    })
}

/// Wipe every record row of the embedded backend. Accounts survive.
pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let local = state
        .backend
        .local
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("Purge is only available on the local backend"))?;

    let stats = local
        .db
        .purge_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    state.autosave.cancel_all();
    state.copies.clear();
    state.workspace.lock().await.reset();

    tracing::warn!(rows = stats.rows, "Purged all data");

    Ok(JSend::success(PurgeResponse {
        rows_deleted: stats.rows,
    }))
}
