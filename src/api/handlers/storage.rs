use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery};
use crate::object_store::ObjectStoreError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedParams {
    pub expires: i64,
    pub token: String,
}

/// Serve an object of the embedded store through a signed URL.
/// Route: GET /storage/:bucket/*key
pub async fn serve_signed(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    AppQuery(params): AppQuery<SignedParams>,
) -> Result<Response, ApiError> {
    let store = state
        .backend
        .local
        .as_ref()
        .map(|local| &local.store)
        .filter(|store| store.bucket() == bucket)
        .ok_or_else(|| ApiError::not_found("Bucket not found"))?;

    let data = store
        .open_signed(&key, params.expires, &params.token)
        .await
        .map_err(|e| match e {
            ObjectStoreError::Forbidden(reason) => ApiError::forbidden(reason),
            ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_) => {
                ApiError::not_found("Object not found")
            }
            _ => ApiError::internal(format!("Failed to read object: {e}")),
        })?;

    let mime_type = mime_guess::from_path(&key).first_or_octet_stream();
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .as_ref()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    let filename = key.rsplit('/').next().unwrap_or(&key);
    if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // The URL stops working at `expires`; never cache past that.
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("private, no-store"),
    );

    Ok(response)
}
