use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::backend_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::auth::{Credentials, User};
use crate::session::SessionState;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user: Option<User>,
    /// The account exists but must be confirmed before signing in.
    pub confirmation_required: bool,
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub signed_out: bool,
}

fn check_credentials(credentials: &Credentials) -> Result<(), ApiError> {
    if credentials.email.trim().is_empty() {
        return Err(ApiError::bad_request("email must not be empty"));
    }
    if credentials.password.is_empty() {
        return Err(ApiError::bad_request("password must not be empty"));
    }
    Ok(())
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(credentials): AppJson<Credentials>,
) -> Result<Json<JSend<SignInResponse>>, ApiError> {
    check_credentials(&credentials)?;
    let user = state
        .session
        .sign_in(&credentials)
        .await
        .map_err(backend_error)?;
    Ok(JSend::success(SignInResponse { user }))
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    AppJson(credentials): AppJson<Credentials>,
) -> Result<Json<JSend<SignUpResponse>>, ApiError> {
    check_credentials(&credentials)?;
    let user = state
        .session
        .sign_up(&credentials)
        .await
        .map_err(backend_error)?;

    tracing::debug!(email = %credentials.email, confirmed = user.is_some(), "Signed up");
    Ok(JSend::success(SignUpResponse {
        confirmation_required: user.is_none(),
        user,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<SignOutResponse>>, ApiError> {
    state.session.sign_out().await.map_err(backend_error)?;

    state.autosave.cancel_all();
    state.copies.clear();
    state.workspace.lock().await.reset();

    Ok(JSend::success(SignOutResponse { signed_out: true }))
}

pub async fn current_session(State(state): State<Arc<AppState>>) -> Json<JSend<SessionState>> {
    JSend::success(state.session.state())
}
