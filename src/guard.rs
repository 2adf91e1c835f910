use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::auth::User;
use crate::session::SessionState;
use crate::AppState;

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Identity not known yet; show a spinner, never redirect.
    Loading,
    Allow(User),
    RedirectToLogin,
}

pub fn decide(state: &SessionState) -> GuardDecision {
    if state.loading {
        return GuardDecision::Loading;
    }
    match &state.user {
        Some(user) => GuardDecision::Allow(user.clone()),
        None => GuardDecision::RedirectToLogin,
    }
}

const SPINNER: &str = r#"<!doctype html>
<html><head><meta http-equiv="refresh" content="1"></head>
<body><div class="loading loading-spinner" role="status">Loading...</div></body></html>"#;

/// Gate for the signed-in pages. The signed-in user is handed to the page
/// as a request extension.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match decide(&state.session.state()) {
        GuardDecision::Loading => (StatusCode::OK, Html(SPINNER)).into_response(),
        GuardDecision::RedirectToLogin => {
            tracing::debug!(path = %req.uri().path(), "No session, redirecting to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
        GuardDecision::Allow(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions() {
        assert_eq!(decide(&SessionState::loading()), GuardDecision::Loading);
        assert_eq!(
            decide(&SessionState::from_session(None)),
            GuardDecision::RedirectToLogin
        );

        let signed_in = SessionState {
            user: Some(User {
                id: "u1".to_string(),
                email: None,
                last_sign_in_at: None,
            }),
            access_token: Some("t".to_string()),
            loading: false,
        };
        assert!(matches!(decide(&signed_in), GuardDecision::Allow(u) if u.id == "u1"));
    }
}
