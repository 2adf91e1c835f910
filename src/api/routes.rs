use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::guard::require_session;
use crate::AppState;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request body limit of the upload route. Saturates rather than wrapping.
fn upload_body_limit(max_upload_size: u64) -> usize {
    usize::try_from(max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = upload_body_limit(state.config.max_upload_size);

    let pages = Router::new()
        .route("/", get(handlers::home))
        .route("/profile", get(handlers::profile))
        .route("/messages", get(handlers::messages_page))
        .route("/prompt-templates", get(handlers::templates_page))
        .route("/jobs", get(handlers::jobs_page))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_session,
        ));

    let mut router = Router::new()
        .merge(pages)
        .route("/login", get(handlers::login_page))
        // Auth
        .route("/auth/login", post(handlers::login))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/session", get(handlers::current_session))
        // Resumes
        .route(
            "/api/resumes",
            post(handlers::upload_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/resumes/latest", get(handlers::latest_resume))
        .route("/api/resumes/latest", delete(handlers::clear_latest))
        .route("/api/resumes/latest/preview", get(handlers::latest_preview))
        .route("/api/resumes/editor/edit", post(handlers::start_edit))
        .route("/api/resumes/editor/draft", put(handlers::set_draft))
        .route("/api/resumes/editor/save", post(handlers::save_edit))
        .route("/api/resumes/editor/cancel", post(handlers::cancel_edit))
        // Messages
        .route("/api/messages", get(handlers::list_messages))
        .route("/api/messages", post(handlers::create_message))
        .route("/api/messages/:id", get(handlers::get_message))
        .route("/api/messages/:id", put(handlers::update_message))
        .route("/api/messages/:id", delete(handlers::delete_message))
        .route("/api/messages/:id/copy", post(handlers::copy_message))
        // Templates
        .route("/api/templates", get(handlers::list_templates))
        .route("/api/templates", post(handlers::create_template))
        .route("/api/templates/active", get(handlers::active_template))
        .route("/api/templates/:id", get(handlers::get_template))
        .route("/api/templates/:id", put(handlers::update_template))
        .route("/api/templates/:id", delete(handlers::delete_template))
        .route("/api/templates/:id/draft", put(handlers::autosave_template))
        .route("/api/templates/:id/copy", post(handlers::copy_template))
        // Jobs
        .route("/api/jobs", get(handlers::list_jobs))
        .route("/api/jobs", post(handlers::create_job))
        .route("/api/jobs/:id", get(handlers::get_job))
        .route("/api/jobs/:id", put(handlers::update_job))
        .route("/api/jobs/:id", delete(handlers::delete_job))
        .route("/api/jobs/:id/copy", post(handlers::copy_job))
        .route("/api/copy-status", get(handlers::copy_status))
        // Signed file URLs of the embedded store
        .route("/storage/:bucket/*key", get(handlers::serve_signed))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled. Purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router
        .fallback(handlers::fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Capability;
    use crate::backend::BackendError;
    use crate::storage::{Query, RecordStore, Row, Table};
    use crate::testutil::{sign_up, test_state, test_state_with};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "resume-desk-boundary";

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> Response {
        create_router(Arc::clone(state)).oneshot(req).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload(file_name: &str, content_type: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             {contents}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri("/api/resumes")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(resp: &Response) -> &str {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_signed_out_pages_redirect_to_login() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;

        for path in ["/", "/profile", "/messages", "/prompt-templates", "/jobs"] {
            let resp = send(&state, get(path)).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(location(&resp), "/login", "{path}");
        }

        let resp = send(&state, get("/login")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_signed_in_pages_render() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;
        sign_up(&state, "jane@x.com").await;

        let resp = send(&state, get("/profile")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // The login page sends signed-in users home
        let resp = send(&state, get("/login")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
    }

    #[tokio::test]
    async fn test_unknown_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;

        let resp = send(&state, get("/no/such/page")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");

        let resp = send(&state, get("/api/no-such-thing")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;

        let resp = send(&state, get("/api/messages")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = send(&state, upload("resume.txt", "text/plain", "Jane Doe")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_session_logout_flow() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;

        let resp = send(
            &state,
            json_request(
                Method::POST,
                "/auth/signup",
                json!({ "email": "jane@x.com", "password": "correct horse battery" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["confirmation_required"], false);

        let resp = send(&state, json_request(Method::POST, "/auth/logout", json!({}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.session.user().is_none());

        let resp = send(
            &state,
            json_request(
                Method::POST,
                "/auth/login",
                json!({ "email": "jane@x.com", "password": "wrong" }),
            ),
        )
        .await;
        assert!(resp.status().is_client_error());

        let resp = send(
            &state,
            json_request(
                Method::POST,
                "/auth/login",
                json!({ "email": "jane@x.com", "password": "correct horse battery" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["user"]["email"], "jane@x.com");
    }

    #[tokio::test]
    async fn test_upload_then_edit_resume() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;
        sign_up(&state, "jane@x.com").await;

        let resp = send(&state, get("/api/resumes/latest")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"], Value::Null);

        let resp = send(&state, upload("resume.txt", "text/plain", "Jane Doe\njane@x.com")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(
            body["data"]["record"]["parsed_data"],
            json!({ "rawText": "Jane Doe\njane@x.com" })
        );

        let resp = send(&state, json_request(Method::POST, "/api/resumes/editor/edit", json!({}))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(
            &state,
            json_request(
                Method::PUT,
                "/api/resumes/editor/draft",
                json!({ "text": "{ not json" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = send(&state, json_request(Method::POST, "/api/resumes/editor/save", json!({}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(
            &state,
            json_request(
                Method::PUT,
                "/api/resumes/editor/draft",
                json!({ "text": "{\"name\": \"Jane Doe\"}" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = send(&state, json_request(Method::POST, "/api/resumes/editor/save", json!({}))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&state, get("/api/resumes/latest")).await;
        let body = body_json(resp).await;
        assert_eq!(body["data"]["record"]["parsed_data"], json!({ "name": "Jane Doe" }));
        assert_eq!(body["data"]["editing"], false);
    }

    #[tokio::test]
    async fn test_message_crud_and_copy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;
        sign_up(&state, "jane@x.com").await;

        let resp = send(
            &state,
            json_request(
                Method::POST,
                "/api/messages",
                json!({ "recipient_name": "Sam", "message": "Hi Sam" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let id = body_json(resp).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = send(
            &state,
            json_request(Method::POST, &format!("/api/messages/{id}/copy"), json!({})),
        )
        .await;
        let body = body_json(resp).await;
        assert_eq!(body["data"]["text"], "Hi Sam");
        assert_eq!(body["data"]["status"], "copied");

        let resp = send(
            &state,
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/api/messages/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(send(&state, get("/api/messages")).await).await;
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir).await;

        let resp = send(&state, get("/_internal/health")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["backend"], "local");
    }

    /// Record store whose first update never answers.
    struct StallFirstUpdate {
        inner: Arc<dyn RecordStore>,
        stalled: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for StallFirstUpdate {
        async fn select(
            &self,
            cap: &Capability,
            table: Table,
            query: &Query,
        ) -> Result<Vec<Row>, BackendError> {
            self.inner.select(cap, table, query).await
        }

        async fn insert(&self, cap: &Capability, table: Table, row: Row) -> Result<Row, BackendError> {
            self.inner.insert(cap, table, row).await
        }

        async fn update(
            &self,
            cap: &Capability,
            table: Table,
            query: &Query,
            patch: Row,
        ) -> Result<Vec<Row>, BackendError> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.update(cap, table, query, patch).await
        }

        async fn delete(
            &self,
            cap: &Capability,
            table: Table,
            query: &Query,
        ) -> Result<u64, BackendError> {
            self.inner.delete(cap, table, query).await
        }
    }

    #[tokio::test]
    async fn test_dropped_save_does_not_block_the_next_one() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state_with(&temp_dir, |backend| {
            backend.records = Arc::new(StallFirstUpdate {
                inner: Arc::clone(&backend.records),
                stalled: AtomicBool::new(false),
            });
        });
        state.session.init().await;
        sign_up(&state, "jane@x.com").await;

        let resp = send(&state, upload("resume.txt", "text/plain", "Jane Doe")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let edit = || json_request(Method::POST, "/api/resumes/editor/edit", json!({}));
        let draft = || {
            json_request(
                Method::PUT,
                "/api/resumes/editor/draft",
                json!({ "text": "{\"name\": \"Jane\"}" }),
            )
        };
        let save = || json_request(Method::POST, "/api/resumes/editor/save", json!({}));

        send(&state, edit()).await;
        send(&state, draft()).await;
        let abandoned = tokio::time::timeout(Duration::from_millis(200), send(&state, save())).await;
        assert!(abandoned.is_err());

        let resp = send(
            &state,
            json_request(Method::POST, "/api/resumes/editor/cancel", json!({})),
        )
        .await;
        assert_eq!(body_json(resp).await["data"]["saving"], false);

        send(&state, edit()).await;
        send(&state, draft()).await;
        let resp = send(&state, save()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["record"]["parsed_data"], json!({ "name": "Jane" }));
        assert_eq!(body["data"]["saving"], false);
    }

    #[tokio::test]
    async fn test_pages_show_spinner_until_session_is_known() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state_with(&temp_dir, |_| {});

        let resp = send(&state, get("/profile")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::LOCATION).is_none());
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("loading-spinner"));

        state.session.init().await;
        let resp = send(&state, get("/profile")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_upload_body_limit_saturates() {
        assert_eq!(upload_body_limit(1024), 1024 + MULTIPART_OVERHEAD);
        assert_eq!(upload_body_limit(u64::MAX), usize::MAX);
    }
}
