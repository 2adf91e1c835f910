//! Shared test helpers for resume-desk unit tests.

use std::sync::Arc;
use std::time::Duration;

use crate::access::Capability;
use crate::auth::Credentials;
use crate::backend::Backend;
use crate::config::{BackendConfig, Config, ServerConfig};
use crate::AppState;

/// Config pointing the embedded backend at a temporary directory.
pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            public_url: "http://127.0.0.1:5173".to_string(),
        },
        backend: BackendConfig {
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
            local_storage_path: temp_dir.path().join("files").to_string_lossy().to_string(),
            signing_secret: Some("test-signing-secret".to_string()),
            ..BackendConfig::default()
        },
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
        autosave_delay: Duration::from_secs(2),
    }
}

/// Create a test AppState over the embedded backend. The session is
/// initialised, so nobody is signed in and nothing is loading.
pub async fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let state = test_state_with(temp_dir, |_| {});
    state.session.init().await;
    state
}

/// AppState whose session has not been initialised yet, after letting
/// `adjust` swap backend services.
pub fn test_state_with(
    temp_dir: &tempfile::TempDir,
    adjust: impl FnOnce(&mut Backend),
) -> Arc<AppState> {
    let config = test_config(temp_dir);
    let mut backend = Backend::local(&config).expect("Failed to create test backend");
    adjust(&mut backend);
    Arc::new(AppState::new(config, backend))
}

pub fn credentials(email: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: "correct horse battery".to_string(),
    }
}

/// Register `email` and leave it signed in.
pub async fn sign_up(state: &AppState, email: &str) -> Capability {
    state
        .session
        .sign_up(&credentials(email))
        .await
        .expect("sign up failed")
        .expect("local sign up returns a session");
    state.session.capability().expect("signed in")
}
