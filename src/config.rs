use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Quiet period before a template draft is written back
    pub autosave_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Base URL this process is reachable at; local signed URLs point here.
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Object storage bucket holding uploaded resumes
    pub resume_bucket: String,
    /// Directory for the embedded database (local backend)
    pub data_dir: String,
    /// Directory for stored files (local backend)
    pub local_storage_path: String,
    /// HMAC key for local signed URLs. A random key is generated when unset.
    pub signing_secret: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5173".to_string(),
            public_url: "http://127.0.0.1:5173".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            resume_bucket: "resumes".to_string(),
            data_dir: "./data".to_string(),
            local_storage_path: "./files".to_string(),
            signing_secret: None,
            supabase_url: None,
            supabase_anon_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:5173".to_string());

        let public_url = std::env::var("PUBLIC_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{bind_address}"));

        let kind = match std::env::var("BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "supabase" => BackendKind::Supabase,
            _ => BackendKind::Local,
        };

        let resume_bucket =
            std::env::var("RESUME_BUCKET").unwrap_or_else(|_| "resumes".to_string());
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());
        let signing_secret = std::env::var("SIGNING_SECRET").ok().filter(|s| !s.is_empty());

        let supabase_url = std::env::var("SUPABASE_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string());
        let supabase_anon_key = std::env::var("SUPABASE_ANON_KEY").ok();

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10 * 1024 * 1024); // 10MB

        let autosave_delay = std::env::var("AUTOSAVE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(2));

        let config = Config {
            server: ServerConfig {
                bind_address,
                public_url,
            },
            backend: BackendConfig {
                kind,
                resume_bucket,
                data_dir,
                local_storage_path,
                signing_secret,
                supabase_url,
                supabase_anon_key,
            },
            test_mode,
            max_upload_size,
            autosave_delay,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.resume_bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "RESUME_BUCKET cannot be empty".to_string(),
            ));
        }

        if self.backend.kind == BackendKind::Supabase {
            if self.backend.supabase_url.is_none() {
                return Err(ConfigError::ValidationError(
                    "SUPABASE_URL is required when BACKEND=supabase".to_string(),
                ));
            }
            if self.backend.supabase_anon_key.is_none() {
                return Err(ConfigError::ValidationError(
                    "SUPABASE_ANON_KEY is required when BACKEND=supabase".to_string(),
                ));
            }
        }

        if self.backend.kind == BackendKind::Local && self.backend.signing_secret.is_none() {
            tracing::warn!(
                "SIGNING_SECRET is not set. Signed file URLs will not survive a restart."
            );
        }

        if self.autosave_delay > Duration::from_secs(3) {
            tracing::warn!(
                delay_ms = self.autosave_delay.as_millis() as u64,
                "Auto-save delay is longer than 3 seconds"
            );
        }

        Ok(())
    }
}
