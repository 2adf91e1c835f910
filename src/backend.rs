//! The external backend: authentication, object storage and row storage.
//!
//! Two implementations sit behind the same traits. The hosted one talks to
//! Supabase (GoTrue, Storage, PostgREST) over HTTP; the local one keeps rows
//! in redb and files on disk and answers with the same error codes.

use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{AuthService, LocalAuth, SupabaseAuth};
use crate::config::{BackendKind, Config};
use crate::object_store::{LocalStore, ObjectStore, ObjectStoreError, SupabaseStore};
use crate::storage::{Database, DatabaseError, LocalRecords, PostgrestRecords, RecordStore};

/// Error codes the application reacts to. Postgres SQLSTATEs plus PostgREST's own.
pub mod codes {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
    pub const JWT_PERMISSION: &str = "PGRST301";
    pub const NO_ROWS: &str = "PGRST116";
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Storage error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

impl BackendError {
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        BackendError::Api {
            status,
            code: code.map(|c| c.to_string()),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self.code(),
            Some(codes::JWT_PERMISSION) | Some(codes::INSUFFICIENT_PRIVILEGE)
        )
    }

    /// A `.single()`-style lookup that matched nothing.
    pub fn no_rows(table: &str) -> Self {
        BackendError::api(
            406,
            Some(codes::NO_ROWS),
            format!("JSON object requested, multiple (or no) rows returned from {table}"),
        )
    }
}

/// The three backend services, shared by every request.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthService>,
    pub files: Arc<dyn ObjectStore>,
    pub records: Arc<dyn RecordStore>,
    /// Present only for the embedded backend; serves signed URLs and purge.
    pub local: Option<LocalBackend>,
}

#[derive(Clone)]
pub struct LocalBackend {
    pub db: Database,
    pub store: Arc<LocalStore>,
}

impl Backend {
    pub async fn from_config(config: &Config) -> Result<Self, BackendError> {
        match config.backend.kind {
            BackendKind::Local => Self::local(config),
            BackendKind::Supabase => Self::supabase(config),
        }
    }

    /// Embedded backend: redb rows, filesystem objects, local password accounts.
    pub fn local(config: &Config) -> Result<Self, BackendError> {
        let db = Database::open(&config.backend.data_dir)?;
        let secret = config
            .backend
            .signing_secret
            .as_ref()
            .map(|s| s.as_bytes().to_vec())
            .unwrap_or_else(LocalStore::random_secret);
        let store = Arc::new(
            LocalStore::new(
                &config.backend.local_storage_path,
                &config.backend.resume_bucket,
                &config.server.public_url,
                &secret,
            )
            .map_err(ObjectStoreError::from)?,
        );

        Ok(Self {
            auth: Arc::new(LocalAuth::new(db.clone())?),
            files: store.clone(),
            records: Arc::new(LocalRecords::new(db.clone())),
            local: Some(LocalBackend { db, store }),
        })
    }

    pub fn supabase(config: &Config) -> Result<Self, BackendError> {
        let url = config
            .backend
            .supabase_url
            .as_deref()
            .ok_or_else(|| BackendError::Transport("SUPABASE_URL is not set".to_string()))?;
        let anon_key = config
            .backend
            .supabase_anon_key
            .as_deref()
            .ok_or_else(|| BackendError::Transport("SUPABASE_ANON_KEY is not set".to_string()))?;
        let client = Arc::new(SupabaseClient::new(url, anon_key)?);

        Ok(Self {
            auth: Arc::new(SupabaseAuth::new(Arc::clone(&client))),
            files: Arc::new(SupabaseStore::new(
                Arc::clone(&client),
                &config.backend.resume_bucket,
            )),
            records: Arc::new(PostgrestRecords::new(client)),
            local: None,
        })
    }
}

/// Thin HTTP client shared by the Supabase auth, storage and REST adapters.
pub struct SupabaseClient {
    http: Client,
    url: String,
    anon_key: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default, alias = "error_code")]
    error: Option<String>,
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
}

impl SupabaseClient {
    pub fn new(url: &str, anon_key: &str) -> Result<Self, BackendError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Request with the project key; `bearer` is the user's access token when signed in.
    pub fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    /// Turn a non-success response into a `BackendError::Api`.
    pub async fn error_from(resp: Response) -> BackendError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

        // GoTrue reports numeric `code` (the HTTP status) and a string `error_code`.
        let code = match parsed.code {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => parsed.error,
        };
        let message = parsed
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("Request failed with status {status}")
                } else {
                    body
                }
            });

        BackendError::Api {
            status,
            code,
            message,
        }
    }
}
