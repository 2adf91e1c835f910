mod local;
mod supabase;

pub use local::LocalAuth;
pub use supabase::SupabaseAuth;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::backend::BackendError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Hosted authentication service.
///
/// Change notifications are delivered through a `watch` channel: every
/// sign-in, sign-up that yields a session, and sign-out publishes the new
/// session (or `None`).
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
    async fn sign_in_with_password(&self, credentials: &Credentials)
        -> Result<Session, BackendError>;
    /// `None` when the account needs confirmation before a session is issued.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, BackendError>;
    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Session-change fan-out shared by the auth implementations.
pub(crate) struct AuthEvents {
    tx: watch::Sender<Option<Session>>,
}

impl AuthEvents {
    pub(crate) fn new(initial: Option<Session>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    pub(crate) fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }
}
