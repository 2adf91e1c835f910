//! Who is signed in, kept in step with the auth service.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::access::Capability;
use crate::auth::{AuthService, Credentials, Session, User};
use crate::backend::BackendError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub user: Option<User>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// True until the first session lookup has finished.
    pub loading: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            user: None,
            access_token: None,
            loading: true,
        }
    }

    pub fn from_session(session: Option<&Session>) -> Self {
        Self {
            user: session.map(|s| s.user.clone()),
            access_token: session.map(|s| s.access_token.clone()),
            loading: false,
        }
    }

    pub fn capability(&self) -> Option<Capability> {
        match (&self.user, &self.access_token) {
            (Some(user), Some(token)) => Some(Capability::new(&user.id, token)),
            _ => None,
        }
    }
}

/// Owns the current identity. Created once, `init` before serving,
/// `shutdown` on the way out.
pub struct SessionProvider {
    auth: Arc<dyn AuthService>,
    state: Arc<watch::Sender<SessionState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionProvider {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let (tx, _) = watch::channel(SessionState::loading());
        Self {
            auth,
            state: Arc::new(tx),
            listener: Mutex::new(None),
        }
    }

    /// Follow the auth service's change notifications, then look the
    /// current session up once.
    pub async fn init(&self) {
        let mut changes = self.auth.subscribe();
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let session = changes.borrow_and_update().clone();
                tracing::debug!(signed_in = session.is_some(), "Auth state changed");
                state.send_replace(SessionState::from_session(session.as_ref()));
            }
        });
        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            previous.abort();
        }

        match self.auth.get_session().await {
            Ok(session) => {
                self.state
                    .send_replace(SessionState::from_session(session.as_ref()));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch the current session");
                self.state.send_replace(SessionState::from_session(None));
            }
        }
    }

    /// Stop following auth changes.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn capability(&self) -> Result<Capability, BackendError> {
        self.state
            .borrow()
            .capability()
            .ok_or(BackendError::Unauthenticated)
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<User, BackendError> {
        let session = self.auth.sign_in_with_password(credentials).await?;
        self.state
            .send_replace(SessionState::from_session(Some(&session)));
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session.user)
    }

    /// `None` when the account must be confirmed before it can sign in.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<Option<User>, BackendError> {
        let session = self.auth.sign_up(credentials).await?;
        if let Some(session) = &session {
            self.state
                .send_replace(SessionState::from_session(Some(session)));
        }
        Ok(session.map(|s| s.user))
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.auth.sign_out().await?;
        self.state.send_replace(SessionState::from_session(None));
        tracing::info!("Signed out");
        Ok(())
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
