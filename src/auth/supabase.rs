use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::watch;

use super::{AuthEvents, AuthService, Credentials, Session, User};
use crate::backend::{BackendError, SupabaseClient};

/// Supabase GoTrue password authentication. The session lives in memory for
/// the lifetime of the process.
pub struct SupabaseAuth {
    client: Arc<SupabaseClient>,
    events: AuthEvents,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(t: TokenResponse) -> Self {
        let expires_at = t
            .expires_at
            .or_else(|| t.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_at,
            user: t.user,
        }
    }
}

impl SupabaseAuth {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self {
            client,
            events: AuthEvents::new(None),
        }
    }
}

#[async_trait]
impl AuthService for SupabaseAuth {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(session) = self.events.current() else {
            return Ok(None);
        };

        let resp = self
            .client
            .request(Method::GET, "/auth/v1/user", Some(&session.access_token))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.events.publish(None);
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(SupabaseClient::error_from(resp).await);
        }

        let user: User = resp.json().await?;
        Ok(Some(Session { user, ..session }))
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, BackendError> {
        let resp = self
            .client
            .request(Method::POST, "/auth/v1/token?grant_type=password", None)
            .json(credentials)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SupabaseClient::error_from(resp).await);
        }

        let session: Session = resp.json::<TokenResponse>().await?.into();
        self.events.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, BackendError> {
        let resp = self
            .client
            .request(Method::POST, "/auth/v1/signup", None)
            .json(credentials)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SupabaseClient::error_from(resp).await);
        }

        // With e-mail confirmation enabled the body is the bare user, no tokens.
        let body: serde_json::Value = resp.json().await?;
        if body.get("access_token").is_none() {
            tracing::debug!("Sign-up pending confirmation");
            return Ok(None);
        }

        let session: Session = serde_json::from_value::<TokenResponse>(body)?.into();
        self.events.publish(Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(session) = self.events.current() else {
            return Ok(());
        };

        let result = self
            .client
            .request(Method::POST, "/auth/v1/logout", Some(&session.access_token))
            .send()
            .await;

        // The local session is dropped even when revocation fails.
        self.events.publish(None);

        let resp = result?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Err(SupabaseClient::error_from(resp).await);
        }
        Ok(())
    }
}
