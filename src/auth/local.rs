use std::num::NonZeroU32;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use tokio::sync::watch;

use super::{AuthEvents, AuthService, Credentials, Session, User};
use crate::backend::BackendError;
use crate::storage::models::Account;
use crate::storage::Database;

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};
const SESSION_TTL_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

/// Password accounts stored in the embedded database. Mirrors the hosted
/// service's observable behaviour: same error codes, sessions persisted
/// across restarts, change notifications on every transition.
pub struct LocalAuth {
    db: Database,
    events: AuthEvents,
    rng: SystemRandom,
}

impl LocalAuth {
    pub fn new(db: Database) -> Result<Self, BackendError> {
        let current = db.current_session()?;
        Ok(Self {
            db,
            events: AuthEvents::new(current),
            rng: SystemRandom::new(),
        })
    }

    fn random_bytes<const N: usize>(&self) -> Result<[u8; N], BackendError> {
        let mut buf = [0u8; N];
        self.rng
            .fill(&mut buf)
            .map_err(|_| BackendError::Transport("System random source unavailable".into()))?;
        Ok(buf)
    }

    fn issue_session(&self, account: &Account) -> Result<Session, BackendError> {
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(self.random_bytes::<32>()?);
        let refresh = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(self.random_bytes::<32>()?);

        Ok(Session {
            access_token: token,
            refresh_token: Some(refresh),
            expires_at: Some(Utc::now().timestamp() + SESSION_TTL_SECS),
            user: User {
                id: account.id.clone(),
                email: Some(account.email.clone()),
                last_sign_in_at: account.last_sign_in_at,
            },
        })
    }

    fn start_session(&self, mut account: Account) -> Result<Session, BackendError> {
        account.last_sign_in_at = Some(Utc::now());
        self.db.put_account(&account)?;

        let session = self.issue_session(&account)?;
        self.db.set_current_session(Some(&session))?;
        self.events.publish(Some(session.clone()));
        Ok(session)
    }
}

fn normalize_email(email: &str) -> Result<String, BackendError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(BackendError::api(
            400,
            Some("validation_failed"),
            "Unable to validate email address: invalid format",
        ));
    }
    Ok(email)
}

fn invalid_credentials() -> BackendError {
    BackendError::api(400, Some("invalid_credentials"), "Invalid login credentials")
}

#[async_trait]
impl AuthService for LocalAuth {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let current = self.events.current();
        match current {
            Some(session)
                if session
                    .expires_at
                    .map(|exp| exp <= Utc::now().timestamp())
                    .unwrap_or(false) =>
            {
                tracing::debug!(user_id = %session.user.id, "Stored session expired");
                self.db.set_current_session(None)?;
                self.events.publish(None);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, BackendError> {
        let email = normalize_email(&credentials.email)?;
        let account = self
            .db
            .get_account(&email)?
            .ok_or_else(invalid_credentials)?;

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            &account.salt,
            credentials.password.as_bytes(),
            &account.password_hash,
        )
        .map_err(|_| invalid_credentials())?;

        let session = self.start_session(account)?;
        tracing::debug!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, BackendError> {
        let email = normalize_email(&credentials.email)?;
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::api(
                422,
                Some("weak_password"),
                format!("Password should be at least {MIN_PASSWORD_LEN} characters."),
            ));
        }
        if self.db.get_account(&email)?.is_some() {
            return Err(BackendError::api(
                422,
                Some("user_already_exists"),
                "User already registered",
            ));
        }

        let salt = self.random_bytes::<16>()?;
        let mut password_hash = vec![0u8; ring::digest::SHA256_OUTPUT_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            &salt,
            credentials.password.as_bytes(),
            &mut password_hash,
        );

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            salt: salt.to_vec(),
            password_hash,
            created_at: Utc::now(),
            last_sign_in_at: None,
        };
        tracing::debug!(user_id = %account.id, "Created account");

        // Local accounts need no e-mail confirmation.
        let session = self.start_session(account)?;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.db.set_current_session(None)?;
        self.events.publish(None);
        Ok(())
    }
}
