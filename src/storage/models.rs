use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A local password account stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub salt: Vec<u8>,
    /// PBKDF2-HMAC-SHA256 of the password
    pub password_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}
