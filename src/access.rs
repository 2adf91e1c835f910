//! Owner capability handed to every backend call.

use crate::auth::Session;

/// Proof of an authenticated owner. Record and file operations take one of
/// these instead of a bare user id, so nothing reaches the backend without a
/// session behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    owner_id: String,
    access_token: String,
}

impl Capability {
    pub fn for_session(session: &Session) -> Self {
        Self {
            owner_id: session.user.id.clone(),
            access_token: session.access_token.clone(),
        }
    }

    /// Only the session provider mints capabilities from bare parts.
    pub(crate) fn new(owner_id: &str, access_token: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Storage keys are namespaced by owner: `{owner_id}/...`.
    pub fn owns_key(&self, key: &str) -> bool {
        key.split_once('/')
            .map(|(prefix, rest)| prefix == self.owner_id && !rest.is_empty())
            .unwrap_or(false)
    }
}
