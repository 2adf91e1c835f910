use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{delete_owned, get_owned, insert_owned, list_owned, to_row, update_owned};
use crate::access::Capability;
use crate::backend::BackendError;
use crate::storage::{RecordStore, Table};

/// A generated LinkedIn outreach message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_title: Option<String>,
    #[serde(default)]
    pub recipient_company: Option<String>,
    pub message: String,
    /// Recipient's profile link
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub resume_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_title: Option<String>,
    #[serde(default)]
    pub recipient_company: Option<String>,
    pub message: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub resume_id: Option<String>,
}

impl MessageDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.recipient_name.trim().is_empty() {
            return Err("recipient_name must not be empty".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("message must not be empty".to_string());
        }
        Ok(())
    }
}

/// Newest first
pub async fn list(
    store: &dyn RecordStore,
    cap: &Capability,
) -> Result<Vec<Message>, BackendError> {
    list_owned(store, cap, Table::GeneratedMessages).await
}

pub async fn get(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
) -> Result<Option<Message>, BackendError> {
    get_owned(store, cap, Table::GeneratedMessages, id).await
}

pub async fn create(
    store: &dyn RecordStore,
    cap: &Capability,
    draft: &MessageDraft,
) -> Result<Message, BackendError> {
    let message: Message = insert_owned(store, cap, Table::GeneratedMessages, draft).await?;
    tracing::debug!(message_id = %message.id, "Created message");
    Ok(message)
}

pub async fn update(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
    draft: &MessageDraft,
) -> Result<Message, BackendError> {
    let message = update_owned(store, cap, Table::GeneratedMessages, id, to_row(draft)?).await?;
    tracing::debug!(message_id = %id, "Updated message");
    Ok(message)
}

pub async fn delete(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
) -> Result<bool, BackendError> {
    let removed = delete_owned(store, cap, Table::GeneratedMessages, id).await?;
    tracing::debug!(message_id = %id, removed, "Deleted message");
    Ok(removed)
}
