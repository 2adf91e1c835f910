use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    delete_owned, from_rows, get_owned, insert_owned, list_owned, now_value, owned, to_row,
    update_owned,
};
use crate::access::Capability;
use crate::backend::BackendError;
use crate::debounce::Debouncer;
use crate::storage::{RecordStore, Table};

/// A message template with `{placeholder}` tokens in its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-form category
    #[serde(default)]
    pub template_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
}

/// What a user without any template starts editing.
impl Default for TemplateDraft {
    fn default() -> Self {
        Self {
            name: "My Template".to_string(),
            description: "Edit this template to customize your messages".to_string(),
            template_type: "description".to_string(),
            content: String::new(),
            is_default: true,
        }
    }
}

impl From<&Template> for TemplateDraft {
    fn from(t: &Template) -> Self {
        Self {
            name: t.name.clone(),
            description: t.description.clone(),
            template_type: t.template_type.clone(),
            content: t.content.clone(),
            is_default: t.is_default,
        }
    }
}

impl TemplateDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

pub async fn list(
    store: &dyn RecordStore,
    cap: &Capability,
) -> Result<Vec<Template>, BackendError> {
    list_owned(store, cap, Table::PromptTemplates).await
}

pub async fn get(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
) -> Result<Option<Template>, BackendError> {
    get_owned(store, cap, Table::PromptTemplates, id).await
}

/// The template the editor opens with: the default one if there is one,
/// otherwise any template, otherwise none.
pub async fn active(
    store: &dyn RecordStore,
    cap: &Capability,
) -> Result<Option<Template>, BackendError> {
    let defaults = store
        .select(
            cap,
            Table::PromptTemplates,
            &owned(cap).eq("is_default", true).limit(1),
        )
        .await?;
    if let Some(t) = from_rows::<Template>(defaults)?.into_iter().next() {
        return Ok(Some(t));
    }

    let any = store
        .select(cap, Table::PromptTemplates, &owned(cap).limit(1))
        .await?;
    Ok(from_rows::<Template>(any)?.into_iter().next())
}

pub async fn create(
    store: &dyn RecordStore,
    cap: &Capability,
    draft: &TemplateDraft,
) -> Result<Template, BackendError> {
    let template: Template = insert_owned(store, cap, Table::PromptTemplates, draft).await?;
    tracing::debug!(template_id = %template.id, "Created template");
    Ok(template)
}

pub async fn update(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
    draft: &TemplateDraft,
) -> Result<Template, BackendError> {
    let mut patch = to_row(draft)?;
    patch.insert("updated_at".to_string(), now_value());
    update_owned(store, cap, Table::PromptTemplates, id, patch).await
}

pub async fn delete(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
) -> Result<bool, BackendError> {
    let removed = delete_owned(store, cap, Table::PromptTemplates, id).await?;
    tracing::debug!(template_id = %id, removed, "Deleted template");
    Ok(removed)
}

/// Debounce key of a template's pending auto-save.
pub fn autosave_key(id: &str) -> String {
    format!("template:{id}")
}

/// Queue a silent write-back of `draft` once edits pause. Unsaved drafts
/// (no id yet) are never auto-saved; returns whether a save was queued.
pub fn schedule_autosave(
    debouncer: &Debouncer,
    store: Arc<dyn RecordStore>,
    cap: Capability,
    id: Option<&str>,
    draft: TemplateDraft,
) -> bool {
    let Some(id) = id else {
        return false;
    };
    let id = id.to_string();
    let key = autosave_key(&id);

    debouncer.schedule(&key, async move {
        match update(store.as_ref(), &cap, &id, &draft).await {
            Ok(_) => tracing::debug!(template_id = %id, "Auto-saved template"),
            Err(e) => tracing::error!(template_id = %id, error = %e, "Auto-save failed"),
        }
    });
    true
}
