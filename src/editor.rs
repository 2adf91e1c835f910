//! Edit-in-place of a resume's parsed payload as JSON text.

use serde_json::Value;
use thiserror::Error;

use crate::access::Capability;
use crate::backend::BackendError;
use crate::records::resumes::{self, ResumeRecord, ResumeWrite};
use crate::storage::RecordStore;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("The resume is not being edited")]
    NotEditing,
    #[error("A save is already in progress")]
    SaveInProgress,
    #[error("Failed to update resume: {message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Viewing,
    Editing { draft: String },
}

/// Editor over one resume record.
///
/// A save is split in two so callers can release their lock on the editor
/// while the update is in flight: [`begin_save`](Self::begin_save) validates
/// the draft and marks the save as running, [`finish_save`](Self::finish_save)
/// applies the backend's answer.
#[derive(Debug, Clone)]
pub struct ResumeEditor {
    record: ResumeRecord,
    mode: Mode,
    error: Option<String>,
    saving: bool,
}

pub fn render(payload: &Value) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
}

impl ResumeEditor {
    pub fn new(record: ResumeRecord) -> Self {
        Self {
            record,
            mode: Mode::Viewing,
            error: None,
            saving: false,
        }
    }

    pub fn record(&self) -> &ResumeRecord {
        &self.record
    }

    /// The saved payload, pretty-printed.
    pub fn rendered(&self) -> String {
        render(&self.record.parsed_data)
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Editing { .. })
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.mode {
            Mode::Editing { draft } => Some(draft),
            Mode::Viewing => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn edit(&mut self) {
        if !self.is_editing() {
            self.mode = Mode::Editing {
                draft: self.rendered(),
            };
        }
    }

    pub fn set_draft(&mut self, text: impl Into<String>) -> Result<(), EditorError> {
        match &mut self.mode {
            Mode::Editing { draft } => {
                *draft = text.into();
                Ok(())
            }
            Mode::Viewing => Err(EditorError::NotEditing),
        }
    }

    /// Throw the draft away; the saved payload is shown again untouched.
    /// Also releases a save whose caller went away.
    pub fn cancel(&mut self) {
        self.mode = Mode::Viewing;
        self.error = None;
        self.saving = false;
    }

    /// Release a save started by `begin_save` that will never be finished.
    /// The draft stays, so the save can be retried.
    pub fn abandon_save(&mut self) {
        if self.saving {
            tracing::debug!(resume_id = %self.record.id, "Abandoned resume save");
        }
        self.saving = false;
    }

    /// Validate the draft and claim the save. Returns the payload to write.
    pub fn begin_save(&mut self) -> Result<(String, Value), EditorError> {
        if self.saving {
            return Err(EditorError::SaveInProgress);
        }
        let Some(draft) = self.draft() else {
            return Err(EditorError::NotEditing);
        };

        match serde_json::from_str::<Value>(draft) {
            Ok(payload) => {
                self.saving = true;
                self.error = None;
                Ok((self.record.id.clone(), payload))
            }
            Err(e) => {
                let err = EditorError::InvalidJson(e.to_string());
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Apply the outcome of the update started by `begin_save`.
    pub fn finish_save(
        &mut self,
        result: Result<ResumeRecord, BackendError>,
    ) -> Result<&ResumeRecord, EditorError> {
        self.saving = false;
        match result {
            Ok(record) => {
                self.record = record;
                self.mode = Mode::Viewing;
                self.error = None;
                Ok(&self.record)
            }
            Err(source) => {
                let err = EditorError::Backend {
                    message: resumes::write_error_message(&source, ResumeWrite::Update),
                    source,
                };
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Validate, write and apply in one go.
    pub async fn save(
        &mut self,
        store: &dyn RecordStore,
        cap: &Capability,
    ) -> Result<&ResumeRecord, EditorError> {
        let (id, payload) = self.begin_save()?;
        let result = resumes::update_parsed_data(store, cap, &id, payload).await;
        self.finish_save(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record() -> ResumeRecord {
        ResumeRecord {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: uuid::Uuid::new_v4().to_string(),
            filename: "u1-abc.txt".to_string(),
            file_url: Some("u1/u1-abc.txt".to_string()),
            file_type: "text/plain".to_string(),
            parsed_data: json!({ "rawText": "Jane Doe" }),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_renders_with_two_space_indent() {
        let editor = ResumeEditor::new(record());
        assert_eq!(editor.rendered(), "{\n  \"rawText\": \"Jane Doe\"\n}");
    }

    #[test]
    fn test_edit_seeds_draft_and_cancel_restores() {
        let mut editor = ResumeEditor::new(record());
        assert!(editor.set_draft("{}").is_err());

        editor.edit();
        assert_eq!(editor.draft(), Some(editor.rendered().as_str()));

        editor.set_draft("{ broken").unwrap();
        assert!(matches!(editor.begin_save(), Err(EditorError::InvalidJson(_))));
        assert!(editor.error().is_some());
        assert!(editor.is_editing());

        editor.cancel();
        assert!(!editor.is_editing());
        assert!(editor.error().is_none());
        assert_eq!(editor.record().parsed_data, json!({ "rawText": "Jane Doe" }));
    }

    #[test]
    fn test_second_save_is_rejected_while_first_is_running() {
        let mut editor = ResumeEditor::new(record());
        editor.edit();
        editor.set_draft(r#"{"rawText": "Jane"}"#).unwrap();

        let (_, payload) = editor.begin_save().unwrap();
        assert_eq!(payload, json!({ "rawText": "Jane" }));
        assert!(matches!(editor.begin_save(), Err(EditorError::SaveInProgress)));

        let mut saved = editor.record().clone();
        saved.parsed_data = payload;
        editor.finish_save(Ok(saved)).unwrap();
        assert!(!editor.is_saving());
        assert!(!editor.is_editing());
        assert_eq!(editor.record().raw_text(), Some("Jane"));
    }

    #[test]
    fn test_abandoned_save_can_be_retried() {
        let mut editor = ResumeEditor::new(record());
        editor.edit();
        editor.set_draft(r#"{"rawText": "Jane"}"#).unwrap();
        editor.begin_save().unwrap();

        editor.abandon_save();
        assert!(!editor.is_saving());
        assert_eq!(editor.draft(), Some(r#"{"rawText": "Jane"}"#));
        assert!(editor.begin_save().is_ok());
    }

    #[test]
    fn test_cancel_releases_running_save() {
        let mut editor = ResumeEditor::new(record());
        editor.edit();
        editor.begin_save().unwrap();

        editor.cancel();
        assert!(!editor.is_saving());

        editor.edit();
        assert!(editor.begin_save().is_ok());
    }

    #[test]
    fn test_failed_write_keeps_editing() {
        let mut editor = ResumeEditor::new(record());
        editor.edit();
        editor.begin_save().unwrap();

        let denied = BackendError::api(403, Some("42501"), "denied");
        let err = editor.finish_save(Err(denied)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to update resume: You do not have permission to update this resume"
        );
        assert!(editor.is_editing());
        assert!(!editor.is_saving());
    }
}
