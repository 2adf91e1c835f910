use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{insert_owned, now_value, owned, update_owned};
use crate::access::Capability;
use crate::backend::{codes, BackendError};
use crate::storage::{RecordStore, Row, Table};

/// Serialized payloads longer than this get their raw text cut down.
pub const MAX_PAYLOAD_CHARS: usize = 100_000;
/// Characters of raw text kept when the cap applies.
pub const TRUNCATED_TEXT_CHARS: usize = 5_000;
pub const TRUNCATION_MARKER: &str = "... (truncated due to size limits)";
/// Key of the extracted text inside `parsed_data`.
pub const RAW_TEXT_KEY: &str = "rawText";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    /// Storage path or signed URL without its query string
    #[serde(default)]
    pub file_url: Option<String>,
    pub file_type: String,
    #[serde(default)]
    pub parsed_data: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ResumeRecord {
    pub fn raw_text(&self) -> Option<&str> {
        raw_text(&self.parsed_data)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewResume {
    pub filename: String,
    pub file_url: String,
    pub file_type: String,
    pub parsed_data: Value,
}

/// Which write failed, for user-facing wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeWrite {
    Create,
    Update,
}

pub fn raw_text(payload: &Value) -> Option<&str> {
    payload.get(RAW_TEXT_KEY).and_then(Value::as_str)
}

fn serialized_len(payload: &Value) -> usize {
    serde_json::to_string(payload)
        .map(|s| s.chars().count())
        .unwrap_or(0)
}

/// Apply the storage size cap. Payloads within `MAX_PAYLOAD_CHARS` are
/// returned untouched; larger ones keep the first `TRUNCATED_TEXT_CHARS` of
/// their raw text followed by `TRUNCATION_MARKER`.
///
/// An oversized payload whose raw text is missing, not a string, or already
/// within `TRUNCATED_TEXT_CHARS` is returned unchanged and unmarked, since
/// cutting the text would not shrink it. Only a warning is logged, and the
/// record store may still reject the write.
pub fn cap_payload(mut payload: Value) -> Value {
    let size = serialized_len(&payload);
    if size <= MAX_PAYLOAD_CHARS {
        return payload;
    }

    let Some(Value::String(text)) = payload.get_mut(RAW_TEXT_KEY) else {
        tracing::warn!(size, "Oversized resume payload has no raw text to truncate");
        return payload;
    };
    if text.chars().count() <= TRUNCATED_TEXT_CHARS {
        tracing::warn!(size, "Oversized resume payload is not caused by its raw text");
        return payload;
    }

    let mut truncated: String = text.chars().take(TRUNCATED_TEXT_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    *text = truncated;

    tracing::warn!(
        size,
        truncated_size = serialized_len(&payload),
        "Resume payload exceeds size limit, raw text truncated"
    );
    payload
}

/// Drop any query string (signed URL tokens) from a file reference.
pub fn strip_query(reference: &str) -> &str {
    reference.split('?').next().unwrap_or(reference)
}

/// The caller's most recent resume, if any.
pub async fn latest(
    store: &dyn RecordStore,
    cap: &Capability,
) -> Result<Option<ResumeRecord>, BackendError> {
    let result = store
        .select(
            cap,
            Table::Resumes,
            &owned(cap).order_desc("created_at").limit(1),
        )
        .await;

    match result {
        Ok(rows) => rows.into_iter().next().map(super::from_row).transpose(),
        Err(e) if e.status() == Some(406) => {
            tracing::warn!(error = %e, "Resume lookup was not acceptable to the server");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub async fn insert(
    store: &dyn RecordStore,
    cap: &Capability,
    mut resume: NewResume,
) -> Result<ResumeRecord, BackendError> {
    resume.parsed_data = cap_payload(resume.parsed_data);
    resume.file_url = strip_query(&resume.file_url).to_string();
    insert_owned(store, cap, Table::Resumes, &resume).await
}

/// Replace a resume's whole parsed payload.
pub async fn update_parsed_data(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
    parsed_data: Value,
) -> Result<ResumeRecord, BackendError> {
    let mut patch = Row::new();
    patch.insert("parsed_data".to_string(), cap_payload(parsed_data));
    patch.insert("updated_at".to_string(), now_value());
    update_owned(store, cap, Table::Resumes, id, patch).await
}

/// Human wording for the backend failures a resume write is known to hit.
pub fn write_error_message(err: &BackendError, write: ResumeWrite) -> String {
    if err.status() == Some(406) {
        return "Server could not accept the format of the data provided".to_string();
    }
    if err.is_permission_denied() {
        return match write {
            ResumeWrite::Create => "You do not have permission to save resume data",
            ResumeWrite::Update => "You do not have permission to update this resume",
        }
        .to_string();
    }
    match err.code() {
        Some(codes::UNIQUE_VIOLATION) => "A resume with this information already exists".into(),
        Some(codes::FOREIGN_KEY_VIOLATION) => {
            "Authentication issue. Please log out and log back in.".into()
        }
        Some(codes::INVALID_TEXT_REPRESENTATION) => {
            "Invalid data format. Please check your resume information.".into()
        }
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_payload_is_untouched() {
        let payload = json!({ "rawText": "Jane Doe\njane@x.com" });
        assert_eq!(cap_payload(payload.clone()), payload);
    }

    #[test]
    fn test_payload_at_limit_is_untouched() {
        // {"rawText":"..."} adds 14 characters around the text
        let text = "a".repeat(MAX_PAYLOAD_CHARS - 14);
        let payload = json!({ "rawText": text });
        assert_eq!(serialized_len(&payload), MAX_PAYLOAD_CHARS);
        assert_eq!(cap_payload(payload.clone()), payload);
    }

    #[test]
    fn test_oversized_payload_is_truncated() {
        let text = "b".repeat(MAX_PAYLOAD_CHARS + 1);
        let payload = json!({ "rawText": text, "name": "Jane" });
        let before = serialized_len(&payload);

        let capped = cap_payload(payload);
        let stored = raw_text(&capped).unwrap();
        assert_eq!(stored.len(), TRUNCATED_TEXT_CHARS + TRUNCATION_MARKER.len());
        assert!(stored.starts_with(&"b".repeat(TRUNCATED_TEXT_CHARS)));
        assert!(stored.ends_with(TRUNCATION_MARKER));
        assert_eq!(capped["name"], "Jane");
        assert!(serialized_len(&capped) < before);
    }

    #[test]
    fn test_oversized_payload_with_short_text_is_kept_unmarked() {
        let payload = json!({
            "rawText": "Jane Doe",
            "notes": "c".repeat(MAX_PAYLOAD_CHARS),
        });
        assert_eq!(cap_payload(payload.clone()), payload);

        let no_text = json!({ "notes": "c".repeat(MAX_PAYLOAD_CHARS) });
        assert_eq!(cap_payload(no_text.clone()), no_text);
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "é".repeat(MAX_PAYLOAD_CHARS);
        let capped = cap_payload(json!({ "rawText": text }));
        let stored = raw_text(&capped).unwrap();
        assert_eq!(
            stored.chars().count(),
            TRUNCATED_TEXT_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(
            strip_query("https://x.supabase.co/storage/v1/object/sign/resumes/u/f.pdf?token=abc"),
            "https://x.supabase.co/storage/v1/object/sign/resumes/u/f.pdf"
        );
        assert_eq!(strip_query("u/f.pdf"), "u/f.pdf");
    }

    #[test]
    fn test_write_error_messages() {
        let dup = BackendError::api(409, Some(codes::UNIQUE_VIOLATION), "duplicate key");
        assert_eq!(
            write_error_message(&dup, ResumeWrite::Create),
            "A resume with this information already exists"
        );

        let denied = BackendError::api(401, Some(codes::JWT_PERMISSION), "JWT expired");
        assert_eq!(
            write_error_message(&denied, ResumeWrite::Update),
            "You do not have permission to update this resume"
        );

        let fk = BackendError::api(409, Some(codes::FOREIGN_KEY_VIOLATION), "fk");
        assert_eq!(
            write_error_message(&fk, ResumeWrite::Create),
            "Authentication issue. Please log out and log back in."
        );

        let not_acceptable = BackendError::api(406, None, "Not Acceptable");
        assert_eq!(
            write_error_message(&not_acceptable, ResumeWrite::Create),
            "Server could not accept the format of the data provided"
        );

        let other = BackendError::api(500, Some("XX000"), "boom");
        assert_eq!(write_error_message(&other, ResumeWrite::Create), "boom");
    }
}
