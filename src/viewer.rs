//! Resolving and presenting the stored resume file.

use std::time::Duration;

use serde::Serialize;

use crate::access::Capability;
use crate::object_store::ObjectStore;
use crate::records::resumes::{strip_query, ResumeRecord};

pub const VIEW_URL_TTL: Duration = Duration::from_secs(3600);
pub const EXCERPT_CHARS: usize = 300;
pub const NO_TEXT: &str = "No text content available";

/// How the viewer shows a resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preview {
    /// Embedded document viewer
    Inline { url: String },
    Text { text: String },
    Download { url: String },
    /// No file reference; at most a short excerpt of the text
    Unavailable { excerpt: Option<String> },
}

/// Storage key for a stored reference: the query string goes, and of a
/// longer URL only the trailing `owner/file` pair is kept.
pub fn storage_path(reference: &str) -> String {
    let path = strip_query(reference);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() > 2 {
        segments[segments.len() - 2..].join("/")
    } else {
        path.to_string()
    }
}

/// A fresh signed URL for the record's file, or its stored reference when
/// signing fails. `None` when the record has no reference at all.
pub async fn resolve_source(
    files: &dyn ObjectStore,
    cap: &Capability,
    record: &ResumeRecord,
) -> Option<String> {
    let reference = record.file_url.as_deref().filter(|r| !r.is_empty())?;
    let path = storage_path(reference);

    match files.signed_url(cap, &path, VIEW_URL_TTL).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Could not sign resume file, using stored reference");
            Some(reference.to_string())
        }
    }
}

pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub fn preview(record: &ResumeRecord, source: Option<&str>) -> Preview {
    let Some(url) = source.filter(|s| !s.is_empty()) else {
        return Preview::Unavailable {
            excerpt: record.raw_text().filter(|t| !t.is_empty()).map(excerpt),
        };
    };

    match record.file_type.as_str() {
        "application/pdf" => Preview::Inline {
            url: url.to_string(),
        },
        "text/plain" => Preview::Text {
            text: record
                .raw_text()
                .filter(|t| !t.is_empty())
                .unwrap_or(NO_TEXT)
                .to_string(),
        },
        _ => Preview::Download {
            url: url.to_string(),
        },
    }
}

pub async fn load(files: &dyn ObjectStore, cap: &Capability, record: &ResumeRecord) -> Preview {
    let source = resolve_source(files, cap, record).await;
    preview(record, source.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(file_type: &str, file_url: Option<&str>, raw_text: &str) -> ResumeRecord {
        ResumeRecord {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: "u1".to_string(),
            filename: "u1-abc".to_string(),
            file_url: file_url.map(str::to_string),
            file_type: file_type.to_string(),
            parsed_data: json!({ "rawText": raw_text }),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_storage_path() {
        assert_eq!(
            storage_path("https://x.supabase.co/storage/v1/object/sign/resumes/u1/u1-abc.pdf?token=t"),
            "u1/u1-abc.pdf"
        );
        assert_eq!(storage_path("u1/u1-abc.pdf"), "u1/u1-abc.pdf");
        assert_eq!(storage_path("u1-abc.pdf?x=1"), "u1-abc.pdf");
    }

    #[test]
    fn test_preview_by_type() {
        let pdf = record("application/pdf", Some("u1/a.pdf"), "Jane");
        assert_eq!(
            preview(&pdf, Some("http://signed")),
            Preview::Inline {
                url: "http://signed".to_string()
            }
        );

        let txt = record("text/plain", Some("u1/a.txt"), "");
        assert_eq!(
            preview(&txt, Some("http://signed")),
            Preview::Text {
                text: NO_TEXT.to_string()
            }
        );

        let doc = record("application/msword", Some("u1/a.doc"), "Jane");
        assert!(matches!(preview(&doc, Some("http://signed")), Preview::Download { .. }));
    }

    #[test]
    fn test_unavailable_shows_excerpt() {
        let long = "x".repeat(EXCERPT_CHARS + 1);
        let rec = record("application/pdf", None, &long);
        let Preview::Unavailable { excerpt: Some(text) } = preview(&rec, None) else {
            panic!("expected an excerpt");
        };
        assert_eq!(text.len(), EXCERPT_CHARS + 3);
        assert!(text.ends_with("..."));

        let short = record("application/pdf", Some(""), "Jane");
        assert_eq!(
            preview(&short, None),
            Preview::Unavailable {
                excerpt: Some("Jane".to_string())
            }
        );
    }
}
