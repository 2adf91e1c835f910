//! Resume ingestion: extract text, upload the file, record the result.

pub mod extract;
mod pipeline;

pub use pipeline::{storage_key, IngestPipeline, SIGNED_URL_TTL};

use bytes::Bytes;
use thiserror::Error;

use crate::backend::BackendError;
use crate::object_store::ObjectStoreError;

/// A file as received from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// MIME type; empty when the client sent none
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// The declared type, or one guessed from the file name.
    pub fn mime_type(&self) -> String {
        if !self.content_type.is_empty() && self.content_type != "application/octet-stream" {
            return self.content_type.clone();
        }
        mime_guess::from_path(&self.name)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// Failure of one ingestion step. Each variant renders with the step's prefix.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Please select a file to upload")]
    MissingFile,
    #[error("You must be logged in to upload a resume. Please refresh and try again.")]
    Unauthenticated,
    #[error("A resume upload is already in progress")]
    InProgress,
    #[error("Failed to parse resume: {0}")]
    Parse(String),
    #[error("Failed to upload file: {0}")]
    Upload(#[source] ObjectStoreError),
    #[error("Failed to save resume data: {message}")]
    Save {
        message: String,
        #[source]
        source: BackendError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_falls_back_to_file_name() {
        let declared = UploadedFile::new("cv.bin", "application/pdf", &b"x"[..]);
        assert_eq!(declared.mime_type(), "application/pdf");

        let guessed = UploadedFile::new("resume.txt", "", &b"x"[..]);
        assert_eq!(guessed.mime_type(), "text/plain");

        let unknown = UploadedFile::new("resume", "application/octet-stream", &b"x"[..]);
        assert_eq!(unknown.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_errors_carry_step_prefix() {
        let err = IngestError::Parse("bad xref table".to_string());
        assert_eq!(err.to_string(), "Failed to parse resume: bad xref table");

        let err = IngestError::Upload(ObjectStoreError::Forbidden("u2/x.pdf".to_string()));
        assert!(err.to_string().starts_with("Failed to upload file: "));
    }
}
