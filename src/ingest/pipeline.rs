use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::extract::extract_text;
use super::{IngestError, UploadedFile};
use crate::access::Capability;
use crate::object_store::ObjectStore;
use crate::records::resumes::{self, NewResume, ResumeRecord, ResumeWrite, RAW_TEXT_KEY};
use crate::storage::RecordStore;

/// Lifetime of the signed URL resolved right after upload.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// `{owner}/{owner}-{random}.{ext}`, with `ext` taken from after the last
/// `.` of the original name and reduced to ASCII alphanumerics.
pub fn storage_key(owner_id: &str, original_name: &str) -> (String, String) {
    let ext: String = original_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };

    let random = uuid::Uuid::new_v4().simple().to_string();
    let file_name = format!("{owner_id}-{}.{ext}", &random[..12]);
    (format!("{owner_id}/{file_name}"), file_name)
}

/// Clears the in-flight flag when an ingestion ends, however it ends.
struct Busy<'a>(&'a AtomicBool);

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Parse, upload, resolve, persist. Only one ingestion runs at a time.
pub struct IngestPipeline {
    files: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    in_flight: AtomicBool,
}

impl IngestPipeline {
    pub fn new(files: Arc<dyn ObjectStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            files,
            records,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn ingest(
        &self,
        file: UploadedFile,
        cap: Option<&Capability>,
    ) -> Result<ResumeRecord, IngestError> {
        if file.data.is_empty() {
            return Err(IngestError::MissingFile);
        }
        let cap = cap.ok_or(IngestError::Unauthenticated)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IngestError::InProgress);
        }
        let _busy = Busy(&self.in_flight);

        let mime_type = file.mime_type();
        tracing::debug!(
            file_name = %file.name,
            mime_type = %mime_type,
            size = file.data.len(),
            "Ingesting resume"
        );

        let raw_text = extract_text(&mime_type, file.data.clone())
            .await
            .map_err(IngestError::Parse)?;

        let (key, file_name) = storage_key(cap.owner_id(), &file.name);
        self.files
            .put(cap, &key, file.data, &mime_type)
            .await
            .map_err(IngestError::Upload)?;

        let reference = match self.files.signed_url(cap, &key, SIGNED_URL_TTL).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Could not sign uploaded file, storing its path");
                key.clone()
            }
        };

        let mut parsed_data = serde_json::Map::new();
        parsed_data.insert(RAW_TEXT_KEY.to_string(), raw_text.into());

        let new = NewResume {
            filename: file_name,
            file_url: reference,
            file_type: mime_type,
            parsed_data: parsed_data.into(),
        };

        // A failed insert leaves the uploaded object behind.
        let record = resumes::insert(self.records.as_ref(), cap, new)
            .await
            .map_err(|source| IngestError::Save {
                message: resumes::write_error_message(&source, ResumeWrite::Create),
                source,
            })?;

        tracing::info!(resume_id = %record.id, key = %key, "Resume ingested");
        Ok(record)
    }
}
