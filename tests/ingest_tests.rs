use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use resume_desk::access::Capability;
use resume_desk::auth::{Session, User};
use resume_desk::ingest::{IngestError, IngestPipeline, UploadedFile};
use resume_desk::object_store::{LocalStore, ObjectStore, ObjectStoreError};
use resume_desk::records::resumes::{self, NewResume, ResumeRecord};
use resume_desk::storage::{Database, LocalRecords, RecordStore};
use resume_desk::viewer::{self, Preview};
use serde_json::json;

const PUBLIC_URL: &str = "http://127.0.0.1:5173";

struct Harness {
    dir: tempfile::TempDir,
    files: Arc<LocalStore>,
    records: Arc<dyn RecordStore>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let files = Arc::new(
        LocalStore::new(dir.path().join("files"), "resumes", PUBLIC_URL, b"secret").unwrap(),
    );
    Harness {
        dir,
        files,
        records: Arc::new(LocalRecords::new(db)),
    }
}

fn owner() -> Capability {
    Capability::for_session(&Session {
        access_token: "token".to_string(),
        refresh_token: None,
        expires_at: None,
        user: User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some("jane@x.com".to_string()),
            last_sign_in_at: None,
        },
    })
}

/// Delegates to the local store but can refuse uploads or signing.
struct Flaky {
    inner: Arc<LocalStore>,
    fail_put: bool,
    fail_sign: bool,
}

#[async_trait]
impl ObjectStore for Flaky {
    async fn put(
        &self,
        cap: &Capability,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        if self.fail_put {
            return Err(ObjectStoreError::Backend("bucket is full".to_string()));
        }
        self.inner.put(cap, key, data, content_type).await
    }

    async fn get(&self, cap: &Capability, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get(cap, key).await
    }

    async fn delete(&self, cap: &Capability, key: &str) -> Result<(), ObjectStoreError> {
        self.inner.delete(cap, key).await
    }

    async fn exists(&self, cap: &Capability, key: &str) -> Result<bool, ObjectStoreError> {
        self.inner.exists(cap, key).await
    }

    async fn signed_url(
        &self,
        cap: &Capability,
        key: &str,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        if self.fail_sign {
            return Err(ObjectStoreError::Backend("signing unavailable".to_string()));
        }
        self.inner.signed_url(cap, key, ttl).await
    }
}

#[tokio::test]
async fn test_text_resume_is_stored_and_recorded() {
    let h = harness();
    let pipeline = IngestPipeline::new(h.files.clone(), h.records.clone());
    let cap = owner();

    let file = UploadedFile::new("resume.txt", "text/plain", "Jane Doe\njane@x.com");
    let record = pipeline.ingest(file, Some(&cap)).await.unwrap();

    assert_eq!(record.parsed_data, json!({ "rawText": "Jane Doe\njane@x.com" }));
    assert_eq!(record.file_type, "text/plain");
    assert!(record.filename.starts_with(&format!("{}-", cap.owner_id())));
    assert!(record.filename.ends_with(".txt"));

    // The stored reference is the signed URL without its token
    let key = format!("{}/{}", cap.owner_id(), record.filename);
    assert_eq!(
        record.file_url.as_deref(),
        Some(format!("{PUBLIC_URL}/storage/resumes/{key}").as_str())
    );
    assert_eq!(
        h.files.get(&cap, &key).await.unwrap(),
        Bytes::from("Jane Doe\njane@x.com")
    );

    let latest = resumes::latest(h.records.as_ref(), &cap).await.unwrap().unwrap();
    assert_eq!(latest.id, record.id);
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_missing_file_is_rejected_first() {
    let h = harness();
    let pipeline = IngestPipeline::new(h.files.clone(), h.records.clone());

    let empty = UploadedFile::new("resume.txt", "text/plain", Bytes::new());
    let err = pipeline.ingest(empty, None).await.unwrap_err();
    assert!(matches!(err, IngestError::MissingFile));
    assert_eq!(err.to_string(), "Please select a file to upload");
}

#[tokio::test]
async fn test_unauthenticated_upload_writes_nothing() {
    let h = harness();
    let pipeline = IngestPipeline::new(h.files.clone(), h.records.clone());
    let cap = owner();

    let file = UploadedFile::new("resume.txt", "text/plain", "Jane Doe");
    let err = pipeline.ingest(file, None).await.unwrap_err();
    assert!(matches!(err, IngestError::Unauthenticated));

    assert!(resumes::latest(h.records.as_ref(), &cap).await.unwrap().is_none());
    assert!(!h.dir.path().join("files").join("resumes").join(cap.owner_id()).exists());
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_upload_failure_saves_no_record() {
    let h = harness();
    let files = Arc::new(Flaky {
        inner: h.files.clone(),
        fail_put: true,
        fail_sign: false,
    });
    let pipeline = IngestPipeline::new(files, h.records.clone());
    let cap = owner();

    let file = UploadedFile::new("resume.txt", "text/plain", "Jane Doe");
    let err = pipeline.ingest(file, Some(&cap)).await.unwrap_err();
    assert!(matches!(err, IngestError::Upload(_)));
    assert!(err.to_string().starts_with("Failed to upload file: "));

    assert!(resumes::latest(h.records.as_ref(), &cap).await.unwrap().is_none());
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_unsigned_upload_falls_back_to_storage_path() {
    let h = harness();
    let files = Arc::new(Flaky {
        inner: h.files.clone(),
        fail_put: false,
        fail_sign: true,
    });
    let pipeline = IngestPipeline::new(files, h.records.clone());
    let cap = owner();

    let file = UploadedFile::new("cv.md", "", "# Jane Doe");
    let record = pipeline.ingest(file, Some(&cap)).await.unwrap();

    assert_eq!(
        record.file_url.as_deref(),
        Some(format!("{}/{}", cap.owner_id(), record.filename).as_str())
    );
    assert_eq!(record.parsed_data["rawText"], "# Jane Doe");
}

#[tokio::test]
async fn test_unparseable_pdf_reports_parse_failure() {
    let h = harness();
    let pipeline = IngestPipeline::new(h.files.clone(), h.records.clone());
    let cap = owner();

    let file = UploadedFile::new("cv.pdf", "application/pdf", "definitely not a pdf");
    let err = pipeline.ingest(file, Some(&cap)).await.unwrap_err();
    assert!(matches!(err, IngestError::Parse(_)));
    assert!(err.to_string().starts_with("Failed to parse resume: "));

    assert!(resumes::latest(h.records.as_ref(), &cap).await.unwrap().is_none());
}

/// Stores a file and a record pointing at it through a stale signed URL.
async fn stored_resume(h: &Harness, cap: &Capability, file_type: &str, ext: &str) -> ResumeRecord {
    let filename = format!("{}-abc.{ext}", cap.owner_id());
    let key = format!("{}/{filename}", cap.owner_id());
    h.files
        .put(cap, &key, Bytes::from("%PDF-1.4"), file_type)
        .await
        .unwrap();

    let new = NewResume {
        filename,
        file_url: format!("{PUBLIC_URL}/storage/resumes/{key}?expires=1&token=stale"),
        file_type: file_type.to_string(),
        parsed_data: json!({ "rawText": "Jane Doe" }),
    };
    resumes::insert(h.records.as_ref(), cap, new).await.unwrap()
}

fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
    url.split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default()
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
        .unwrap()
}

#[tokio::test]
async fn test_viewer_signs_a_fresh_url() {
    let h = harness();
    let cap = owner();
    let record = stored_resume(&h, &cap, "application/pdf", "pdf").await;
    let key = format!("{}/{}", cap.owner_id(), record.filename);
    assert_eq!(
        record.file_url.as_deref(),
        Some(format!("{PUBLIC_URL}/storage/resumes/{key}").as_str())
    );

    let Preview::Inline { url } = viewer::load(h.files.as_ref(), &cap, &record).await else {
        panic!("pdf resumes are shown inline");
    };
    assert!(url.starts_with(&format!("{PUBLIC_URL}/storage/resumes/{key}?expires=")));

    let expires: i64 = query_param(&url, "expires").parse().unwrap();
    let body = h
        .files
        .open_signed(&key, expires, query_param(&url, "token"))
        .await
        .unwrap();
    assert_eq!(body, Bytes::from("%PDF-1.4"));
}

#[tokio::test]
async fn test_viewer_falls_back_to_stored_reference() {
    let h = harness();
    let cap = owner();
    let files = Flaky {
        inner: h.files.clone(),
        fail_put: false,
        fail_sign: true,
    };

    let pdf = stored_resume(&h, &cap, "application/pdf", "pdf").await;
    let stored = pdf.file_url.clone().unwrap();
    assert_eq!(
        viewer::load(&files, &cap, &pdf).await,
        Preview::Inline { url: stored }
    );

    let docx = stored_resume(
        &h,
        &cap,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    )
    .await;
    let stored = docx.file_url.clone().unwrap();
    assert_eq!(
        viewer::resolve_source(&files, &cap, &docx).await.as_deref(),
        Some(stored.as_str())
    );
    assert_eq!(
        viewer::load(&files, &cap, &docx).await,
        Preview::Download { url: stored }
    );
}

#[tokio::test]
async fn test_viewer_without_reference_shows_excerpt() {
    let h = harness();
    let cap = owner();
    let mut record = stored_resume(&h, &cap, "application/pdf", "pdf").await;
    record.file_url = None;

    assert_eq!(viewer::resolve_source(h.files.as_ref(), &cap, &record).await, None);
    assert_eq!(
        viewer::load(h.files.as_ref(), &cap, &record).await,
        Preview::Unavailable {
            excerpt: Some("Jane Doe".to_string())
        }
    );
}
