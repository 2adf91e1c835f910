mod local;
mod supabase;

pub use local::LocalStore;
pub use supabase::SupabaseStore;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::access::Capability;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over the bucket that holds uploaded resumes.
/// Keys are `{owner_id}/{file_name}`; the caller's capability must own the prefix.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        cap: &Capability,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;
    async fn get(&self, cap: &Capability, key: &str) -> Result<Bytes, ObjectStoreError>;
    async fn delete(&self, cap: &Capability, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, cap: &Capability, key: &str) -> Result<bool, ObjectStoreError>;
    /// Time-limited URL granting read access to `key` without a session.
    async fn signed_url(
        &self,
        cap: &Capability,
        key: &str,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError>;
}
