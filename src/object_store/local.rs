use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use ring::hmac;

use super::{ObjectStore, ObjectStoreError};
use crate::access::Capability;

/// Local filesystem object store for development and testing.
///
/// Signed URLs point back at this process (`/storage/{bucket}/{key}`) and
/// carry an expiry plus an HMAC-SHA256 over bucket, key and expiry.
pub struct LocalStore {
    base_path: PathBuf,
    bucket: String,
    public_url: String,
    signing_key: hmac::Key,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        bucket: &str,
        public_url: &str,
        secret: &[u8],
    ) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().join(bucket);
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            signing_key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        })
    }

    /// Per-process signing secret, used when none is configured.
    pub fn random_secret() -> Vec<u8> {
        [
            *uuid::Uuid::new_v4().as_bytes(),
            *uuid::Uuid::new_v4().as_bytes(),
        ]
        .concat()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }

    fn authorize(cap: &Capability, key: &str) -> Result<(), ObjectStoreError> {
        if cap.owns_key(key) {
            Ok(())
        } else {
            Err(ObjectStoreError::Forbidden(format!(
                "{key} is outside the caller's folder"
            )))
        }
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let message = format!("{}/{key}:{expires}", self.bucket);
        let tag = hmac::sign(&self.signing_key, message.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag.as_ref())
    }

    /// Read an object through a signed URL's `expires` and `token` parameters.
    pub async fn open_signed(
        &self,
        key: &str,
        expires: i64,
        token: &str,
    ) -> Result<Bytes, ObjectStoreError> {
        if expires <= chrono::Utc::now().timestamp() {
            return Err(ObjectStoreError::Forbidden("signed URL expired".to_string()));
        }

        let tag = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ObjectStoreError::Forbidden("malformed signature".to_string()))?;
        let message = format!("{}/{key}:{expires}", self.bucket);
        hmac::verify(&self.signing_key, message.as_bytes(), &tag)
            .map_err(|_| ObjectStoreError::Forbidden("invalid signature".to_string()))?;

        self.read(key).await
    }

    async fn read(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key)?;
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        cap: &Capability,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        Self::authorize(cap, key)?;
        let path = self.object_path(key)?;
        if path.exists() {
            return Err(ObjectStoreError::Backend(format!(
                "The resource already exists: {key}"
            )));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn get(&self, cap: &Capability, key: &str) -> Result<Bytes, ObjectStoreError> {
        Self::authorize(cap, key)?;
        self.read(key).await
    }

    async fn delete(&self, cap: &Capability, key: &str) -> Result<(), ObjectStoreError> {
        Self::authorize(cap, key)?;
        let path = self.object_path(key)?;
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, cap: &Capability, key: &str) -> Result<bool, ObjectStoreError> {
        Self::authorize(cap, key)?;
        let path = self.object_path(key)?;
        Ok(path.exists())
    }

    async fn signed_url(
        &self,
        cap: &Capability,
        key: &str,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        Self::authorize(cap, key)?;
        if !self.object_path(key)?.exists() {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!(
            "{}/storage/{}/{key}?expires={expires}&token={}",
            self.public_url,
            self.bucket,
            self.signature(key, expires)
        ))
    }
}
