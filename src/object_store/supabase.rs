use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;

use super::{ObjectStore, ObjectStoreError};
use crate::access::Capability;
use crate::backend::SupabaseClient;

/// Supabase Storage bucket. Requests carry the user's access token so the
/// bucket's folder policies apply.
pub struct SupabaseStore {
    bucket: String,
    client: Arc<SupabaseClient>,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseStore {
    pub fn new(client: Arc<SupabaseClient>, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            client,
        }
    }

    fn object_path(&self, key: &str) -> String {
        format!("/storage/v1/object/{}/{key}", self.bucket)
    }

    fn authenticated_path(&self, key: &str) -> String {
        format!("/storage/v1/object/authenticated/{}/{key}", self.bucket)
    }

    fn sign_path(&self, key: &str) -> String {
        format!("/storage/v1/object/sign/{}/{key}", self.bucket)
    }

    async fn failure(resp: reqwest::Response, key: &str, action: &str) -> ObjectStoreError {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return ObjectStoreError::NotFound(key.to_string());
        }
        let err = SupabaseClient::error_from(resp).await;
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return ObjectStoreError::Forbidden(err.to_string());
        }
        ObjectStoreError::Backend(format!("Storage {action} failed ({status}): {err}"))
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(
        &self,
        cap: &Capability,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let resp = self
            .client
            .request(Method::POST, &self.object_path(key), Some(cap.access_token()))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::failure(resp, key, "upload").await);
        }
        Ok(())
    }

    async fn get(&self, cap: &Capability, key: &str) -> Result<Bytes, ObjectStoreError> {
        let resp = self
            .client
            .request(
                Method::GET,
                &self.authenticated_path(key),
                Some(cap.access_token()),
            )
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::failure(resp, key, "download").await);
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, cap: &Capability, key: &str) -> Result<(), ObjectStoreError> {
        let resp = self
            .client
            .request(Method::DELETE, &self.object_path(key), Some(cap.access_token()))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Self::failure(resp, key, "delete").await);
        }
        Ok(())
    }

    async fn exists(&self, cap: &Capability, key: &str) -> Result<bool, ObjectStoreError> {
        let resp = self
            .client
            .request(
                Method::HEAD,
                &self.authenticated_path(key),
                Some(cap.access_token()),
            )
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(resp.status().is_success())
    }

    async fn signed_url(
        &self,
        cap: &Capability,
        key: &str,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        let resp = self
            .client
            .request(Method::POST, &self.sign_path(key), Some(cap.access_token()))
            .json(&serde_json::json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::failure(resp, key, "sign").await);
        }

        let signed: SignResponse = resp
            .json()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // The API answers with a path relative to /storage/v1.
        Ok(self
            .client
            .endpoint(&format!("/storage/v1{}", signed.signed_url)))
    }
}
