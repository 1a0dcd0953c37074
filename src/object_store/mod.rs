//! Object Store Adapter (C1, §4.1).
//!
//! Two backends implement [`ObjectStore`]: [`s3::S3ObjectStore`] for
//! production use against any S3-API-compatible provider, and
//! [`local::LocalObjectStore`] for tests and offline/single-node
//! deployments.

mod local;
mod s3;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;

/// Result type for object store operations.
pub type StorageResult<T> = Result<T, ObjectStoreError>;

/// Errors surfaced by the object store adapter (§4.1, §7).
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("transient object store error: {0}")]
    Transient(String),

    #[error("permanent object store error: {0}")]
    Permanent(String),
}

/// Metadata returned by [`ObjectStore::head`].
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size: u64,
    pub etag: String,
    pub modified: chrono::DateTime<chrono::Utc>,
}

/// Put/get/head/list/presign over immutable blobs and small JSON objects,
/// addressed by path (§4.1). All operations are idempotent; the adapter
/// does not interpret payloads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` to `path`. When `immutable` is true the backend may
    /// assume the path is never overwritten again (I5) and skip
    /// compare-and-swap bookkeeping; when false (day index writes) callers
    /// pass `if_match` to request a conditional put (I4).
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        immutable: bool,
        if_match: Option<&str>,
    ) -> StorageResult<String>;

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>>;

    async fn head(&self, path: &str) -> StorageResult<ObjectHead>;

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// A short-TTL presigned GET URL for `path`.
    async fn presign_get(&self, path: &str, ttl_seconds: u64) -> StorageResult<String>;
}

/// Retry a transient-prone object store call with bounded exponential
/// backoff (§4.1 "Transient ... retry with exponential backoff, bounded to
/// a small number of attempts").
pub async fn with_retry<T, F, Fut>(mut attempt: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = StorageResult<T>>,
{
    const MAX_ATTEMPTS: u32 = 4;
    let mut delay_ms = 50u64;
    let mut last_err = None;
    for attempt_no in 0..MAX_ATTEMPTS {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(ObjectStoreError::Transient(msg)) => {
                last_err = Some(ObjectStoreError::Transient(msg));
                if attempt_no + 1 < MAX_ATTEMPTS {
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err.unwrap_or_else(|| ObjectStoreError::Transient("retries exhausted".into())))
}
