//! Filesystem-backed [`ObjectStore`], used for tests and offline/
//! single-node deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ObjectHead, ObjectStore, ObjectStoreError, StorageResult};

/// A local-filesystem object store rooted at `base_dir`. Conditional puts
/// are serialized per-path with an in-process mutex map since there is no
/// native compare-and-swap on a plain file.
pub struct LocalObjectStore {
    base_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalObjectStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }

    fn etag_of(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        hex::encode(&digest[..16])
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        immutable: bool,
        if_match: Option<&str>,
    ) -> StorageResult<String> {
        let full = self.full_path(path);

        let _guard = self.write_lock.lock().await;

        if immutable {
            if tokio::fs::metadata(&full).await.is_ok() {
                return Err(ObjectStoreError::Permanent(format!(
                    "immutable object already exists: {path}"
                )));
            }
        } else if let Some(expected) = if_match {
            match tokio::fs::read(&full).await {
                Ok(existing) => {
                    if Self::etag_of(&existing) != expected {
                        return Err(ObjectStoreError::Permanent(format!(
                            "etag mismatch for {path}"
                        )));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ObjectStoreError::Permanent(format!(
                        "if_match given but {path} does not exist"
                    )));
                }
                Err(e) => return Err(transient_io(e)),
            }
        }

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(transient_io)?;
        }

        let etag = Self::etag_of(&bytes);
        tokio::fs::write(&full, &bytes).await.map_err(transient_io)?;
        debug!(path, etag, "wrote object to local store");
        Ok(etag)
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full = self.full_path(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(transient_io(e)),
        }
    }

    async fn head(&self, path: &str) -> StorageResult<ObjectHead> {
        let full = self.full_path(path);
        let meta = match tokio::fs::metadata(&full).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(path.to_string()))
            }
            Err(e) => return Err(transient_io(e)),
        };
        let bytes = tokio::fs::read(&full).await.map_err(transient_io)?;
        let modified: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(ObjectHead {
            size: meta.len(),
            etag: Self::etag_of(&bytes),
            modified,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let root = self.full_path(prefix);
        let mut out = Vec::new();
        if let Err(e) = walk(&root, &self.base_dir, &mut out).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(transient_io(e));
            }
        }
        out.sort();
        Ok(out)
    }

    async fn presign_get(&self, path: &str, ttl_seconds: u64) -> StorageResult<String> {
        let expires = Utc::now() + chrono::Duration::seconds(ttl_seconds as i64);
        Ok(format!(
            "file://{}?expires={}",
            self.full_path(path).display(),
            expires.timestamp()
        ))
    }
}

fn transient_io(e: std::io::Error) -> ObjectStoreError {
    ObjectStoreError::Transient(e.to_string())
}

fn walk<'a>(
    dir: &'a Path,
    base: &'a Path,
    out: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, base, out).await?;
            } else {
                let rel = path.strip_prefix(base).unwrap_or(&path);
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store
            .put("a/b.bin", vec![1, 2, 3], "application/octet-stream", true, None)
            .await
            .unwrap();
        let got = store.get("a/b.bin").await.unwrap();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn immutable_put_rejects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store
            .put("chunk.bin", vec![1], "application/octet-stream", true, None)
            .await
            .unwrap();
        let err = store
            .put("chunk.bin", vec![2], "application/octet-stream", true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::Permanent(_)));
    }

    #[tokio::test]
    async fn conditional_put_rejects_stale_etag() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let etag = store
            .put("day.json", b"{}".to_vec(), "application/json", false, None)
            .await
            .unwrap();

        // stale write loses the race
        let err = store
            .put("day.json", b"{\"a\":1}".to_vec(), "application/json", false, Some("stale"))
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::Permanent(_)));

        // correct etag succeeds
        store
            .put("day.json", b"{\"a\":1}".to_vec(), "application/json", false, Some(&etag))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_returns_nested_paths_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store
            .put("data/2025/10/b.bin", vec![1], "application/octet-stream", true, None)
            .await
            .unwrap();
        store
            .put("data/2025/10/a.bin", vec![1], "application/octet-stream", true, None)
            .await
            .unwrap();
        let listed = store.list("data/2025/10").await.unwrap();
        assert_eq!(listed, vec!["data/2025/10/a.bin", "data/2025/10/b.bin"]);
    }
}
