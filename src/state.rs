use std::sync::Arc;
use std::time::Instant;

use crate::archive::{ArchiveClient, FdsnArchiveClient};
use crate::config::{ObjectStoreBackend, ServerConfig};
use crate::day_index::DayIndexStore;
use crate::edge::EdgeCoordinator;
use crate::object_store::{LocalObjectStore, ObjectStore, S3ObjectStore};
use crate::origin::OriginRegistry;

/// Main server state shared across all handlers.
pub struct ServerState {
    pub config: ServerConfig,
    pub edge: Arc<EdgeCoordinator>,
    pub origin: Arc<OriginRegistry>,
    pub day_index: Arc<DayIndexStore>,
    pub start_time: Instant,
}

impl ServerState {
    pub async fn new(config: ServerConfig) -> Self {
        let object_store: Arc<dyn ObjectStore> = match &config.object_store {
            ObjectStoreBackend::Local { base_dir } => Arc::new(LocalObjectStore::new(base_dir.clone())),
            ObjectStoreBackend::S3 { bucket, endpoint_url } => Arc::new(
                S3ObjectStore::from_env(bucket.clone(), endpoint_url.as_deref()).await,
            ),
        };

        let day_index = Arc::new(DayIndexStore::new(Arc::clone(&object_store)));

        let archive: Arc<dyn ArchiveClient> = Arc::new(FdsnArchiveClient::new(
            config.archive_base_url.clone(),
            config.max_fetch_seconds,
        ));

        let origin = Arc::new(OriginRegistry::new(
            Arc::clone(&object_store),
            Arc::clone(&day_index),
            archive,
            config.max_concurrent_archive_fetches,
            config.presigned_url_ttl_seconds,
            config.default_highpass_corner_hz,
        ));

        let edge = Arc::new(EdgeCoordinator::new(
            Arc::clone(&object_store),
            Arc::clone(&day_index),
            Arc::clone(&origin),
            config.max_request_duration_seconds,
        ));

        Self {
            config,
            edge,
            origin,
            day_index,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
