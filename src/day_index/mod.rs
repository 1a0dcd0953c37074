//! Day Metadata Store (C5, §4.5): read/merge/write of [`DayIndex`] records
//! with single-writer-per-day enforcement (I4) via object store etags.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::archive::StationMetadata;
use crate::model::{ChunkMeta, DayIndex, Gap, StationId, Tier};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage_path::day_index_path;

#[derive(Debug, thiserror::Error)]
pub enum DayIndexError {
    #[error("object store error: {0}")]
    Store(#[from] ObjectStoreError),

    #[error("day index write lost the compare-and-swap race after {0} attempts")]
    Conflict(u32),
}

const MAX_MERGE_ATTEMPTS: u32 = 5;

/// Reads, merges, and conditionally rewrites day index records, retrying on
/// etag conflicts so concurrent writers for the *same* day never clobber
/// each other's chunks (I4).
pub struct DayIndexStore {
    store: Arc<dyn ObjectStore>,
}

impl DayIndexStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Load the index for `(sid, day)`, or `None` if nothing has been
    /// written yet.
    pub async fn load(
        &self,
        sid: &StationId,
        day: &crate::model::Day,
        grouping: Option<&str>,
    ) -> Result<Option<DayIndex>, DayIndexError> {
        let path = day_index_path(sid, day, grouping);
        match self.store.get(&path).await {
            Ok(bytes) => {
                let idx: DayIndex = serde_json::from_slice(&bytes).map_err(|e| {
                    DayIndexError::Store(ObjectStoreError::Permanent(format!(
                        "corrupt day index at {path}: {e}"
                    )))
                })?;
                Ok(Some(idx))
            }
            Err(ObjectStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge `new_chunks`/`new_gaps` into the stored index (creating it if
    /// absent) and write the result back with an `if_match` conditional put.
    /// On an etag conflict (another writer committed in between), reload
    /// and retry the merge up to [`MAX_MERGE_ATTEMPTS`] times. `station_metadata`
    /// fields, when present, overwrite the index's own (discovery may
    /// succeed on a later call after failing on an earlier one).
    pub async fn merge_and_write(
        &self,
        sid: &StationId,
        day: &crate::model::Day,
        sample_rate: f64,
        new_chunks: HashMap<Tier, Vec<ChunkMeta>>,
        new_gaps: Vec<Gap>,
        station_metadata: Option<&StationMetadata>,
        grouping: Option<&str>,
    ) -> Result<DayIndex, DayIndexError> {
        let path = day_index_path(sid, day, grouping);

        for attempt in 0..MAX_MERGE_ATTEMPTS {
            let (mut idx, if_match) = match self.store.get(&path).await {
                Ok(bytes) => {
                    let idx: DayIndex = serde_json::from_slice(&bytes).map_err(|e| {
                        DayIndexError::Store(ObjectStoreError::Permanent(format!(
                            "corrupt day index at {path}: {e}"
                        )))
                    })?;
                    let head = self.store.head(&path).await?;
                    (idx, Some(head.etag))
                }
                Err(ObjectStoreError::NotFound(_)) => {
                    let now = Utc::now();
                    let idx = DayIndex::new_empty(
                        day.as_str(),
                        sid.network.clone(),
                        sid.station.clone(),
                        sid.location.clone(),
                        sid.channel.clone(),
                        sample_rate,
                        now,
                    );
                    (idx, None)
                }
                Err(e) => return Err(e.into()),
            };

            idx.merge(new_chunks.clone(), new_gaps.clone(), Utc::now());
            if let Some(meta) = station_metadata {
                if meta.latitude.is_some() {
                    idx.latitude = meta.latitude;
                }
                if meta.longitude.is_some() {
                    idx.longitude = meta.longitude;
                }
                if meta.elevation_m.is_some() {
                    idx.elevation_m = meta.elevation_m;
                }
                if meta.instrument_type.is_some() {
                    idx.instrument_type = meta.instrument_type.clone();
                }
            }
            let body = serde_json::to_vec_pretty(&idx).expect("DayIndex always serializes");

            match self
                .store
                .put(&path, body, "application/json", false, if_match.as_deref())
                .await
            {
                Ok(_) => return Ok(idx),
                Err(ObjectStoreError::Permanent(msg)) => {
                    warn!(path, attempt, msg, "day index write lost compare-and-swap, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DayIndexError::Conflict(MAX_MERGE_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkStats, Day, StationId};
    use crate::object_store::LocalObjectStore;

    fn sid() -> StationId {
        StationId::new("HV", "NPOC", "01", "HHZ")
    }

    fn chunk(start: &str, end: &str) -> ChunkMeta {
        ChunkMeta {
            start: start.to_string(),
            end: end.to_string(),
            stats: ChunkStats {
                min: 0,
                max: 0,
                samples: 0,
                gap_count: 0,
                gap_duration_seconds: 0.0,
                gap_samples_filled: 0,
            },
            partial: false,
        }
    }

    #[tokio::test]
    async fn merge_and_write_creates_then_merges_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        let day_store = DayIndexStore::new(object_store);
        let day = Day::parse("2025-10-24").unwrap();

        let mut first = HashMap::new();
        first.insert(Tier::TenMin, vec![chunk("00:00:00", "00:10:00")]);
        let idx = day_store
            .merge_and_write(&sid(), &day, 100.0, first, vec![], None, None)
            .await
            .unwrap();
        assert_eq!(idx.chunks.ten_min.len(), 1);

        let mut second = HashMap::new();
        second.insert(Tier::TenMin, vec![chunk("00:10:00", "00:20:00")]);
        let idx = day_store
            .merge_and_write(&sid(), &day, 100.0, second, vec![], None, None)
            .await
            .unwrap();
        assert_eq!(idx.chunks.ten_min.len(), 2);
    }

    #[tokio::test]
    async fn merge_and_write_populates_station_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        let day_store = DayIndexStore::new(object_store);
        let day = Day::parse("2025-10-24").unwrap();

        let meta = StationMetadata {
            latitude: Some(19.4),
            longitude: Some(-155.3),
            elevation_m: Some(1100.0),
            instrument_type: Some("STS-2".into()),
        };
        let mut chunks = HashMap::new();
        chunks.insert(Tier::TenMin, vec![chunk("00:00:00", "00:10:00")]);
        let idx = day_store
            .merge_and_write(&sid(), &day, 100.0, chunks, vec![], Some(&meta), None)
            .await
            .unwrap();

        assert_eq!(idx.latitude, Some(19.4));
        assert_eq!(idx.longitude, Some(-155.3));
        assert_eq!(idx.elevation_m, Some(1100.0));
        assert_eq!(idx.instrument_type, Some("STS-2".into()));
    }

    #[tokio::test]
    async fn load_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(dir.path()));
        let day_store = DayIndexStore::new(object_store);
        let day = Day::parse("2025-10-24").unwrap();
        assert!(day_store.load(&sid(), &day, None).await.unwrap().is_none());
    }
}
