//! Origin Processor (C7, §4.7): the only writer of new chunks and day
//! indexes for a `(SID, day)`. Concurrent callers for the same day are
//! coalesced onto one running pipeline via [`OriginRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, Semaphore};
use tracing::{error, info, instrument, warn};

use crate::archive::{decode_records, fetch_with_bisection, ArchiveClient, ArchiveError};
use crate::day_index::DayIndexStore;
use crate::model::{ChunkMeta, ChunkStats, Gap, RequestOptions, StationId, Tier};
use crate::object_store::ObjectStore;
use crate::storage_path::chunk_path;
use crate::waveform::{apply_highpass, build_ladder, normalize, BuiltChunk, NormalizeError};

/// A proxied event the origin pipeline broadcasts to every coalesced
/// subscriber; the edge relays these over its own SSE stream unchanged.
#[derive(Debug, Clone)]
pub enum OriginEvent {
    ChunkUploaded {
        tier: Tier,
        start: String,
        end: String,
        url: String,
        partial: bool,
        stats: ChunkStats,
    },
    RangeUpdate {
        min: i32,
        max: i32,
    },
    ChunkError {
        start: String,
        reason: String,
    },
    Done,
    Error(String),
}

struct RunningTask {
    sender: broadcast::Sender<OriginEvent>,
    handle: tokio::task::JoinHandle<()>,
}

/// `(SID, day) -> in-flight pipeline`, guarded by a mutex (§4.7
/// implementation supplement).
pub struct OriginRegistry {
    tasks: Mutex<HashMap<(StationId, crate::model::Day), RunningTask>>,
    object_store: Arc<dyn ObjectStore>,
    day_index: Arc<DayIndexStore>,
    archive: Arc<dyn ArchiveClient>,
    fetch_semaphore: Arc<Semaphore>,
    presigned_url_ttl_seconds: u64,
    default_highpass_corner_hz: f64,
}

impl OriginRegistry {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        day_index: Arc<DayIndexStore>,
        archive: Arc<dyn ArchiveClient>,
        max_concurrent_archive_fetches: usize,
        presigned_url_ttl_seconds: u64,
        default_highpass_corner_hz: f64,
    ) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            object_store,
            day_index,
            archive,
            fetch_semaphore: Arc::new(Semaphore::new(max_concurrent_archive_fetches.max(1))),
            presigned_url_ttl_seconds,
            default_highpass_corner_hz,
        }
    }

    /// Attach to the running pipeline for `(sid, day)`, spawning one if
    /// none exists. `missing_ranges` is only consulted for the spawning
    /// caller; a second concurrent caller for the same day coalesces onto
    /// the first caller's pipeline regardless of its own missing-range
    /// list, matching the single-writer-per-day state machine (§4.7).
    /// `cached_range` is the `[min,max]` already covered by chunks the edge
    /// found cached for this day; the pipeline folds it into the definitive
    /// `range_update` so that range always spans the whole requested window,
    /// not just the newly-ingested part (I7).
    pub async fn ensure_running(
        self: Arc<Self>,
        sid: StationId,
        day: crate::model::Day,
        sample_rate: f64,
        missing_ranges: Vec<(DateTime<Utc>, DateTime<Utc>)>,
        cached_range: Option<(i32, i32)>,
        options: RequestOptions,
    ) -> broadcast::Receiver<OriginEvent> {
        let mut guard = self.tasks.lock().await;
        let key = (sid.clone(), day);

        if let Some(existing) = guard.get(&key) {
            if !existing.handle.is_finished() {
                return existing.sender.subscribe();
            }
        }

        let (tx, rx) = broadcast::channel(256);
        let registry = Arc::clone(&self);
        let task_sid = sid;
        let task_tx = tx.clone();
        let handle = tokio::spawn(async move {
            registry
                .run_pipeline(task_sid, day, sample_rate, missing_ranges, cached_range, options, task_tx)
                .await;
        });

        guard.insert(key, RunningTask { sender: tx, handle });
        rx
    }

    /// Drop coalescing entries whose task has finished and whose channel
    /// has no remaining receivers, so the map does not grow without bound
    /// (§5 implementation supplement).
    pub async fn sweep(&self) {
        let mut guard = self.tasks.lock().await;
        guard.retain(|_, task| !(task.handle.is_finished() && task.sender.receiver_count() == 0));
    }

    #[instrument(skip(self, options, tx), fields(sid = %sid, day = %day))]
    async fn run_pipeline(
        self: Arc<Self>,
        sid: StationId,
        day: crate::model::Day,
        sample_rate: f64,
        missing_ranges: Vec<(DateTime<Utc>, DateTime<Utc>)>,
        cached_range: Option<(i32, i32)>,
        options: RequestOptions,
        tx: broadcast::Sender<OriginEvent>,
    ) {
        let mut new_chunks: HashMap<Tier, Vec<ChunkMeta>> = HashMap::new();
        let mut new_gaps: Vec<Gap> = Vec::new();
        let (mut overall_min, mut overall_max) = cached_range.unwrap_or((i32::MAX, i32::MIN));
        let mut any_uploaded = false;

        for (start, end) in missing_ranges {
            match self.process_range(&sid, day, sample_rate, start, end, &options).await {
                Ok((built, gaps)) => {
                    new_gaps.extend(gaps);
                    for chunk in built {
                        let BuiltChunk { tier, meta, compressed, .. } = chunk;
                        overall_min = overall_min.min(meta.stats.min);
                        overall_max = overall_max.max(meta.stats.max);
                        any_uploaded = true;

                        let path = chunk_path(&sid, sample_rate, &day, &meta, options.grouping.as_deref());
                        if let Err(e) = self
                            .object_store
                            .put(&path, compressed, "application/octet-stream", true, None)
                            .await
                        {
                            warn!(error = %e, path, "chunk upload failed");
                            let _ = tx.send(OriginEvent::ChunkError {
                                start: meta.start.clone(),
                                reason: e.to_string(),
                            });
                            continue;
                        }

                        let url = match self.object_store.presign_get(&path, self.presigned_url_ttl_seconds).await {
                            Ok(url) => url,
                            Err(e) => {
                                let _ = tx.send(OriginEvent::ChunkError {
                                    start: meta.start.clone(),
                                    reason: e.to_string(),
                                });
                                continue;
                            }
                        };

                        let _ = tx.send(OriginEvent::ChunkUploaded {
                            tier,
                            start: meta.start.clone(),
                            end: meta.end.clone(),
                            url,
                            partial: meta.partial,
                            stats: meta.stats,
                        });

                        new_chunks.entry(tier).or_default().push(meta);
                    }
                }
                Err(reason) => {
                    error!(reason, "origin range processing failed");
                    let _ = tx.send(OriginEvent::ChunkError {
                        start: start.to_rfc3339(),
                        reason,
                    });
                }
            }
        }

        if !new_chunks.is_empty() {
            let station_metadata = match self.archive.station_metadata(&sid.network, &sid.station).await {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!(error = %e, "station metadata lookup failed");
                    None
                }
            };

            match self
                .day_index
                .merge_and_write(
                    &sid,
                    &day,
                    sample_rate,
                    new_chunks,
                    new_gaps,
                    station_metadata.as_ref(),
                    options.grouping.as_deref(),
                )
                .await
            {
                Ok(_) => {
                    if any_uploaded {
                        let _ = tx.send(OriginEvent::RangeUpdate {
                            min: overall_min,
                            max: overall_max,
                        });
                    }
                    let _ = tx.send(OriginEvent::Done);
                }
                Err(e) => {
                    error!(error = %e, "day index write failed");
                    let _ = tx.send(OriginEvent::Error(e.to_string()));
                }
            }
        } else {
            let _ = tx.send(OriginEvent::Done);
        }

        info!("origin pipeline finished");
    }

    async fn process_range(
        &self,
        sid: &StationId,
        day: crate::model::Day,
        sample_rate: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &RequestOptions,
    ) -> Result<(Vec<BuiltChunk>, Vec<Gap>), String> {
        let _permit = self
            .fetch_semaphore
            .acquire()
            .await
            .map_err(|e| e.to_string())?;

        let fetches = fetch_with_bisection(
            self.archive.as_ref(),
            &sid.network,
            &sid.station,
            &sid.location,
            &sid.channel,
            start,
            end,
        )
        .await
        .map_err(archive_error_message)?;

        let mut traces = Vec::new();
        for fetch in fetches {
            traces.extend(decode_records(&fetch.bytes).map_err(archive_error_message)?);
        }

        let mut window = normalize(traces, start, end, sample_rate).map_err(normalize_error_message)?;

        if options.enable_highpass {
            let corner = options.highpass_corner_hz.unwrap_or(self.default_highpass_corner_hz);
            apply_highpass(&mut window.samples, sample_rate, corner);
        }

        let gaps = window.gaps.clone();
        Ok((build_ladder(&window, day), gaps))
    }
}

fn archive_error_message(e: ArchiveError) -> String {
    e.to_string()
}

fn normalize_error_message(e: NormalizeError) -> String {
    e.to_string()
}
