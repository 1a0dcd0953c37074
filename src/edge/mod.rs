//! Edge Coordinator (C6, §4.6): validates a stream request, loads cached
//! state, fans cached chunks straight to the client, and forwards the
//! missing-range list to the Origin Processor, proxying its events back.

mod handlers;

pub use handlers::{day_index_handler, request_stream_handler};

use std::sync::Arc;

use async_stream::stream;
use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use tracing::warn;

use crate::day_index::DayIndexStore;
use crate::errors::AppError;
use crate::model::{split_by_day, Day, RequestOptions, StationId, Tier};
use crate::object_store::ObjectStore;
use crate::origin::{OriginEvent, OriginRegistry};
use crate::sse::{CompleteStatus, SseEvent};
use crate::storage_path::chunk_path;

#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub sid: StationId,
    pub start: DateTime<Utc>,
    pub duration_seconds: i64,
    pub options: RequestOptions,
}

pub struct EdgeCoordinator {
    object_store: Arc<dyn ObjectStore>,
    day_index: Arc<DayIndexStore>,
    origin: Arc<OriginRegistry>,
    max_request_duration_seconds: i64,
}

impl EdgeCoordinator {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        day_index: Arc<DayIndexStore>,
        origin: Arc<OriginRegistry>,
        max_request_duration_seconds: i64,
    ) -> Self {
        Self {
            object_store,
            day_index,
            origin,
            max_request_duration_seconds,
        }
    }

    pub fn validate(&self, req: &StreamRequest) -> Result<(), AppError> {
        if req.duration_seconds <= 0 {
            return Err(AppError::Validation("duration must be positive".into()));
        }
        if req.duration_seconds > self.max_request_duration_seconds {
            return Err(AppError::Validation(format!(
                "duration exceeds policy ceiling of {} seconds",
                self.max_request_duration_seconds
            )));
        }
        if !crate::model::is_whole_second(req.start) {
            return Err(AppError::Validation("start must fall on a whole second".into()));
        }
        Ok(())
    }

    /// Run `request_stream` (§4.6 steps 2-10), returning a stream of SSE
    /// events ready to hand to axum's `Sse` response.
    pub fn request_stream(
        self: Arc<Self>,
        req: StreamRequest,
    ) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
        stream! {
            let segments = split_by_day(req.start, req.duration_seconds);
            let tier = Tier::select_for_duration(req.duration_seconds);
            let mut emitted_chunks = 0usize;
            let mut aborted = false;

            let mut agg_min = i32::MAX;
            let mut agg_max = i32::MIN;
            let mut agg_cached = 0usize;
            let mut agg_missing = 0usize;
            let mut sample_rate = 100.0;
            let mut per_day_plans = Vec::with_capacity(segments.len());

            for (day, seg_start, seg_end) in &segments {
                let plan = self.plan_day(&req, *day, *seg_start, *seg_end, tier).await;
                match &plan {
                    Ok(plan) => {
                        agg_cached += plan.cached.len();
                        agg_missing += plan.missing.len();
                        sample_rate = plan.sample_rate;
                        if let Some((mn, mx)) = plan.provisional_range {
                            agg_min = agg_min.min(mn);
                            agg_max = agg_max.max(mx);
                        }
                    }
                    Err(_) => agg_missing += 1,
                }
                per_day_plans.push((*day, *seg_start, *seg_end, plan));
            }

            let partial = agg_min > agg_max;
            yield Ok(SseEvent::MetadataCalculated {
                min: if partial { 0 } else { agg_min },
                max: if partial { 0 } else { agg_max },
                partial,
                cached_count: agg_cached,
                missing_count: agg_missing,
                sample_rate,
                tier,
            }.into_axum_event());

            for (day, seg_start, seg_end, plan) in per_day_plans {
                let plan = match plan {
                    Ok(plan) => plan,
                    Err(reason) => {
                        yield Ok(SseEvent::OriginError { reason }.into_axum_event());
                        aborted = true;
                        continue;
                    }
                };

                for cached in &plan.cached {
                    match self.object_store.get(&cached.path).await {
                        Ok(bytes) => {
                            emitted_chunks += 1;
                            yield Ok(SseEvent::ChunkData {
                                tier,
                                start: cached.start.clone(),
                                end: cached.end.clone(),
                                partial: cached.partial,
                                bytes,
                            }.into_axum_event());
                        }
                        Err(e) => {
                            warn!(error = %e, path = cached.path, "cached chunk fetch failed");
                            yield Ok(SseEvent::ChunkError {
                                start: cached.start.clone(),
                                reason: e.to_string(),
                            }.into_axum_event());
                        }
                    }
                }

                if plan.missing.is_empty() {
                    continue;
                }

                let mut receiver = self
                    .origin
                    .clone()
                    .ensure_running(
                        req.sid.clone(),
                        day,
                        plan.sample_rate,
                        plan.missing.iter().map(|m| (m.0, m.1)).collect(),
                        plan.provisional_range,
                        req.options.clone(),
                    )
                    .await;

                let _ = (seg_start, seg_end);

                loop {
                    match receiver.recv().await {
                        Ok(OriginEvent::ChunkUploaded { tier, start, end, url, partial, stats }) => {
                            emitted_chunks += 1;
                            yield Ok(SseEvent::ChunkUploaded { tier, start, end, url, partial, stats }.into_axum_event());
                        }
                        Ok(OriginEvent::RangeUpdate { min, max }) => {
                            yield Ok(SseEvent::RangeUpdate { min, max }.into_axum_event());
                        }
                        Ok(OriginEvent::ChunkError { start, reason }) => {
                            yield Ok(SseEvent::ChunkError { start, reason }.into_axum_event());
                        }
                        Ok(OriginEvent::Done) => break,
                        Ok(OriginEvent::Error(reason)) => {
                            yield Ok(SseEvent::OriginError { reason }.into_axum_event());
                            aborted = true;
                            break;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }

            yield Ok(SseEvent::Complete {
                status: if aborted { CompleteStatus::Aborted } else { CompleteStatus::Ok },
                emitted_chunks,
            }.into_axum_event());
        }
    }

    async fn plan_day(
        &self,
        req: &StreamRequest,
        day: Day,
        seg_start: DateTime<Utc>,
        seg_end: DateTime<Utc>,
        tier: Tier,
    ) -> Result<DayPlan, String> {
        let index = self
            .day_index
            .load(&req.sid, &day, req.options.grouping.as_deref())
            .await
            .map_err(|e| e.to_string())?;

        let Some(index) = index else {
            return Ok(DayPlan {
                sample_rate: 100.0,
                cached: vec![],
                missing: vec![(seg_start, seg_end)],
                provisional_range: None,
            });
        };

        let day_start = day.start();
        let mut cached = Vec::new();
        let mut covered_end = seg_start;
        let mut provisional_range: Option<(i32, i32)> = None;

        let mut tier_chunks = index.chunks.get(tier).to_vec();
        tier_chunks.sort_by(|a, b| a.start.cmp(&b.start));

        for chunk in &tier_chunks {
            let chunk_start = day_start + parse_hms(&chunk.start);
            let chunk_end = day_start + parse_hms(&chunk.end);
            if chunk_end <= seg_start || chunk_start >= seg_end {
                continue;
            }
            if chunk_start > covered_end {
                // a gap in coverage between what we've seen so far and this chunk
                break;
            }

            let path = chunk_path(&req.sid, index.sample_rate, &day, chunk, req.options.grouping.as_deref());
            cached.push(CachedChunk {
                path,
                start: chunk.start.clone(),
                end: chunk.end.clone(),
                partial: chunk.partial,
            });
            let (mn, mx) = (chunk.stats.min, chunk.stats.max);
            provisional_range = Some(match provisional_range {
                Some((lo, hi)) => (lo.min(mn), hi.max(mx)),
                None => (mn, mx),
            });
            covered_end = chunk_end.max(covered_end);
        }

        let mut missing = Vec::new();
        if covered_end < seg_end {
            missing.push((covered_end, seg_end));
        }

        Ok(DayPlan {
            sample_rate: index.sample_rate,
            cached,
            missing,
            provisional_range,
        })
    }
}

struct DayPlan {
    sample_rate: f64,
    cached: Vec<CachedChunk>,
    missing: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    provisional_range: Option<(i32, i32)>,
}

struct CachedChunk {
    path: String,
    start: String,
    end: String,
    partial: bool,
}

fn parse_hms(s: &str) -> chrono::Duration {
    let parts: Vec<i64> = s.split(':').map(|p| p.parse().unwrap_or(0)).collect();
    let (h, m, sec) = (
        parts.first().copied().unwrap_or(0),
        parts.get(1).copied().unwrap_or(0),
        parts.get(2).copied().unwrap_or(0),
    );
    chrono::Duration::hours(h) + chrono::Duration::minutes(m) + chrono::Duration::seconds(sec)
}
