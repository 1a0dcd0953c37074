//! SSE Protocol (C8, §4.8): the event catalog streamed to clients, and the
//! base64 + `len` framing used for inline chunk bytes.

use axum::response::sse::Event;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use crate::model::{ChunkStats, Tier};

/// One event in the `request_stream` catalog (§4.8). Each variant knows
/// its own SSE `event:` name and JSON `data:` payload.
#[derive(Debug, Clone)]
pub enum SseEvent {
    MetadataCalculated {
        min: i32,
        max: i32,
        partial: bool,
        cached_count: usize,
        missing_count: usize,
        sample_rate: f64,
        tier: Tier,
    },
    ChunkData {
        tier: Tier,
        start: String,
        end: String,
        partial: bool,
        bytes: Vec<u8>,
    },
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
    OriginError {
        reason: String,
    },
    Complete {
        status: CompleteStatus,
        emitted_chunks: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteStatus {
    Ok,
    Aborted,
}

impl CompleteStatus {
    fn as_str(&self) -> &'static str {
        match self {
            CompleteStatus::Ok => "ok",
            CompleteStatus::Aborted => "aborted",
        }
    }
}

impl SseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SseEvent::MetadataCalculated { .. } => "metadata_calculated",
            SseEvent::ChunkData { .. } => "chunk_data",
            SseEvent::ChunkUploaded { .. } => "chunk_uploaded",
            SseEvent::RangeUpdate { .. } => "range_update",
            SseEvent::ChunkError { .. } => "chunk_error",
            SseEvent::OriginError { .. } => "origin_error",
            SseEvent::Complete { .. } => "complete",
        }
    }

    fn payload(&self) -> serde_json::Value {
        match self {
            SseEvent::MetadataCalculated {
                min,
                max,
                partial,
                cached_count,
                missing_count,
                sample_rate,
                tier,
            } => json!({
                "min": min,
                "max": max,
                "partial": partial,
                "cached_count": cached_count,
                "missing_count": missing_count,
                "sample_rate": sample_rate,
                "tier": tier.key(),
            }),
            SseEvent::ChunkData {
                tier,
                start,
                end,
                partial,
                bytes,
            } => {
                let encoded = BASE64.encode(bytes);
                json!({
                    "tier": tier.key(),
                    "start": start,
                    "end": end,
                    "cached": true,
                    "partial": partial,
                    "bytes": encoded,
                    "len": bytes.len(),
                })
            }
            SseEvent::ChunkUploaded {
                tier,
                start,
                end,
                url,
                partial,
                stats,
            } => json!({
                "tier": tier.key(),
                "start": start,
                "end": end,
                "url": url,
                "cached": false,
                "partial": partial,
                "stats": stats,
            }),
            SseEvent::RangeUpdate { min, max } => json!({ "min": min, "max": max }),
            SseEvent::ChunkError { start, reason } => json!({ "start": start, "reason": reason }),
            SseEvent::OriginError { reason } => json!({ "reason": reason }),
            SseEvent::Complete { status, emitted_chunks } => json!({
                "status": status.as_str(),
                "emitted_chunks": emitted_chunks,
            }),
        }
    }

    /// Convert to an axum SSE event. The whole JSON payload is written in
    /// one `.data()` call so the server never splits an event's `data:`
    /// field across separate axum `Event`s (§4.8).
    pub fn into_axum_event(self) -> Event {
        Event::default().event(self.name()).data(self.payload().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_data_frames_bytes_with_explicit_length() {
        let ev = SseEvent::ChunkData {
            tier: Tier::TenMin,
            start: "00:00:00".into(),
            end: "00:10:00".into(),
            partial: false,
            bytes: vec![1, 2, 3, 4, 5],
        };
        let payload = ev.payload();
        assert_eq!(payload["len"], 5);
        let decoded = BASE64.decode(payload["bytes"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn complete_event_name_matches_catalog() {
        let ev = SseEvent::Complete {
            status: CompleteStatus::Aborted,
            emitted_chunks: 3,
        };
        assert_eq!(ev.name(), "complete");
        assert_eq!(ev.payload()["status"], "aborted");
    }
}
