//! Chunk Ladder Builder (C4, §4.4): slices a normalized window into the
//! four chunk tiers, aggregates per-chunk stats, and compresses the
//! payload.

use chrono::{DateTime, Utc};

use super::codec::{compress, samples_to_le_bytes};
use super::normalizer::NormalizedWindow;
use crate::model::{time_of_day, ChunkMeta, ChunkStats, Day, Tier};

/// One built chunk: its metadata plus the compressed bytes ready for C1.
pub struct BuiltChunk {
    pub day: Day,
    pub tier: Tier,
    pub meta: ChunkMeta,
    pub compressed: Vec<u8>,
}

/// Build every tier's chunks covering `window`, restricted to the single
/// UTC day `day` (the caller has already split a multi-day request by day).
pub fn build_ladder(window: &NormalizedWindow, day: Day) -> Vec<BuiltChunk> {
    let mut out = Vec::new();
    for tier in Tier::ALL {
        out.extend(build_tier(window, day, tier));
    }
    out
}

fn build_tier(window: &NormalizedWindow, day: Day, tier: Tier) -> Vec<BuiltChunk> {
    let day_start = day.start();
    let day_end = day.end();
    let tier_seconds = tier.seconds();

    let mut chunks = Vec::new();
    let mut chunk_start = day_start;

    while chunk_start < day_end {
        let nominal_end = chunk_start + chrono::Duration::seconds(tier_seconds);
        let chunk_end = nominal_end.min(day_end);

        let covered = window.start <= chunk_start && window.end >= chunk_end;
        let is_trailing_tenmin = tier == Tier::TenMin
            && window.end > chunk_start
            && window.end < chunk_end
            && window.start <= chunk_start;

        if covered || is_trailing_tenmin {
            let effective_end = if covered { chunk_end } else { window.end };
            if let Some(built) = slice_chunk(window, day, tier, chunk_start, effective_end, !covered) {
                chunks.push(built);
            }
        }

        chunk_start = nominal_end;
    }

    chunks
}

fn slice_chunk(
    window: &NormalizedWindow,
    day: Day,
    tier: Tier,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    partial: bool,
) -> Option<BuiltChunk> {
    let offset_start = ((start - window.start).num_milliseconds() as f64 / 1000.0 * window.sample_rate).round() as i64;
    let offset_end = ((end - window.start).num_milliseconds() as f64 / 1000.0 * window.sample_rate).round() as i64;

    if offset_start < 0 || offset_end > window.samples.len() as i64 || offset_start >= offset_end {
        return None;
    }

    let slice = &window.samples[offset_start as usize..offset_end as usize];
    let (min, max) = slice.iter().fold((i32::MAX, i32::MIN), |(mn, mx), &s| (mn.min(s), mx.max(s)));

    let mut gap_count = 0u32;
    let mut gap_duration_seconds = 0.0f64;
    let mut gap_samples_filled = 0u64;
    for gap in &window.gaps {
        if gap.overlaps(start, end) {
            gap_count += 1;
            let clip_start = gap.start.max(start);
            let clip_end = gap.end.min(end);
            gap_duration_seconds += (clip_end - clip_start).num_milliseconds() as f64 / 1000.0;
            gap_samples_filled += gap.clipped_samples_filled(start, end);
        }
    }

    let meta = ChunkMeta {
        start: time_of_day(start),
        end: end_time_of_day(end, day),
        stats: ChunkStats {
            min,
            max,
            samples: slice.len() as u64,
            gap_count,
            gap_duration_seconds,
            gap_samples_filled,
        },
        partial,
    };

    let raw = samples_to_le_bytes(slice);
    let compressed = compress(&raw);

    Some(BuiltChunk {
        day,
        tier,
        meta,
        compressed,
    })
}

/// `time_of_day` formats midnight as `"00:00:00"`, which is correct for a
/// chunk's `start` but wrong for a chunk's `end`: an end that lands exactly
/// on the day boundary must read `"24:00:00"` so `end - start == tier` and
/// the chunk doesn't look like a zero-length span (§3 "Chunk", I2).
fn end_time_of_day(end: DateTime<Utc>, day: Day) -> String {
    if end == day.end() {
        "24:00:00".to_string()
    } else {
        time_of_day(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Gap;
    use chrono::TimeZone;

    fn full_day_window() -> NormalizedWindow {
        let start = Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(1);
        let sample_rate = 1.0; // 1 Hz keeps sample counts readable in tests
        let n = 86_400usize;
        NormalizedWindow {
            start,
            end,
            sample_rate,
            samples: (0..n as i32).collect(),
            gaps: vec![],
        }
    }

    #[test]
    fn full_day_produces_exact_tier_counts() {
        let window = full_day_window();
        let day = Day::from_utc(window.start);
        let built = build_ladder(&window, day);

        for tier in Tier::ALL {
            let count = built.iter().filter(|c| c.tier == tier).count();
            assert_eq!(count, tier.full_day_count(), "{:?}", tier);
        }
    }

    #[test]
    fn day_boundary_chunks_end_at_24_00_00() {
        let window = full_day_window();
        let day = Day::from_utc(window.start);
        let built = build_ladder(&window, day);

        let full_day_chunk = built.iter().find(|c| c.tier == Tier::TwentyFourHour).unwrap();
        assert_eq!(full_day_chunk.meta.start, "00:00:00");
        assert_eq!(full_day_chunk.meta.end, "24:00:00");

        let last_ten_min = built
            .iter()
            .filter(|c| c.tier == Tier::TenMin)
            .max_by(|a, b| a.meta.start.cmp(&b.meta.start))
            .unwrap();
        assert_eq!(last_ten_min.meta.end, "24:00:00");
    }

    #[test]
    fn trailing_partial_tenmin_chunk_is_flagged() {
        let start = Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::seconds(305); // 5:05, short of a 10min chunk
        let window = NormalizedWindow {
            start,
            end,
            sample_rate: 1.0,
            samples: vec![0; 305],
            gaps: vec![],
        };
        let day = Day::from_utc(start);
        let built = build_tier(&window, day, Tier::TenMin);
        assert_eq!(built.len(), 1);
        assert!(built[0].meta.partial);
        assert_eq!(built[0].meta.stats.samples, 305);
    }

    #[test]
    fn gap_spanning_boundary_is_clipped_into_both_chunks() {
        let start = Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::seconds(1200); // two 10-min chunks
        let gap_start = start + chrono::Duration::seconds(598);
        let gap_end = start + chrono::Duration::seconds(602);
        let window = NormalizedWindow {
            start,
            end,
            sample_rate: 1.0,
            samples: vec![0; 1200],
            gaps: vec![Gap::new(gap_start, gap_end, 1.0)],
        };
        let day = Day::from_utc(start);
        let built = build_tier(&window, day, Tier::TenMin);
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].meta.stats.gap_count, 1);
        assert_eq!(built[1].meta.stats.gap_count, 1);
    }
}
