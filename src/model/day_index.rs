//! Per-day metadata record (§3 "Day index").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::chunk::{ChunkMeta, Tier};
use super::gap::Gap;

/// One JSON record per `(SID, day)`, naming every chunk in every tier plus
/// the day-scoped detailed gap list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayIndex {
    pub date: String,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_type: Option<String>,
    pub sample_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub complete_day: bool,
    pub chunks: Tiers,
    #[serde(default)]
    pub gaps: Vec<Gap>,
}

/// The four per-tier chunk lists, keyed by tier in the JSON wire form
/// (`{"10min": [...], "1h": [...], "6h": [...], "24h": [...]}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tiers {
    #[serde(rename = "10min", default)]
    pub ten_min: Vec<ChunkMeta>,
    #[serde(rename = "1h", default)]
    pub one_hour: Vec<ChunkMeta>,
    #[serde(rename = "6h", default)]
    pub six_hour: Vec<ChunkMeta>,
    #[serde(rename = "24h", default)]
    pub twenty_four_hour: Vec<ChunkMeta>,
}

impl Tiers {
    pub fn get(&self, tier: Tier) -> &[ChunkMeta] {
        match tier {
            Tier::TenMin => &self.ten_min,
            Tier::OneHour => &self.one_hour,
            Tier::SixHour => &self.six_hour,
            Tier::TwentyFourHour => &self.twenty_four_hour,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut Vec<ChunkMeta> {
        match tier {
            Tier::TenMin => &mut self.ten_min,
            Tier::OneHour => &mut self.one_hour,
            Tier::SixHour => &mut self.six_hour,
            Tier::TwentyFourHour => &mut self.twenty_four_hour,
        }
    }
}

impl DayIndex {
    pub fn new_empty(
        date: String,
        network: String,
        station: String,
        location: String,
        channel: String,
        sample_rate: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            date,
            network,
            station,
            location,
            channel,
            instrument_type: None,
            sample_rate,
            latitude: None,
            longitude: None,
            elevation_m: None,
            created_at: now,
            updated_at: now,
            complete_day: false,
            chunks: Tiers::default(),
            gaps: Vec::new(),
        }
    }

    /// Merge a freshly-ingested batch of per-tier chunks into this index
    /// (§4.5 merge semantics): union by `start`, new entries win on
    /// collision, sort, dedup, recompute `complete_day`.
    pub fn merge(&mut self, new_chunks: HashMap<Tier, Vec<ChunkMeta>>, new_gaps: Vec<Gap>, now: DateTime<Utc>) {
        for (tier, incoming) in new_chunks {
            let existing = self.chunks.get_mut(tier);
            let mut by_start: HashMap<String, ChunkMeta> = std::mem::take(existing)
                .into_iter()
                .map(|c| (c.start.clone(), c))
                .collect();
            for c in incoming {
                by_start.insert(c.start.clone(), c);
            }
            let mut merged: Vec<ChunkMeta> = by_start.into_values().collect();
            merged.sort_by(|a, b| a.start.cmp(&b.start));
            *self.chunks.get_mut(tier) = merged;
        }

        for gap in new_gaps {
            if !self.gaps.iter().any(|g| g.start == gap.start && g.end == gap.end) {
                self.gaps.push(gap);
            }
        }
        self.gaps.sort_by_key(|g| g.start);

        self.complete_day = self.recompute_complete_day();
        self.updated_at = now;
    }

    fn recompute_complete_day(&self) -> bool {
        let full = self.chunks.twenty_four_hour.len() == 1
            && !self.chunks.twenty_four_hour[0].partial;
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chunk::ChunkStats;

    fn stats() -> ChunkStats {
        ChunkStats {
            min: 0,
            max: 0,
            samples: 0,
            gap_count: 0,
            gap_duration_seconds: 0.0,
            gap_samples_filled: 0,
        }
    }

    fn chunk(start: &str, end: &str, partial: bool) -> ChunkMeta {
        ChunkMeta {
            start: start.to_string(),
            end: end.to_string(),
            stats: stats(),
            partial,
        }
    }

    #[test]
    fn merge_is_idempotent_for_identical_chunk_sets() {
        let now = Utc::now();
        let mut idx = DayIndex::new_empty(
            "2025-10-24".into(),
            "HV".into(),
            "NPOC".into(),
            "01".into(),
            "HHZ".into(),
            100.0,
            now,
        );
        let mut batch = HashMap::new();
        batch.insert(Tier::TenMin, vec![chunk("00:00:00", "00:10:00", false)]);
        idx.merge(batch.clone(), vec![], now);
        let first_updated = idx.updated_at;

        let later = now + chrono::Duration::seconds(5);
        idx.merge(batch, vec![], later);

        assert_eq!(idx.chunks.ten_min.len(), 1);
        assert_eq!(idx.created_at, now);
        assert_ne!(idx.updated_at, first_updated);
    }

    #[test]
    fn merge_new_entry_wins_on_start_collision() {
        let now = Utc::now();
        let mut idx = DayIndex::new_empty(
            "2025-10-24".into(),
            "HV".into(),
            "NPOC".into(),
            "01".into(),
            "HHZ".into(),
            100.0,
            now,
        );
        let mut first = HashMap::new();
        first.insert(Tier::TenMin, vec![chunk("00:00:00", "00:09:55", true)]);
        idx.merge(first, vec![], now);

        let mut second = HashMap::new();
        second.insert(Tier::TenMin, vec![chunk("00:00:00", "00:10:00", false)]);
        idx.merge(second, vec![], now);

        assert_eq!(idx.chunks.ten_min.len(), 1);
        assert!(!idx.chunks.ten_min[0].partial);
    }

    #[test]
    fn complete_day_requires_single_full_24h_chunk() {
        let now = Utc::now();
        let mut idx = DayIndex::new_empty(
            "2025-10-24".into(),
            "HV".into(),
            "NPOC".into(),
            "01".into(),
            "HHZ".into(),
            100.0,
            now,
        );
        assert!(!idx.complete_day);

        let mut batch = HashMap::new();
        batch.insert(Tier::TwentyFourHour, vec![chunk("00:00:00", "24:00:00", false)]);
        idx.merge(batch, vec![], now);
        assert!(idx.complete_day);
    }
}
