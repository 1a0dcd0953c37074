//! Chunk tiers and metadata (§3 "Chunk").

use serde::{Deserialize, Serialize};

use super::sid::{format_sample_rate, StationId};
use super::time::Day;

/// One of the four chunk durations maintained in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "10min")]
    TenMin,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::TenMin, Tier::OneHour, Tier::SixHour, Tier::TwentyFourHour];

    pub fn seconds(&self) -> i64 {
        match self {
            Tier::TenMin => 600,
            Tier::OneHour => 3_600,
            Tier::SixHour => 21_600,
            Tier::TwentyFourHour => 86_400,
        }
    }

    /// Full-day chunk count for a complete day (I3).
    pub fn full_day_count(&self) -> usize {
        (86_400 / self.seconds()) as usize
    }

    pub fn key(&self) -> &'static str {
        match self {
            Tier::TenMin => "10min",
            Tier::OneHour => "1h",
            Tier::SixHour => "6h",
            Tier::TwentyFourHour => "24h",
        }
    }

    /// Smallest tier whose chunk size still covers a request of
    /// `duration_seconds` (§4.6 step 4).
    pub fn select_for_duration(duration_seconds: i64) -> Tier {
        if duration_seconds <= Tier::TenMin.seconds() {
            Tier::TenMin
        } else if duration_seconds <= Tier::OneHour.seconds() {
            Tier::OneHour
        } else if duration_seconds <= Tier::SixHour.seconds() {
            Tier::SixHour
        } else {
            Tier::TwentyFourHour
        }
    }
}

/// Aggregated statistics for the samples covered by one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkStats {
    pub min: i32,
    pub max: i32,
    pub samples: u64,
    pub gap_count: u32,
    pub gap_duration_seconds: f64,
    pub gap_samples_filled: u64,
}

/// One entry in a day index tier list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// `HH:MM:SS` offset within the day.
    pub start: String,
    /// `HH:MM:SS` offset within the day.
    pub end: String,
    pub stats: ChunkStats,
    /// True only for the trailing 10 min chunk of a live-leading-edge day.
    #[serde(default)]
    pub partial: bool,
}

/// Self-describing immutable blob name (§3 "Chunk blob name").
pub fn blob_name(sid: &StationId, sample_rate: f64, day: &Day, chunk: &ChunkMeta) -> String {
    format!(
        "{}_{}Hz_{}-{}_to_{}-{}.bin.lz4",
        sid.code(),
        format_sample_rate(sample_rate),
        day.as_str(),
        chunk.start.replace(':', "-"),
        day.as_str(),
        chunk.end.replace(':', "-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_selection_matches_duration_boundaries() {
        assert_eq!(Tier::select_for_duration(1), Tier::TenMin);
        assert_eq!(Tier::select_for_duration(600), Tier::TenMin);
        assert_eq!(Tier::select_for_duration(601), Tier::OneHour);
        assert_eq!(Tier::select_for_duration(3_600), Tier::OneHour);
        assert_eq!(Tier::select_for_duration(3_601), Tier::SixHour);
        assert_eq!(Tier::select_for_duration(21_600), Tier::SixHour);
        assert_eq!(Tier::select_for_duration(21_601), Tier::TwentyFourHour);
        assert_eq!(Tier::select_for_duration(86_400), Tier::TwentyFourHour);
    }

    #[test]
    fn full_day_counts_match_i3() {
        assert_eq!(Tier::TenMin.full_day_count(), 144);
        assert_eq!(Tier::OneHour.full_day_count(), 24);
        assert_eq!(Tier::SixHour.full_day_count(), 4);
        assert_eq!(Tier::TwentyFourHour.full_day_count(), 1);
    }

    #[test]
    fn blob_name_is_self_describing() {
        let sid = StationId::new("HV", "NPOC", "01", "HHZ");
        let day = Day::parse("2025-10-24").unwrap();
        let chunk = ChunkMeta {
            start: "00:00:00".into(),
            end: "00:10:00".into(),
            stats: ChunkStats {
                min: 0,
                max: 0,
                samples: 60_000,
                gap_count: 0,
                gap_duration_seconds: 0.0,
                gap_samples_filled: 0,
            },
            partial: false,
        };
        let name = blob_name(&sid, 100.0, &day, &chunk);
        assert_eq!(
            name,
            "HV_NPOC_01_HHZ_100Hz_2025-10-24-00-00-00_to_2025-10-24-00-10-00.bin.lz4"
        );
    }
}
