//! Gap records (§3 "Gap record").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A maximal contiguous span that was missing in the archive and has been
/// linearly interpolated between the last pre-gap sample and the first
/// post-gap sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: f64,
    pub samples_filled: u64,
}

impl Gap {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, sample_rate: f64) -> Self {
        let duration_seconds = (end - start).num_nanoseconds().unwrap_or(0) as f64 / 1e9;
        let samples_filled = (duration_seconds * sample_rate).round().max(0.0) as u64;
        Self {
            start,
            end,
            duration_seconds,
            samples_filled,
        }
    }

    /// Whether this gap overlaps the half-open interval `[lo, hi)`.
    pub fn overlaps(&self, lo: DateTime<Utc>, hi: DateTime<Utc>) -> bool {
        self.start < hi && self.end > lo
    }

    /// The portion of `samples_filled` that falls within `[lo, hi)`,
    /// clipped proportionally to the overlapping duration (§3: "any gap
    /// that crosses a chunk boundary appears in both chunks' gap
    /// summaries").
    pub fn clipped_samples_filled(&self, lo: DateTime<Utc>, hi: DateTime<Utc>) -> u64 {
        if !self.overlaps(lo, hi) {
            return 0;
        }
        let clip_start = self.start.max(lo);
        let clip_end = self.end.min(hi);
        let clipped_duration = (clip_end - clip_start).num_nanoseconds().unwrap_or(0) as f64 / 1e9;
        if self.duration_seconds <= 0.0 {
            return 0;
        }
        ((clipped_duration / self.duration_seconds) * self.samples_filled as f64).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn clipped_samples_filled_full_overlap_equals_total() {
        let start = Utc.with_ymd_and_hms(2025, 10, 24, 0, 9, 58).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 10, 24, 0, 10, 2).unwrap();
        let gap = Gap::new(start, end, 100.0);
        assert_eq!(gap.samples_filled, 400);

        let chunk_a_end = Utc.with_ymd_and_hms(2025, 10, 24, 0, 10, 0).unwrap();
        let chunk_b_start = chunk_a_end;

        let a = gap.clipped_samples_filled(start - chrono::Duration::seconds(1), chunk_a_end);
        let b = gap.clipped_samples_filled(chunk_b_start, end + chrono::Duration::seconds(1));
        assert_eq!(a, 200);
        assert_eq!(b, 200);
    }
}
