//! Canonical day and whole-second timestamp helpers (§3 "Canonical day").

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A UTC calendar day, `YYYY-MM-DD`. All chunk start/end times are expressed
/// as full-second boundaries within one day; the system never stores
/// samples that straddle a day boundary in the same chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.date_naive())
    }

    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self(NaiveDate::parse_from_str(s, "%Y-%m-%d")?))
    }

    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_hms_opt(0, 0, 0).unwrap())
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start() + chrono::Duration::days(1)
    }

    pub fn succ(&self) -> Self {
        Self(self.0.succ_opt().expect("day overflow"))
    }

    pub fn as_str(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        use chrono::Datelike;
        self.0.month()
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Split a `[start, start+duration)` window into per-day sub-windows, each
/// clipped to its containing UTC day (§4.6 step 2: "multi-day requests are
/// decomposed into per-day sub-requests").
pub fn split_by_day(
    start: DateTime<Utc>,
    duration_seconds: i64,
) -> Vec<(Day, DateTime<Utc>, DateTime<Utc>)> {
    let end = start + chrono::Duration::seconds(duration_seconds);
    let mut out = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let day = Day::from_utc(cursor);
        let day_end = day.end();
        let segment_end = day_end.min(end);
        out.push((day, cursor, segment_end));
        cursor = segment_end;
    }
    out
}

/// Whether `t` falls exactly on an integer UTC second (no sub-second part).
pub fn is_whole_second(t: DateTime<Utc>) -> bool {
    t.timestamp_subsec_nanos() == 0
}

/// `HH:MM:SS` offset-from-midnight string for a time known to be within `day`.
pub fn time_of_day(t: DateTime<Utc>) -> String {
    t.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn split_by_day_single_day() {
        let start = Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap();
        let segs = split_by_day(start, 600);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].0.as_str(), "2025-10-24");
    }

    #[test]
    fn split_by_day_crossing_midnight() {
        let start = Utc.with_ymd_and_hms(2025, 10, 24, 23, 50, 0).unwrap();
        let segs = split_by_day(start, 1200);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].0.as_str(), "2025-10-24");
        assert_eq!(segs[1].0.as_str(), "2025-10-25");
        assert_eq!(segs[0].2, segs[0].0.end());
        assert_eq!(segs[1].1, segs[0].0.end());
    }

    #[test]
    fn midnight_boundary_produces_no_empty_neighbor_segment() {
        let start = Utc.with_ymd_and_hms(2025, 10, 23, 23, 0, 0).unwrap();
        let segs = split_by_day(start, 3600);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].2, segs[0].0.end());
    }
}
