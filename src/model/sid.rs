//! Station identity and storage-path derivation (§3 "Station identity" / "Storage path").

use serde::{Deserialize, Serialize};

/// The two-character sentinel FDSN uses for "no location code".
pub const NO_LOCATION: &str = "--";

/// A station identifier tuple in FDSN/SEED conventions: network, station,
/// location, channel. Combined with `sample_rate` this uniquely determines
/// the storage path for a station's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl StationId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    /// The `<grouping>` tag used in the storage path. The distilled spec
    /// leaves its derivation to the application; this implementation uses
    /// the lowercased station code unless a caller-supplied override is
    /// given (DESIGN.md Open Question O1).
    pub fn grouping(&self, override_grouping: Option<&str>) -> String {
        override_grouping
            .map(str::to_string)
            .unwrap_or_else(|| self.station.to_lowercase())
    }

    /// `NET_STA_LOC_CHA` joined with underscores, used as the stem of blob
    /// and index file names.
    pub fn code(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Format a sample rate as the decimal string used in blob names
/// (`SR` in `NET_STA_LOC_CHA_SRHz_...`): integral rates drop the fractional
/// part, fractional rates (e.g. 40.96) keep it.
pub fn format_sample_rate(sample_rate: f64) -> String {
    if (sample_rate.fract()).abs() < 1e-9 {
        format!("{}", sample_rate as i64)
    } else {
        let s = format!("{:.6}", sample_rate);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_defaults_to_lowercased_station() {
        let sid = StationId::new("HV", "NPOC", "01", "HHZ");
        assert_eq!(sid.grouping(None), "npoc");
        assert_eq!(sid.grouping(Some("kilauea")), "kilauea");
    }

    #[test]
    fn code_joins_with_underscores() {
        let sid = StationId::new("HV", "NPOC", "01", "HHZ");
        assert_eq!(sid.code(), "HV_NPOC_01_HHZ");
    }

    #[test]
    fn sample_rate_formatting() {
        assert_eq!(format_sample_rate(100.0), "100");
        assert_eq!(format_sample_rate(40.96), "40.96");
    }
}
