//! Archive Client (C2, §4.2): fetches raw archive byte streams from the
//! upstream FDSN web services and maps transport failures onto the
//! fetch/retry/bisect taxonomy the Origin Processor drives.

mod mseed;

pub use mseed::{decode_records, Trace};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Station metadata fields the archive can report alongside samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationMetadata {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_m: Option<f64>,
    pub instrument_type: Option<String>,
}

/// Raw bytes fetched for a window, plus the sample rate the archive
/// reported (used to cross-check against the station's configured rate).
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub bytes: Vec<u8>,
    pub reported_sample_rate: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive has no data for the requested range")]
    NoData,

    #[error("archive is throttling requests")]
    Throttled,

    #[error("archive request too large; bisect and retry")]
    Oversized,

    #[error("transient archive error: {0}")]
    Transient(String),

    #[error("permanent archive error: {0}")]
    Permanent(String),
}

/// Default ceiling on a single fetch's span (§4.2), overridable via config.
pub const DEFAULT_MAX_FETCH_SECONDS: i64 = 24 * 3600;

#[async_trait]
pub trait ArchiveClient: Send + Sync {
    async fn fetch(
        &self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, ArchiveError>;

    async fn station_metadata(
        &self,
        network: &str,
        station: &str,
    ) -> Result<StationMetadata, ArchiveError>;
}

/// Talks to an FDSN `dataselect`/`station` web service deployment.
pub struct FdsnArchiveClient {
    http: reqwest::Client,
    base_url: String,
    max_fetch_seconds: i64,
}

impl FdsnArchiveClient {
    pub fn new(base_url: impl Into<String>, max_fetch_seconds: i64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("seismic-stream-server/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("archive http client builds with static config");
        Self {
            http,
            base_url: base_url.into(),
            max_fetch_seconds,
        }
    }

    pub fn max_fetch_seconds(&self) -> i64 {
        self.max_fetch_seconds
    }

    fn dataselect_url(
        &self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        let loc = if location.is_empty() { "--" } else { location };
        format!(
            "{}/fdsnws/dataselect/1/query?net={}&sta={}&loc={}&cha={}&start={}&end={}&format=miniseed",
            self.base_url.trim_end_matches('/'),
            network,
            station,
            loc,
            channel,
            start.to_rfc3339(),
            end.to_rfc3339(),
        )
    }

    fn station_url(&self, network: &str, station: &str) -> String {
        format!(
            "{}/fdsnws/station/1/query?net={}&sta={}&level=station&format=text",
            self.base_url.trim_end_matches('/'),
            network,
            station,
        )
    }
}

#[async_trait]
impl ArchiveClient for FdsnArchiveClient {
    async fn fetch(
        &self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, ArchiveError> {
        if end <= start {
            return Err(ArchiveError::Permanent("end must be after start".into()));
        }
        if (end - start).num_seconds() > self.max_fetch_seconds {
            return Err(ArchiveError::Oversized);
        }

        let url = self.dataselect_url(network, station, location, channel, start, end);
        debug!(url, "fetching from archive");

        let resp = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ArchiveError::Transient(e.to_string())
            } else {
                ArchiveError::Permanent(e.to_string())
            }
        })?;

        match resp.status().as_u16() {
            200 => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| ArchiveError::Transient(e.to_string()))?;
                Ok(FetchResult {
                    bytes: bytes.to_vec(),
                    reported_sample_rate: None,
                })
            }
            204 | 404 => Err(ArchiveError::NoData),
            413 => Err(ArchiveError::Oversized),
            429 => {
                warn!(url, "archive throttled request");
                Err(ArchiveError::Throttled)
            }
            503 => Err(ArchiveError::Transient("archive unavailable (503)".into())),
            status => Err(ArchiveError::Permanent(format!(
                "unexpected archive status {status}"
            ))),
        }
    }

    async fn station_metadata(
        &self,
        network: &str,
        station: &str,
    ) -> Result<StationMetadata, ArchiveError> {
        let url = self.station_url(network, station);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ArchiveError::Transient(e.to_string()))?;

        if !resp.status().is_success() {
            return Ok(StationMetadata::default());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ArchiveError::Transient(e.to_string()))?;
        Ok(parse_station_text(&body))
    }
}

/// Parse the pipe-delimited FDSN station text format (`#Network|Station|
/// Latitude|Longitude|Elevation|...`), taking the first data row.
fn parse_station_text(body: &str) -> StationMetadata {
    for line in body.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() >= 5 {
            return StationMetadata {
                latitude: fields[2].trim().parse().ok(),
                longitude: fields[3].trim().parse().ok(),
                elevation_m: fields[4].trim().parse().ok(),
                instrument_type: fields.get(5).map(|s| s.trim().to_string()),
            };
        }
    }
    StationMetadata::default()
}

/// Fetch a range via `client`, recursively bisecting on `Oversized` until
/// each half succeeds or a minimum span is reached (§4.7 step 1).
pub async fn fetch_with_bisection(
    client: &dyn ArchiveClient,
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<FetchResult>, ArchiveError> {
    match client.fetch(network, station, location, channel, start, end).await {
        Ok(result) => Ok(vec![result]),
        Err(ArchiveError::Oversized) => {
            let span = end - start;
            if span.num_seconds() <= 60 {
                return Err(ArchiveError::Permanent(
                    "archive reports oversized even at minimum bisection span".into(),
                ));
            }
            let mid = start + span / 2;
            let mut left = Box::pin(fetch_with_bisection(
                client, network, station, location, channel, start, mid,
            ))
            .await?;
            let mut right = Box::pin(fetch_with_bisection(
                client, network, station, location, channel, mid, end,
            ))
            .await?;
            left.append(&mut right);
            Ok(left)
        }
        Err(ArchiveError::NoData) => Ok(vec![]),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipe_delimited_station_text() {
        let body = "#Network|Station|Latitude|Longitude|Elevation|SiteName\nHV|NPOC|19.4|-155.3|1100.0|North Pit\n";
        let meta = parse_station_text(body);
        assert_eq!(meta.latitude, Some(19.4));
        assert_eq!(meta.longitude, Some(-155.3));
        assert_eq!(meta.elevation_m, Some(1100.0));
    }

    #[test]
    fn parses_empty_station_text_as_default() {
        let meta = parse_station_text("#Network|Station\n");
        assert_eq!(meta, StationMetadata::default());
    }
}
