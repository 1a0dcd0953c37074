//! A minimal decoder for the subset of miniSEED-style fixed-size records
//! this deployment requests from the archive: big-endian header, int32
//! big-endian uncompressed sample data. Steim-compressed records are
//! rejected (§4.3 implementation supplement).

use chrono::{DateTime, TimeZone, Utc};

use super::ArchiveError;

/// One decoded data record: its nominal start time, sample rate, and the
/// samples themselves (already byte-order-converted to native i32).
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub start: DateTime<Utc>,
    pub sample_rate: f64,
    pub samples: Vec<i32>,
}

impl Trace {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::nanoseconds(
            (self.samples.len() as f64 / self.sample_rate * 1e9).round() as i64,
        )
    }
}

const FIXED_HEADER_LEN: usize = 48;

/// Decode a byte stream consisting of back-to-back fixed-size records.
/// Tolerates trailing short/garbage bytes (the archive may pad or the
/// caller may have bisected mid-record) by stopping at the first record it
/// cannot fully parse.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Trace>, ArchiveError> {
    let mut traces = Vec::new();
    let mut offset = 0usize;

    while offset + FIXED_HEADER_LEN <= bytes.len() {
        let header = &bytes[offset..offset + FIXED_HEADER_LEN];

        let encoding_flag = header[46];
        if encoding_flag == STEIM_ENCODING_FLAG {
            return Err(ArchiveError::Permanent(
                "Steim-compressed record encountered; only uncompressed int32 records are supported".into(),
            ));
        }

        let sample_count = u32::from_be_bytes(header[30..34].try_into().unwrap()) as usize;
        let rate_factor = i16::from_be_bytes(header[34..36].try_into().unwrap());
        let rate_multiplier = i16::from_be_bytes(header[36..38].try_into().unwrap());
        let sample_rate = resolve_sample_rate(rate_factor, rate_multiplier);

        let year = u16::from_be_bytes(header[20..22].try_into().unwrap());
        let day_of_year = u16::from_be_bytes(header[22..24].try_into().unwrap());
        let hour = header[24];
        let minute = header[25];
        let second = header[26];
        let frac_ticks = u16::from_be_bytes(header[28..30].try_into().unwrap());

        let start = record_start_time(year, day_of_year, hour, minute, second, frac_ticks)
            .ok_or_else(|| ArchiveError::Permanent("malformed record start time".into()))?;

        let payload_start = offset + FIXED_HEADER_LEN;
        let payload_len = sample_count * 4;
        if payload_start + payload_len > bytes.len() {
            break;
        }

        let mut samples = Vec::with_capacity(sample_count);
        for i in 0..sample_count {
            let base = payload_start + i * 4;
            samples.push(i32::from_be_bytes(bytes[base..base + 4].try_into().unwrap()));
        }

        traces.push(Trace {
            start,
            sample_rate,
            samples,
        });

        // record length is not self-describing in this trimmed header form;
        // the reference archive always emits fixed-size 4096-byte records
        // for the sample rates in scope.
        offset += RECORD_LEN;
    }

    Ok(traces)
}

const STEIM_ENCODING_FLAG: u8 = 0xFF;
const RECORD_LEN: usize = 4096;

fn resolve_sample_rate(factor: i16, multiplier: i16) -> f64 {
    let base = if factor > 0 {
        factor as f64
    } else if factor < 0 {
        1.0 / (-factor as f64)
    } else {
        1.0
    };
    let mult = if multiplier > 0 {
        multiplier as f64
    } else if multiplier < 0 {
        1.0 / (-multiplier as f64)
    } else {
        1.0
    };
    base * mult
}

fn record_start_time(
    year: u16,
    day_of_year: u16,
    hour: u8,
    minute: u8,
    second: u8,
    frac_ticks: u16,
) -> Option<DateTime<Utc>> {
    let base = Utc
        .with_ymd_and_hms(year as i32, 1, 1, 0, 0, 0)
        .single()?;
    let nanos = frac_ticks as i64 * 100_000; // 0.0001s ticks
    Some(
        base + chrono::Duration::days(day_of_year as i64 - 1)
            + chrono::Duration::hours(hour as i64)
            + chrono::Duration::minutes(minute as i64)
            + chrono::Duration::seconds(second as i64)
            + chrono::Duration::nanoseconds(nanos),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_record(year: u16, doy: u16, h: u8, m: u8, s: u8, samples: &[i32]) -> Vec<u8> {
        let mut buf = vec![0u8; RECORD_LEN];
        buf[20..22].copy_from_slice(&year.to_be_bytes());
        buf[22..24].copy_from_slice(&doy.to_be_bytes());
        buf[24] = h;
        buf[25] = m;
        buf[26] = s;
        buf[30..34].copy_from_slice(&(samples.len() as u32).to_be_bytes());
        buf[34..36].copy_from_slice(&100i16.to_be_bytes()); // 100 Hz
        buf[36..38].copy_from_slice(&1i16.to_be_bytes());
        buf[46] = 0; // uncompressed int32 flag
        for (i, s) in samples.iter().enumerate() {
            let base = FIXED_HEADER_LEN + i * 4;
            buf[base..base + 4].copy_from_slice(&s.to_be_bytes());
        }
        buf
    }

    #[test]
    fn decodes_single_uncompressed_record() {
        let samples: Vec<i32> = (0..10).collect();
        let bytes = build_record(2025, 297, 0, 0, 0, &samples);
        let traces = decode_records(&bytes).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].samples, samples);
        assert_eq!(traces[0].sample_rate, 100.0);
    }

    #[test]
    fn rejects_steim_encoded_record() {
        let mut bytes = vec![0u8; RECORD_LEN];
        bytes[46] = STEIM_ENCODING_FLAG;
        let err = decode_records(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::Permanent(_)));
    }

    #[test]
    fn stops_cleanly_on_truncated_trailing_bytes() {
        let bytes = vec![0u8; FIXED_HEADER_LEN - 1];
        let traces = decode_records(&bytes).unwrap();
        assert!(traces.is_empty());
    }

    #[test]
    fn stops_when_declared_sample_count_exceeds_remaining_bytes() {
        let samples: Vec<i32> = (0..5).collect();
        let mut bytes = build_record(2025, 297, 0, 0, 0, &samples);
        bytes.truncate(FIXED_HEADER_LEN + 4); // header + 1 sample's worth, but header claims 5
        let traces = decode_records(&bytes).unwrap();
        assert!(traces.is_empty());
    }
}
