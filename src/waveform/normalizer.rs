//! Waveform Normalizer (C3, §4.3): turns one or more archive traces into a
//! single second-aligned, gap-filled int32 array.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::archive::Trace;
use crate::model::Gap;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("no usable data after trimming to a whole-second boundary")]
    NoUsableData,

    #[error("malformed input: {0}")]
    Malformed(String),
}

/// A second-aligned, gap-filled window ready for chunking (§3 "Continuous array").
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sample_rate: f64,
    pub samples: Vec<i32>,
    pub gaps: Vec<Gap>,
}

/// Run the full C3 pipeline: dedupe overlapping traces, order them, fill
/// gaps by linear interpolation, and trim to the whole-second boundary
/// nearest the requested window's end.
pub fn normalize(
    mut traces: Vec<Trace>,
    requested_start: DateTime<Utc>,
    requested_end: DateTime<Utc>,
    sample_rate: f64,
) -> Result<NormalizedWindow, NormalizeError> {
    if sample_rate <= 0.0 {
        return Err(NormalizeError::Malformed("sample_rate must be positive".into()));
    }

    traces.sort_by_key(|t| t.start);
    dedupe_overlaps(&mut traces);

    if traces.is_empty() {
        // All-gap interval: one synthetic gap across the whole request.
        let duration = (requested_end - requested_start).num_milliseconds() as f64 / 1000.0;
        let n = (duration * sample_rate).round() as u64;
        if n == 0 {
            return Err(NormalizeError::NoUsableData);
        }
        return Ok(NormalizedWindow {
            start: requested_start,
            end: requested_end,
            sample_rate,
            samples: vec![0; n as usize],
            gaps: vec![Gap::new(requested_start, requested_end, sample_rate)],
        });
    }

    let array_start = traces[0].start.max(requested_start - chrono::Duration::seconds(1));
    let mut samples: Vec<i32> = Vec::new();
    let mut gaps: Vec<Gap> = Vec::new();
    let mut cursor = traces[0].start;
    let half_sample_seconds = 0.5 / sample_rate;

    for trace in &traces {
        let gap_seconds = (trace.start - cursor).num_milliseconds() as f64 / 1000.0;
        if gap_seconds > half_sample_seconds {
            let fill_count = (gap_seconds * sample_rate).round() as usize;
            let before = samples.last().copied().unwrap_or(0);
            let after = trace.samples.first().copied().unwrap_or(before);
            for i in 0..fill_count {
                let t = (i + 1) as f64 / (fill_count + 1) as f64;
                samples.push(lerp(before, after, t));
            }
            gaps.push(Gap::new(cursor, trace.start, sample_rate));
        } else if gap_seconds < -half_sample_seconds {
            warn!(
                trace_start = %trace.start,
                cursor = %cursor,
                "overlapping trace after dedupe; truncating overlap"
            );
            let overlap_samples = ((-gap_seconds) * sample_rate).round() as usize;
            if overlap_samples < trace.samples.len() {
                samples.extend_from_slice(&trace.samples[overlap_samples..]);
                cursor = trace_end(trace, sample_rate);
                continue;
            } else {
                continue;
            }
        }

        samples.extend_from_slice(&trace.samples);
        cursor = trace_end(trace, sample_rate);
    }

    let array_end = cursor;

    // `samples[0]` was built from `traces[0].start`, but `array_start` may sit
    // later (the archive returned more lead-in than the one-second tolerance
    // allows). Drop the excess so `samples[0]` always corresponds to `array_start`.
    if array_start > traces[0].start {
        let leading_seconds = (array_start - traces[0].start).num_milliseconds() as f64 / 1000.0;
        let leading_count = (leading_seconds * sample_rate).round() as usize;
        samples.drain(..leading_count.min(samples.len()));

        gaps.retain(|g| g.end > array_start);
        for g in &mut gaps {
            if g.start < array_start {
                *g = Gap::new(array_start, g.end, sample_rate);
            }
        }
    }

    // Trim to the whole-second boundary at or before the earlier of
    // (data actually available) and (the requested end), per I2.
    let trim_end = array_end.min(requested_end);
    let whole_second_end = trim_seconds(array_start, trim_end, sample_rate);

    let final_len_seconds = (whole_second_end - array_start).num_milliseconds() as f64 / 1000.0;
    let final_samples_count = (final_len_seconds * sample_rate).round().max(0.0) as usize;

    if final_samples_count == 0 {
        return Err(NormalizeError::NoUsableData);
    }

    samples.truncate(final_samples_count.min(samples.len()));
    if samples.len() < final_samples_count {
        return Err(NormalizeError::NoUsableData);
    }

    gaps.retain(|g| g.start < whole_second_end);
    for g in &mut gaps {
        if g.end > whole_second_end {
            *g = Gap::new(g.start, whole_second_end, sample_rate);
        }
    }

    Ok(NormalizedWindow {
        start: array_start,
        end: whole_second_end,
        sample_rate,
        samples,
        gaps,
    })
}

fn trace_end(trace: &Trace, sample_rate: f64) -> DateTime<Utc> {
    trace.start
        + chrono::Duration::milliseconds((trace.samples.len() as f64 / sample_rate * 1000.0).round() as i64)
}

fn lerp(a: i32, b: i32, t: f64) -> i32 {
    (a as f64 + (b as f64 - a as f64) * t).round() as i32
}

/// Round `end` down to the nearest whole second after `start` (I2).
fn trim_seconds(start: DateTime<Utc>, end: DateTime<Utc>, _sample_rate: f64) -> DateTime<Utc> {
    let elapsed = end - start;
    let whole_seconds = elapsed.num_seconds();
    start + chrono::Duration::seconds(whole_seconds)
}

/// Drop traces that are fully contained in an earlier trace's span,
/// preferring the earlier segment (§4.3 step 1).
fn dedupe_overlaps(traces: &mut Vec<Trace>) {
    let mut kept: Vec<Trace> = Vec::with_capacity(traces.len());
    for trace in traces.drain(..) {
        if let Some(last) = kept.last() {
            let last_end = last.start
                + chrono::Duration::milliseconds(
                    (last.samples.len() as f64 / last.sample_rate * 1000.0).round() as i64,
                );
            if trace.start >= last.start && trace.start < last_end {
                let this_end = trace.start
                    + chrono::Duration::milliseconds(
                        (trace.samples.len() as f64 / trace.sample_rate * 1000.0).round() as i64,
                    );
                if this_end <= last_end {
                    // fully contained in the previous trace; drop it
                    continue;
                }
            }
        }
        kept.push(trace);
    }
    *traces = kept;
}

/// A single-pole IIR high-pass filter applied over the trimmed array
/// (§4.3 implementation supplement) — the one piece of signal processing
/// the system performs.
pub fn apply_highpass(samples: &mut [i32], sample_rate: f64, corner_hz: f64) {
    if samples.is_empty() || corner_hz <= 0.0 {
        return;
    }
    let dt = 1.0 / sample_rate;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * corner_hz);
    let alpha = rc / (rc + dt);

    let mut prev_in = samples[0] as f64;
    let mut prev_out = 0.0f64;
    for s in samples.iter_mut() {
        let x = *s as f64;
        let y = alpha * (prev_out + x - prev_in);
        prev_in = x;
        prev_out = y;
        *s = y.round() as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs_from_epoch_day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 24, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs_from_epoch_day)
    }

    #[test]
    fn single_contiguous_trace_trims_to_whole_seconds() {
        let samples: Vec<i32> = (0..250).collect(); // 2.5s at 100Hz
        let trace = Trace {
            start: t(0),
            sample_rate: 100.0,
            samples,
        };
        let window = normalize(vec![trace], t(0), t(10), 100.0).unwrap();
        assert_eq!(window.samples.len(), 200); // trimmed to 2.0s
        assert!(window.gaps.is_empty());
    }

    #[test]
    fn gap_between_traces_is_interpolated_and_recorded() {
        let first = Trace {
            start: t(0),
            sample_rate: 100.0,
            samples: vec![10; 100],
        };
        let second = Trace {
            start: t(2),
            sample_rate: 100.0,
            samples: vec![20; 100],
        };
        let window = normalize(vec![first, second], t(0), t(3), 100.0).unwrap();
        assert_eq!(window.gaps.len(), 1);
        assert_eq!(window.gaps[0].samples_filled, 100);
        // total: 100 real + 100 interpolated + 100 real = 300 samples over 3s
        assert_eq!(window.samples.len(), 300);
    }

    #[test]
    fn empty_input_becomes_all_gap_window() {
        let window = normalize(vec![], t(0), t(5), 100.0).unwrap();
        assert_eq!(window.samples.len(), 500);
        assert_eq!(window.gaps.len(), 1);
    }

    #[test]
    fn leading_excess_data_is_trimmed_so_start_matches_first_sample() {
        let trace = Trace {
            start: t(0),
            sample_rate: 100.0,
            samples: (0..1000).collect(), // 10s ramp, value == sample index
        };
        let window = normalize(vec![trace], t(5), t(8), 100.0).unwrap();
        assert_eq!(window.start, t(4)); // requested_start - 1s tolerance
        assert_eq!(window.samples[0], 400); // the sample actually at t(4)
        assert_eq!(window.samples.len(), 400);
    }

    #[test]
    fn zero_length_after_trim_is_no_usable_data() {
        let trace = Trace {
            start: t(0),
            sample_rate: 100.0,
            samples: vec![1; 10], // only 0.1s, trims to 0
        };
        let err = normalize(vec![trace], t(0), t(10), 100.0).unwrap_err();
        assert!(matches!(err, NormalizeError::NoUsableData));
    }

    #[test]
    fn highpass_removes_constant_dc_offset() {
        let mut samples = vec![1000i32; 1000];
        apply_highpass(&mut samples, 100.0, 1.0);
        let tail_avg: f64 = samples[900..].iter().map(|&s| s as f64).sum::<f64>() / 100.0;
        assert!(tail_avg.abs() < 50.0);
    }
}
