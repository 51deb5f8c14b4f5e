//! Time range resolution.
//!
//! Users give times as `"H M S"` (three space-separated integers, each field
//! unbounded, so `"0 90 0"` is ninety minutes) or as a marker: `start` for the
//! beginning, `end` for "through the last segment", `full` as a length meaning
//! the same. A length, when given, always overrides an explicit end.

use crate::error::TvdError;

pub const START_MARKER: &str = "start";
pub const END_MARKER: &str = "end";
pub const FULL_MARKER: &str = "full";

/// A parsed time specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// `start`: offset zero.
    Start,
    /// `end`: through the last available segment.
    End,
    /// `full` (as a length): through the last available segment.
    Full,
    /// Literal `(hours, minutes, seconds)`.
    Hms { hours: u64, minutes: u64, seconds: u64 },
}

impl TimeSpec {
    /// Parses a start spec: `start` or `"H M S"`.
    pub fn parse_start(input: &str) -> Result<Self, TvdError> {
        Self::parse_with_marker(input, START_MARKER, TimeSpec::Start)
    }

    /// Parses an end spec: `end` or `"H M S"`.
    pub fn parse_end(input: &str) -> Result<Self, TvdError> {
        Self::parse_with_marker(input, END_MARKER, TimeSpec::End)
    }

    /// Parses a length spec: `full` or `"H M S"`.
    pub fn parse_length(input: &str) -> Result<Self, TvdError> {
        Self::parse_with_marker(input, FULL_MARKER, TimeSpec::Full)
    }

    fn parse_with_marker(input: &str, marker: &str, spec: TimeSpec) -> Result<Self, TvdError> {
        if input == marker {
            return Ok(spec);
        }
        let [hours, minutes, seconds] = parse_fields(input)?;
        Ok(TimeSpec::Hms {
            hours,
            minutes,
            seconds,
        })
    }

    /// Total seconds for a literal triple; `None` for markers.
    pub fn literal_seconds(&self) -> Option<u64> {
        match *self {
            TimeSpec::Hms {
                hours,
                minutes,
                seconds,
            } => hours
                .checked_mul(3600)
                .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
                .and_then(|hm| hm.checked_add(seconds)),
            _ => None,
        }
    }
}

fn parse_fields(input: &str) -> Result<[u64; 3], TvdError> {
    let fields: Vec<&str> = input.split(' ').collect();
    if fields.len() != 3 {
        return Err(TvdError::invalid_time(
            input,
            "time input must be in format \"H M S\"",
        ));
    }
    let mut out = [0u64; 3];
    for (slot, field) in out.iter_mut().zip(&fields) {
        *slot = field.parse::<u64>().map_err(|_| {
            TvdError::invalid_time(input, "all time inputs must be non-negative integers")
        })?;
    }
    Ok(out)
}

/// Parses `"H M S"` into total seconds (`h*3600 + m*60 + s`).
pub fn parse_hms(input: &str) -> Result<u64, TvdError> {
    let [hours, minutes, seconds] = parse_fields(input)?;
    TimeSpec::Hms {
        hours,
        minutes,
        seconds,
    }
    .literal_seconds()
    .ok_or_else(|| TvdError::invalid_time(input, "time input is too large"))
}

/// Upper bound of a resolved window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEnd {
    /// Absolute offset in seconds.
    At(u64),
    /// Through the last available segment (the `-1` sentinel).
    ToEnd,
}

impl WindowEnd {
    /// Signed rendering where `-1` stands for `ToEnd`.
    pub fn as_signed(&self) -> i64 {
        match *self {
            WindowEnd::At(secs) => i64::try_from(secs).unwrap_or(i64::MAX),
            WindowEnd::ToEnd => -1,
        }
    }
}

/// Absolute window derived once per run from the user's time specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub start_seconds: u64,
    pub end: WindowEnd,
}

impl ResolvedWindow {
    pub fn to_end(start_seconds: u64) -> Self {
        Self {
            start_seconds,
            end: WindowEnd::ToEnd,
        }
    }
}

/// Resolves start plus (length | end) into absolute seconds.
///
/// Empty strings count as absent. When both `end` and `length` are present the
/// length wins and the end is ignored.
pub fn resolve_window(
    start: &str,
    end: Option<&str>,
    length: Option<&str>,
) -> Result<ResolvedWindow, TvdError> {
    let start_seconds = match TimeSpec::parse_start(start)? {
        TimeSpec::Start => 0,
        spec => spec
            .literal_seconds()
            .ok_or_else(|| TvdError::invalid_time(start, "time input is too large"))?,
    };

    let length = length.filter(|l| !l.is_empty());
    let end = end.filter(|e| !e.is_empty());

    let window_end = match (length, end) {
        (Some(length), _) => match TimeSpec::parse_length(length)? {
            TimeSpec::Full => WindowEnd::ToEnd,
            spec => {
                let secs = spec
                    .literal_seconds()
                    .and_then(|l| start_seconds.checked_add(l))
                    .ok_or_else(|| TvdError::invalid_time(length, "time input is too large"))?;
                WindowEnd::At(secs)
            }
        },
        (None, Some(end)) => match TimeSpec::parse_end(end)? {
            TimeSpec::End => WindowEnd::ToEnd,
            spec => {
                let secs = spec
                    .literal_seconds()
                    .ok_or_else(|| TvdError::invalid_time(end, "time input is too large"))?;
                if secs < start_seconds {
                    return Err(TvdError::invalid_time(end, "end time is before start time"));
                }
                WindowEnd::At(secs)
            }
        },
        (None, None) => {
            return Err(TvdError::invalid_time(
                "",
                "must specify either an end time or a length",
            ))
        }
    };

    Ok(ResolvedWindow {
        start_seconds,
        end: window_end,
    })
}

/// Renders seconds as `"{h}h{m}m{s}s"`, the form used in output file names.
pub fn format_time_mask(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = total_seconds % 3600 / 60;
    let seconds = total_seconds % 60;
    format!("{}h{}m{}s", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_fields_are_unbounded() {
        assert_eq!(parse_hms("0 0 15").unwrap(), 15);
        assert_eq!(parse_hms("1 2 3").unwrap(), 3723);
        assert_eq!(parse_hms("0 90 0").unwrap(), 5400);
        assert_eq!(parse_hms("0 0 4000").unwrap(), 4000);
    }

    #[test]
    fn hms_rejects_wrong_token_count() {
        for input in ["", "0 0", "0 0 0 0", "0  0 0", "1:2:3"] {
            assert!(
                matches!(parse_hms(input), Err(TvdError::InvalidTimeFormat { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn hms_rejects_non_integers() {
        for input in ["a b c", "0 -1 0", "0 1.5 0", "0 0 x"] {
            assert!(
                matches!(parse_hms(input), Err(TvdError::InvalidTimeFormat { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn start_marker_is_zero() {
        let w = resolve_window("start", Some("0 1 0"), None).unwrap();
        assert_eq!(w.start_seconds, 0);
        assert_eq!(w.end, WindowEnd::At(60));
    }

    #[test]
    fn length_is_relative_to_start() {
        let w = resolve_window("0 0 30", None, Some("0 1 0")).unwrap();
        assert_eq!(w.start_seconds, 30);
        assert_eq!(w.end, WindowEnd::At(90));
    }

    #[test]
    fn full_length_and_end_marker_are_to_end() {
        let full = resolve_window("0 0 0", None, Some("full")).unwrap();
        assert_eq!(full.end, WindowEnd::ToEnd);
        assert_eq!(full.end.as_signed(), -1);
        let end = resolve_window("0 5 0", Some("end"), None).unwrap();
        assert_eq!(end, ResolvedWindow::to_end(300));
    }

    #[test]
    fn length_overrides_explicit_end() {
        let both = resolve_window("0 0 0", Some("0 10 0"), Some("0 5 0")).unwrap();
        let length_only = resolve_window("0 0 0", None, Some("0 5 0")).unwrap();
        assert_eq!(both, length_only);
        assert_eq!(both.end, WindowEnd::At(300));
    }

    #[test]
    fn empty_length_falls_back_to_end() {
        let w = resolve_window("0 0 0", Some("0 2 0"), Some("")).unwrap();
        assert_eq!(w.end, WindowEnd::At(120));
    }

    #[test]
    fn missing_end_and_length_is_rejected() {
        assert!(matches!(
            resolve_window("start", None, None),
            Err(TvdError::InvalidTimeFormat { .. })
        ));
        assert!(resolve_window("start", Some(""), Some("")).is_err());
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(matches!(
            resolve_window("0 10 0", Some("0 5 0"), None),
            Err(TvdError::InvalidTimeFormat { .. })
        ));
    }

    #[test]
    fn markers_only_valid_in_their_slot() {
        assert!(resolve_window("end", Some("end"), None).is_err());
        assert!(resolve_window("start", Some("full"), None).is_err());
        assert!(resolve_window("start", None, Some("end")).is_err());
    }

    #[test]
    fn start_never_exceeds_literal_end() {
        let starts = ["start", "0 0 0", "0 0 59", "0 1 0", "1 0 0", "0 0 7"];
        let ends = ["end", "0 0 59", "0 1 0", "1 0 0", "2 0 0"];
        let lengths = ["full", "0 0 0", "0 0 1", "0 30 0"];
        for s in starts {
            for e in ends {
                if let Ok(w) = resolve_window(s, Some(e), None) {
                    if let WindowEnd::At(end) = w.end {
                        assert!(w.start_seconds <= end, "start={s} end={e}");
                    }
                }
            }
            for l in lengths {
                let w = resolve_window(s, None, Some(l)).unwrap();
                if let WindowEnd::At(end) = w.end {
                    assert!(w.start_seconds <= end, "start={s} length={l}");
                }
            }
        }
    }

    #[test]
    fn time_mask_format() {
        assert_eq!(format_time_mask(0), "0h0m0s");
        assert_eq!(format_time_mask(3723), "1h2m3s");
        assert_eq!(format_time_mask(59), "0h0m59s");
        assert_eq!(format_time_mask(36000), "10h0m0s");
    }
}
