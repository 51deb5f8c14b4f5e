//! Segment pruning: resolved window to a sub-list of segments.
//!
//! Index math uses the stream's nominal (target) segment duration, not the
//! per-segment durations, so the selected slice is a best-effort
//! approximation of the requested window rather than frame-exact.

use std::ops::Range;

use crate::error::TvdError;
use crate::segment::{total_duration, Segment};
use crate::timespec::{ResolvedWindow, WindowEnd};

/// The slice of segments to download for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedRange {
    /// Index of the first selected segment in the full list.
    pub start_index: usize,
    /// One past the last selected segment in the full list.
    pub end_index: usize,
    pub segments: Vec<Segment>,
    /// Sum of the selected segments' durations, in list order.
    pub duration_secs: f64,
}

impl PrunedRange {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Covered duration truncated to whole seconds. For display (file names)
    /// only; never feed this back into index math.
    pub fn display_duration_secs(&self) -> u64 {
        self.duration_secs as u64
    }
}

fn to_index(seconds: u64, nominal_duration: u32) -> usize {
    usize::try_from(seconds / u64::from(nominal_duration)).unwrap_or(usize::MAX)
}

/// Index range `[start, end)` selected by `window` over `available` segments.
pub fn segment_index_range(
    available: usize,
    nominal_duration: u32,
    window: &ResolvedWindow,
) -> Result<Range<usize>, TvdError> {
    if nominal_duration == 0 {
        return Err(TvdError::InvalidNominalDuration);
    }
    let start_index = to_index(window.start_seconds, nominal_duration);
    let end_index = match window.end {
        WindowEnd::ToEnd => available,
        WindowEnd::At(secs) => to_index(secs, nominal_duration).min(available),
    };
    if start_index >= end_index || start_index >= available {
        return Err(TvdError::EmptyRange {
            start_index,
            end_index,
            available,
        });
    }
    Ok(start_index..end_index)
}

/// Selects the segments covered by `window` and computes their true duration.
pub fn prune_segments(
    segments: &[Segment],
    nominal_duration: u32,
    window: &ResolvedWindow,
) -> Result<PrunedRange, TvdError> {
    let range = segment_index_range(segments.len(), nominal_duration, window)?;
    let selected = segments[range.clone()].to_vec();
    let duration_secs = total_duration(&selected);
    tracing::debug!(
        start_index = range.start,
        end_index = range.end,
        available = segments.len(),
        duration_secs,
        "pruned segment list"
    );
    Ok(PrunedRange {
        start_index: range.start,
        end_index: range.end,
        segments: selected,
        duration_secs,
    })
}
