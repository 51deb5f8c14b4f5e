//! Segment: one individually downloadable chunk of the stream.

use std::path::PathBuf;
use url::Url;

/// One chunk of the stream, in playlist order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Name as given by the source (used for the staging file name).
    pub name: String,
    /// Duration in seconds as advertised for this segment.
    pub duration: f64,
    /// Absolute locator of the segment bytes.
    pub source: Url,
    /// Where the segment was staged; set by the coordinator.
    pub staging_path: Option<PathBuf>,
}

impl Segment {
    pub fn new(name: impl Into<String>, duration: f64, source: Url) -> Self {
        Self {
            name: name.into(),
            duration,
            source,
            staging_path: None,
        }
    }
}

/// Sum of advertised durations, in list order.
pub fn total_duration(segments: &[Segment]) -> f64 {
    segments.iter().map(|s| s.duration).sum()
}
