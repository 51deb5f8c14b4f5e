//! Error taxonomy for the download pipeline.
//!
//! `TvdError` is what every core entry point returns. `SegmentError` is the
//! narrower failure of a single segment fetch; the coordinator wraps the first
//! one it sees into `TvdError::PartialDownloadFailure`.

use std::fmt;
use std::path::PathBuf;

/// Failure of one segment fetch (network, HTTP status, or staging file I/O).
#[derive(Debug)]
pub enum SegmentError {
    /// libcurl reported an error (timeout, connection, DNS, ...).
    Curl(curl::Error),
    /// Server answered with a non-2xx status.
    Http(u32),
    /// Creating or writing the staging file failed.
    Storage(std::io::Error),
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::Storage(e) => write!(f, "staging write: {}", e),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            SegmentError::Http(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TvdError {
    /// Malformed time spec; user input error, never retried.
    #[error("invalid time input '{input}': {reason}")]
    InvalidTimeFormat { input: String, reason: String },

    /// Resolved window selects no segments.
    #[error(
        "time range selects no segments (start index {start_index}, end index {end_index}, {available} segments available)"
    )]
    EmptyRange {
        start_index: usize,
        end_index: usize,
        available: usize,
    },

    #[error("nominal segment duration must be greater than zero")]
    InvalidNominalDuration,

    #[error("worker count must be at least 1; got {0}")]
    InvalidWorkerCount(usize),

    /// One segment failed; the whole run is abandoned.
    #[error("segment '{segment}' failed to download: {source}")]
    PartialDownloadFailure {
        segment: String,
        #[source]
        source: SegmentError,
    },

    /// A worker went away without reporting every job (panicked fetcher).
    #[error("download worker exited before reporting all results")]
    WorkerLost,

    #[error("assembly failed: {reason}")]
    Assembly {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("failed to create staging directory under {}", .root.display())]
    Staging {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TvdError {
    pub(crate) fn invalid_time(input: &str, reason: impl Into<String>) -> Self {
        TvdError::InvalidTimeFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn assembly(reason: impl Into<String>) -> Self {
        TvdError::Assembly {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn assembly_io(reason: impl Into<String>, source: std::io::Error) -> Self {
        TvdError::Assembly {
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Name of the failing segment, when the error is tied to one.
    pub fn failed_segment(&self) -> Option<&str> {
        match self {
            TvdError::PartialDownloadFailure { segment, .. } => Some(segment),
            _ => None,
        }
    }
}
