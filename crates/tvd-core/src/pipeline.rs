//! Pipeline entry point: prune, download into a staging dir, assemble.
//!
//! The staging directory is a `TempDir` owned by the run. It is removed when
//! the run ends, whether the download failed, assembly failed, or everything
//! succeeded.

use std::path::{Path, PathBuf};

use crate::assemble::{assemble, Concatenate};
use crate::coordinator::{download_segments, DownloadOptions};
use crate::error::TvdError;
use crate::fetch::FetchSegment;
use crate::progress::ProgressSender;
use crate::prune::{prune_segments, PrunedRange};
use crate::retry::RetryPolicy;
use crate::segment::Segment;
use crate::timespec::ResolvedWindow;

/// Everything the core needs for one run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub window: ResolvedWindow,
    /// Full ordered segment list of the stream.
    pub segments: Vec<Segment>,
    pub nominal_duration: u32,
    pub workers: usize,
    pub output_path: PathBuf,
    pub retry: Option<RetryPolicy>,
    /// Parent of the staging directory; system temp dir when `None`.
    pub staging_root: Option<PathBuf>,
}

/// Execution settings once the segment range is known.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub workers: usize,
    pub retry: Option<RetryPolicy>,
    pub staging_root: Option<PathBuf>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output_path: PathBuf,
    pub start_index: usize,
    pub end_index: usize,
    pub segment_count: usize,
    /// Covered duration in seconds (sum of segment durations).
    pub duration_secs: f64,
    pub bytes_fetched: u64,
    pub bytes_written: u64,
}

/// Resolves the segment range for `params.window` and runs it.
pub fn run(
    params: RunParams,
    fetcher: &dyn FetchSegment,
    concatenator: &dyn Concatenate,
    progress: Option<&ProgressSender>,
) -> Result<RunReport, TvdError> {
    let range = prune_segments(&params.segments, params.nominal_duration, &params.window)?;
    let options = ExecuteOptions {
        workers: params.workers,
        retry: params.retry,
        staging_root: params.staging_root,
    };
    run_pruned(
        range,
        &options,
        &params.output_path,
        fetcher,
        concatenator,
        progress,
    )
}

/// Downloads an already-pruned range and assembles it at `output_path`.
///
/// Used directly when the output name depends on the pruned duration.
pub fn run_pruned(
    range: PrunedRange,
    options: &ExecuteOptions,
    output_path: &Path,
    fetcher: &dyn FetchSegment,
    concatenator: &dyn Concatenate,
    progress: Option<&ProgressSender>,
) -> Result<RunReport, TvdError> {
    let staging = create_staging_dir(options.staging_root.as_deref())?;
    tracing::debug!(staging = %staging.path().display(), "created staging directory");

    let PrunedRange {
        start_index,
        end_index,
        segments,
        duration_secs,
    } = range;
    let segment_count = segments.len();

    let result = download_segments(
        segments,
        &DownloadOptions {
            workers: options.workers,
            staging_dir: staging.path(),
            retry: options.retry,
        },
        fetcher,
        progress,
    )
    .and_then(|report| {
        let written = assemble(&report.segments, output_path, concatenator, progress)?;
        Ok((report.bytes_fetched, written))
    });

    let staging_path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        tracing::warn!(
            staging = %staging_path.display(),
            error = %e,
            "failed to remove staging directory"
        );
    }

    let (bytes_fetched, bytes_written) = result?;
    Ok(RunReport {
        output_path: output_path.to_path_buf(),
        start_index,
        end_index,
        segment_count,
        duration_secs,
        bytes_fetched,
        bytes_written,
    })
}

fn create_staging_dir(root: Option<&Path>) -> Result<tempfile::TempDir, TvdError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("tvd_");
    let created = match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    created.map_err(|source| TvdError::Staging {
        root: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
        source,
    })
}
