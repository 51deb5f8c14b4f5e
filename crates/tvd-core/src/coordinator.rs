//! Download coordinator: fans segment fetches out over a fixed worker pool.
//!
//! All jobs are queued up front on a bounded channel sized to the job count,
//! the queue is closed, and exactly `workers` threads pull from it until it
//! runs dry. Each job carries its own copy of the segment; results come back
//! tagged with the job index and are merged into the original order, so
//! completion order never leaks into the assembled output.
//!
//! The first failed job raises an abort flag. Workers then stop fetching and
//! answer each remaining job with `Skipped`, which keeps the one-result-per-job
//! accounting intact and lets every worker drain the queue and exit before the
//! error is returned.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::error::{SegmentError, TvdError};
use crate::fetch::FetchSegment;
use crate::progress::{emit, ProgressEvent, ProgressSender};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::sanitize::indexed_staging_name;
use crate::segment::Segment;

/// Parameters for one download run.
#[derive(Debug, Clone)]
pub struct DownloadOptions<'a> {
    /// Number of worker threads; must be at least 1.
    pub workers: usize,
    /// Directory that receives the staged segment files.
    pub staging_dir: &'a Path,
    /// `None` means a failed fetch fails the run immediately.
    pub retry: Option<RetryPolicy>,
}

/// One unit of work: a value copy of the segment with its staging path set.
#[derive(Debug)]
struct DownloadJob {
    index: usize,
    segment: Segment,
    dest: PathBuf,
}

/// What happened to one job.
#[derive(Debug)]
pub enum JobOutcome {
    Fetched { path: PathBuf, bytes: u64 },
    Failed(SegmentError),
    /// Not attempted because an earlier job failed.
    Skipped,
}

/// Outcome of one job, tagged with the job's index in the input list.
#[derive(Debug)]
pub struct DownloadResult {
    pub index: usize,
    pub name: String,
    pub outcome: JobOutcome,
}

/// Successful run: segments in input order, each with `staging_path` set.
#[derive(Debug)]
pub struct DownloadReport {
    pub segments: Vec<Segment>,
    pub workers_spawned: usize,
    pub bytes_fetched: u64,
}

/// Downloads every segment into `opts.staging_dir` using exactly
/// `opts.workers` threads. Any single failure fails the whole run with
/// `PartialDownloadFailure` naming the first segment that failed.
pub fn download_segments<F>(
    mut segments: Vec<Segment>,
    opts: &DownloadOptions<'_>,
    fetcher: &F,
    progress: Option<&ProgressSender>,
) -> Result<DownloadReport, TvdError>
where
    F: FetchSegment + ?Sized,
{
    if opts.workers == 0 {
        return Err(TvdError::InvalidWorkerCount(opts.workers));
    }
    let total = segments.len();

    let (job_tx, job_rx) = mpsc::sync_channel::<DownloadJob>(total);
    for (index, segment) in segments.iter().enumerate() {
        let dest = opts.staging_dir.join(indexed_staging_name(index, &segment.name));
        let mut copy = segment.clone();
        copy.staging_path = Some(dest.clone());
        if job_tx
            .send(DownloadJob {
                index,
                segment: copy,
                dest,
            })
            .is_err()
        {
            return Err(TvdError::WorkerLost);
        }
    }
    // Closed: workers exit once the queue is empty.
    drop(job_tx);

    tracing::info!(
        segments = total,
        workers = opts.workers,
        staging = %opts.staging_dir.display(),
        "starting segment downloads"
    );

    let job_rx = Mutex::new(job_rx);
    let abort = AtomicBool::new(false);
    let (result_tx, result_rx) = mpsc::channel::<DownloadResult>();
    let retry = opts.retry;

    let (first_error, bytes_fetched) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(opts.workers);
        for worker_id in 0..opts.workers {
            let results = result_tx.clone();
            let (jobs, abort) = (&job_rx, &abort);
            handles.push(scope.spawn(move || {
                run_worker(worker_id, jobs, results, abort, fetcher, retry.as_ref())
            }));
        }
        drop(result_tx);

        let mut first_error: Option<TvdError> = None;
        let mut bytes_fetched = 0u64;
        let mut done = 0usize;
        let mut received = 0usize;
        while received < total {
            let result = match result_rx.recv() {
                Ok(r) => r,
                Err(_) => {
                    first_error.get_or_insert(TvdError::WorkerLost);
                    break;
                }
            };
            received += 1;
            match result.outcome {
                JobOutcome::Fetched { path, bytes } => {
                    if first_error.is_some() {
                        continue;
                    }
                    segments[result.index].staging_path = Some(path);
                    bytes_fetched += bytes;
                    done += 1;
                    tracing::debug!(segment = %result.name, bytes, done, total, "segment fetched");
                    emit(
                        progress,
                        ProgressEvent::SegmentFetched {
                            done,
                            total,
                            name: result.name,
                            bytes,
                        },
                    );
                }
                JobOutcome::Failed(source) => {
                    abort.store(true, Ordering::Relaxed);
                    if first_error.is_none() {
                        tracing::warn!(segment = %result.name, error = %source, "segment failed; draining workers");
                        first_error = Some(TvdError::PartialDownloadFailure {
                            segment: result.name,
                            source,
                        });
                    } else {
                        tracing::debug!(segment = %result.name, error = %source, "additional segment failure");
                    }
                }
                JobOutcome::Skipped => {}
            }
        }

        for handle in handles {
            if handle.join().is_err() && first_error.is_none() {
                first_error = Some(TvdError::WorkerLost);
            }
        }
        (first_error, bytes_fetched)
    });

    if let Some(e) = first_error {
        return Err(e);
    }
    tracing::info!(segments = total, bytes = bytes_fetched, "all segments fetched");
    Ok(DownloadReport {
        segments,
        workers_spawned: opts.workers,
        bytes_fetched,
    })
}

fn run_worker<F>(
    worker_id: usize,
    jobs: &Mutex<Receiver<DownloadJob>>,
    results: Sender<DownloadResult>,
    abort: &AtomicBool,
    fetcher: &F,
    retry: Option<&RetryPolicy>,
) where
    F: FetchSegment + ?Sized,
{
    loop {
        let next = jobs.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let job = match next {
            Ok(job) => job,
            Err(_) => break,
        };
        let outcome = if abort.load(Ordering::Relaxed) {
            JobOutcome::Skipped
        } else {
            let fetched = match retry {
                Some(policy) => run_with_retry(
                    policy,
                    || abort.load(Ordering::Relaxed),
                    || fetcher.fetch(&job.segment, &job.dest),
                ),
                None => fetcher.fetch(&job.segment, &job.dest),
            };
            match fetched {
                Ok(bytes) => JobOutcome::Fetched {
                    path: job.dest,
                    bytes,
                },
                Err(e) => JobOutcome::Failed(e),
            }
        };
        let result = DownloadResult {
            index: job.index,
            name: job.segment.name,
            outcome,
        };
        if results.send(result).is_err() {
            break;
        }
    }
    tracing::trace!(worker_id, "download worker exiting");
}
