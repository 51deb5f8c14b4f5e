//! Progress reporting for a run (segments fetched, segments assembled).
//!
//! Purely observational: events are pushed with `try_send`, so a slow or
//! absent consumer never stalls the download.

/// One step of observable progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A segment finished downloading.
    SegmentFetched {
        done: usize,
        total: usize,
        name: String,
        bytes: u64,
    },
    /// A segment was appended to the output.
    SegmentAssembled { done: usize, total: usize },
}

impl ProgressEvent {
    /// Fraction of the current phase complete, in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        let (done, total) = match *self {
            ProgressEvent::SegmentFetched { done, total, .. } => (done, total),
            ProgressEvent::SegmentAssembled { done, total } => (done, total),
        };
        if total == 0 {
            return 1.0;
        }
        (done as f64 / total as f64).min(1.0)
    }
}

pub type ProgressSender = tokio::sync::mpsc::Sender<ProgressEvent>;

pub(crate) fn emit(progress: Option<&ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.try_send(event);
    }
}
