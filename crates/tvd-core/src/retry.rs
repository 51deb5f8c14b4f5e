//! Optional retry for segment fetches.
//!
//! The baseline pipeline never retries: a failed segment fails the run. When
//! a `[retry]` section is configured, the coordinator wraps each fetch in
//! `run_with_retry`, which retries transient failures (timeouts, connection
//! drops, 429/5xx) with capped exponential backoff.

use std::time::{Duration, Instant};

use crate::config::RetryConfig;
use crate::error::SegmentError;

/// Retry-relevant classification of a segment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    /// 429 / 503.
    Throttled,
    Connection,
    Http5xx(u16),
    /// Anything else (4xx, staging I/O, bad URL); never retried.
    Permanent,
}

pub fn classify(e: &SegmentError) -> ErrorKind {
    match e {
        SegmentError::Http(code) => match *code {
            429 | 503 => ErrorKind::Throttled,
            500..=599 => ErrorKind::Http5xx(*code as u16),
            _ => ErrorKind::Permanent,
        },
        SegmentError::Curl(ce) => {
            if ce.is_operation_timedout() {
                ErrorKind::Timeout
            } else if ce.is_couldnt_connect()
                || ce.is_couldnt_resolve_host()
                || ce.is_recv_error()
                || ce.is_send_error()
                || ce.is_got_nothing()
                || ce.is_partial_file()
            {
                ErrorKind::Connection
            } else {
                ErrorKind::Permanent
            }
        }
        SegmentError::Storage(_) => ErrorKind::Permanent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per segment, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0).min(3600.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` to give up.
    /// `attempt` is 1-based: the attempt that just failed.
    pub fn backoff(&self, attempt: u32, kind: ErrorKind) -> Option<Duration> {
        if attempt >= self.max_attempts || kind == ErrorKind::Permanent {
            return None;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(10);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

/// Slice length for backoff sleeps so a stop request is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Runs `fetch` until it succeeds or the policy gives up; returns the last error.
///
/// `should_stop` is polled during backoff and before every retry. Once it
/// returns true no further attempt is made and the last error is returned.
pub fn run_with_retry<T, F, S>(
    policy: &RetryPolicy,
    should_stop: S,
    mut fetch: F,
) -> Result<T, SegmentError>
where
    F: FnMut() -> Result<T, SegmentError>,
    S: Fn() -> bool,
{
    let mut attempt = 1u32;
    loop {
        match fetch() {
            Ok(v) => return Ok(v),
            Err(e) => match policy.backoff(attempt, classify(&e)) {
                None => return Err(e),
                Some(delay) => {
                    tracing::debug!(attempt, ?delay, error = %e, "retrying segment fetch");
                    if !sleep_unless_stopped(delay, &should_stop) {
                        tracing::debug!(attempt, "retry abandoned; run is stopping");
                        return Err(e);
                    }
                    attempt += 1;
                }
            },
        }
    }
}

/// Sleeps for `delay`; returns false as soon as `should_stop` fires.
fn sleep_unless_stopped<S: Fn() -> bool>(delay: Duration, should_stop: &S) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if should_stop() {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return !should_stop();
        }
        std::thread::sleep(left.min(STOP_POLL));
    }
}
