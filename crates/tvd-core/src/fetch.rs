//! Segment fetcher: one HTTP GET, body written verbatim to a staging file.
//!
//! Uses the curl crate (libcurl). Runs in the calling thread; the coordinator
//! calls it from its worker threads. No retries here.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::SegmentError;
use crate::segment::Segment;

/// Retrieves one segment into `dest`, returning the number of bytes written.
pub trait FetchSegment: Send + Sync {
    fn fetch(&self, segment: &Segment, dest: &Path) -> Result<u64, SegmentError>;
}

/// Transfer limits for segment GETs.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard cap for one segment.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(600),
        }
    }
}

/// libcurl-backed fetcher. Custom headers (e.g. client id, auth token) are
/// sent with every request.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    headers: HashMap<String, String>,
    options: FetchOptions,
}

impl HttpFetcher {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self {
            headers,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    fn configure(&self, easy: &mut curl::easy::Easy, url: &str) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(self.options.low_speed_limit)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        easy.timeout(self.options.timeout)?;
        if !self.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &self.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl FetchSegment for HttpFetcher {
    fn fetch(&self, segment: &Segment, dest: &Path) -> Result<u64, SegmentError> {
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, segment.source.as_str())
            .map_err(SegmentError::Curl)?;

        let file = File::create(dest).map_err(SegmentError::Storage)?;
        let mut writer = BufWriter::new(file);
        let mut written = 0u64;
        let mut write_error: Option<std::io::Error> = None;

        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match writer.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    write_error = Some(e);
                    // Short count makes curl abort with a write error.
                    Ok(0)
                }
            })
            .map_err(SegmentError::Curl)?;
        let performed = transfer.perform();
        drop(transfer);

        let result = match performed {
            Err(e) if e.is_write_error() => match write_error.take() {
                Some(io_err) => Err(SegmentError::Storage(io_err)),
                None => Err(SegmentError::Curl(e)),
            },
            Err(e) => Err(SegmentError::Curl(e)),
            Ok(()) => match easy.response_code().map_err(SegmentError::Curl)? {
                200..=299 => writer
                    .into_inner()
                    .map_err(|e| SegmentError::Storage(e.into_error()))
                    .and_then(|f| f.sync_all().map_err(SegmentError::Storage))
                    .map(|()| written),
                code => Err(SegmentError::Http(code)),
            },
        };

        if result.is_err() {
            let _ = fs::remove_file(dest);
        }
        result
    }
}
