//! Where the ordered segment list comes from.
//!
//! The pipeline only needs the segments in playlist order plus the stream's
//! nominal segment duration. `ManifestSource` reads both from a JSON manifest
//! that some upstream step (playlist fetcher, access-token exchange) produced:
//!
//! ```json
//! {
//!   "target_duration": 10,
//!   "base_url": "https://cdn.example.com/vod/1234/chunked/",
//!   "segments": [
//!     { "duration": 10.0, "uri": "0.ts" },
//!     { "name": "intro", "duration": 9.96, "uri": "https://other.example.com/1.ts" }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::segment::Segment;

/// Ordered segments plus the advertised per-segment duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentList {
    pub segments: Vec<Segment>,
    pub nominal_duration: u32,
}

/// Supplies the segment list for one stream.
pub trait SegmentSource {
    fn load(&self) -> Result<SegmentList>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    target_duration: u32,
    #[serde(default)]
    base_url: Option<Url>,
    segments: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    name: Option<String>,
    duration: f64,
    uri: String,
}

/// Reads a JSON segment manifest from disk.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses manifest text; relative URIs are resolved against `base_url`.
    pub fn parse(text: &str) -> Result<SegmentList> {
        let manifest: Manifest = serde_json::from_str(text).context("invalid segment manifest")?;
        if manifest.target_duration == 0 {
            bail!("manifest target_duration must be greater than zero");
        }
        let mut segments = Vec::with_capacity(manifest.segments.len());
        for (i, entry) in manifest.segments.into_iter().enumerate() {
            if !entry.duration.is_finite() || entry.duration < 0.0 {
                bail!("segment {} has invalid duration {}", i, entry.duration);
            }
            let source = match &manifest.base_url {
                Some(base) => base.join(&entry.uri),
                None => Url::parse(&entry.uri),
            }
            .with_context(|| format!("segment {} has invalid uri '{}'", i, entry.uri))?;
            let name = entry.name.unwrap_or_else(|| default_name(&entry.uri));
            segments.push(Segment::new(name, entry.duration, source));
        }
        Ok(SegmentList {
            segments,
            nominal_duration: manifest.target_duration,
        })
    }
}

/// Last path component of `uri` without query or fragment.
fn default_name(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    match path.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => uri.to_string(),
    }
}

impl SegmentSource for ManifestSource {
    fn load(&self) -> Result<SegmentList> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read manifest {}", self.path.display()))?;
        let list = Self::parse(&text)
            .with_context(|| format!("failed to load manifest {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            segments = list.segments.len(),
            nominal_duration = list.nominal_duration,
            "loaded segment manifest"
        );
        Ok(list)
    }
}
