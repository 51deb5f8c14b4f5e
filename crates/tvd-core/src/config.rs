use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sanitize::is_valid_file_prefix;
use crate::timespec::{self, format_time_mask, ResolvedWindow, TimeSpec};

const REDACTED: &str = "********";

/// Retry policy parameters (optional `[retry]` section in config.toml).
/// Absent means no retries: a failed segment fails the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per segment, including the first.
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 10,
        }
    }
}

/// How staged segments are joined: "bytes" (default) appends files as-is,
/// "ffmpeg" runs the external concat filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblerKind {
    #[default]
    Bytes,
    Ffmpeg,
}

impl AssemblerKind {
    /// Output file extension for this assembler.
    pub fn extension(&self) -> &'static str {
        match self {
            AssemblerKind::Bytes => "ts",
            AssemblerKind::Ffmpeg => "mp4",
        }
    }
}

impl std::str::FromStr for AssemblerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bytes" => Ok(AssemblerKind::Bytes),
            "ffmpeg" => Ok(AssemblerKind::Ffmpeg),
            other => Err(format!("unknown assembler '{other}' (expected 'bytes' or 'ffmpeg')")),
        }
    }
}

/// Run configuration, loaded from `~/.config/tvd/config.toml` and overridden
/// by command-line flags. Built once and passed into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TvdConfig {
    /// Numeric id of the stream; used in output names. 0 = unset.
    pub vod_id: u64,
    /// JSON segment manifest for the stream.
    pub manifest: Option<PathBuf>,
    /// Sent as `Client-ID` on segment requests.
    pub client_id: Option<String>,
    /// Sent as `Authorization: OAuth <token>` on segment requests.
    pub auth_token: Option<String>,
    /// `start` or "H M S".
    pub start_time: String,
    /// `end` or "H M S". Ignored when `length` is set.
    pub end_time: Option<String>,
    /// `full` or "H M S", relative to the start.
    pub length: Option<String>,
    pub file_prefix: Option<String>,
    pub output_folder: Option<PathBuf>,
    /// Number of concurrent segment downloads.
    pub workers: usize,
    pub assembler: AssemblerKind,
    pub retry: Option<RetryConfig>,
}

impl Default for TvdConfig {
    fn default() -> Self {
        Self {
            vod_id: 0,
            manifest: None,
            client_id: None,
            auth_token: None,
            start_time: timespec::START_MARKER.to_string(),
            end_time: None,
            length: None,
            file_prefix: None,
            output_folder: None,
            workers: 4,
            assembler: AssemblerKind::Bytes,
            retry: None,
        }
    }
}

/// Values that replace config-file values when present (CLI flags).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub vod_id: Option<u64>,
    pub manifest: Option<PathBuf>,
    pub client_id: Option<String>,
    pub auth_token: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub length: Option<String>,
    pub file_prefix: Option<String>,
    pub output_folder: Option<PathBuf>,
    pub workers: Option<usize>,
    pub assembler: Option<AssemblerKind>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl TvdConfig {
    /// Applies every non-empty override. `length` stays its own field and
    /// never rewrites `end_time`; precedence is decided when resolving.
    pub fn merge(&mut self, o: ConfigOverrides) {
        if let Some(v) = o.vod_id.filter(|v| *v != 0) {
            self.vod_id = v;
        }
        if let Some(v) = o.manifest {
            self.manifest = Some(v);
        }
        if let Some(v) = non_empty(o.client_id) {
            self.client_id = Some(v);
        }
        if let Some(v) = non_empty(o.auth_token) {
            self.auth_token = Some(v);
        }
        if let Some(v) = non_empty(o.start_time) {
            self.start_time = v;
        }
        if let Some(v) = non_empty(o.end_time) {
            self.end_time = Some(v);
        }
        if let Some(v) = non_empty(o.length) {
            self.length = Some(v);
        }
        if let Some(v) = non_empty(o.file_prefix) {
            self.file_prefix = Some(v);
        }
        if let Some(v) = o.output_folder {
            self.output_folder = Some(v);
        }
        if let Some(v) = o.workers.filter(|w| *w != 0) {
            self.workers = v;
        }
        if let Some(v) = o.assembler {
            self.assembler = v;
        }
    }

    /// Checks required fields are present and well-formed.
    pub fn validate(&self) -> Result<()> {
        if self.vod_id == 0 {
            bail!("vod_id missing");
        }
        if self.manifest.is_none() {
            bail!("manifest missing");
        }
        TimeSpec::parse_start(&self.start_time).context("start_time must be 'start' or \"H M S\"")?;
        match (non_empty(self.length.clone()), non_empty(self.end_time.clone())) {
            (Some(length), _) => {
                TimeSpec::parse_length(&length).context("length must be 'full' or \"H M S\"")?;
            }
            (None, Some(end)) => {
                TimeSpec::parse_end(&end).context("end_time must be 'end' or \"H M S\"")?;
            }
            (None, None) => bail!("must specify either end_time or length"),
        }
        if let Some(prefix) = &self.file_prefix {
            if !is_valid_file_prefix(prefix) {
                bail!("file_prefix contains invalid characters; got '{}'", prefix);
            }
        }
        if self.workers < 1 {
            bail!("workers must be an integer greater than 0; got {}", self.workers);
        }
        Ok(())
    }

    /// Copy with credentials masked, for logging and display.
    pub fn privatized(&self) -> Self {
        let mut c = self.clone();
        if c.client_id.is_some() {
            c.client_id = Some(REDACTED.to_string());
        }
        if c.auth_token.is_some() {
            c.auth_token = Some(REDACTED.to_string());
        }
        c
    }

    /// Resolves start/end/length into an absolute window.
    pub fn resolve_window(&self) -> Result<ResolvedWindow> {
        Ok(timespec::resolve_window(
            &self.start_time,
            self.end_time.as_deref(),
            self.length.as_deref(),
        )?)
    }

    /// Request headers derived from the credential fields.
    pub fn http_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(id) = non_empty(self.client_id.clone()) {
            headers.insert("Client-ID".to_string(), id);
        }
        if let Some(token) = non_empty(self.auth_token.clone()) {
            headers.insert("Authorization".to_string(), format!("OAuth {token}"));
        }
        headers
    }

    /// `[folder/][prefix]{vod_id}-{start}-{end}.{ext}` where end is the start
    /// plus the covered clip duration.
    pub fn output_path(&self, start_seconds: u64, clip_seconds: u64) -> PathBuf {
        let name = format!(
            "{}{}-{}-{}.{}",
            self.file_prefix.as_deref().unwrap_or(""),
            self.vod_id,
            format_time_mask(start_seconds),
            format_time_mask(start_seconds.saturating_add(clip_seconds)),
            self.assembler.extension()
        );
        match &self.output_folder {
            Some(folder) => folder.join(name),
            None => PathBuf::from(name),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tvd")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TvdConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TvdConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<TvdConfig> {
    tracing::debug!("loading config file {}", path.display());
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to load config file {}", path.display()))?;
    let cfg: TvdConfig = toml::from_str(&data)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timespec::WindowEnd;

    fn valid() -> TvdConfig {
        TvdConfig {
            vod_id: 123456,
            manifest: Some(PathBuf::from("vod.json")),
            end_time: Some("end".to_string()),
            ..TvdConfig::default()
        }
    }

    #[test]
    fn default_config_values() {
        let cfg = TvdConfig::default();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.start_time, "start");
        assert_eq!(cfg.assembler, AssemblerKind::Bytes);
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = valid();
        cfg.retry = Some(RetryConfig::default());
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TvdConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            vod_id = 987
            manifest = "/srv/vods/987.json"
            client_id = "abc"
            auth_token = "secret"
            start_time = "0 30 0"
            length = "0 5 0"
            file_prefix = "clip-"
            output_folder = "/srv/out"
            workers = 8
            assembler = "ffmpeg"

            [retry]
            max_attempts = 4
            base_delay_secs = 0.25
            max_delay_secs = 15
        "#;
        let cfg: TvdConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.vod_id, 987);
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.assembler, AssemblerKind::Ffmpeg);
        assert_eq!(cfg.length.as_deref(), Some("0 5 0"));
        assert!(cfg.end_time.is_none());
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert!((retry.base_delay_secs - 0.25).abs() < 1e-9);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: TvdConfig = toml::from_str("vod_id = 5").unwrap();
        assert_eq!(cfg.vod_id, 5);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.start_time, "start");
    }

    #[test]
    fn merge_replaces_only_present_values() {
        let mut cfg = valid();
        cfg.client_id = Some("from-file".to_string());
        cfg.merge(ConfigOverrides {
            workers: Some(12),
            client_id: Some(String::new()),
            start_time: Some("0 1 0".to_string()),
            ..ConfigOverrides::default()
        });
        assert_eq!(cfg.workers, 12);
        assert_eq!(cfg.client_id.as_deref(), Some("from-file"));
        assert_eq!(cfg.start_time, "0 1 0");
        assert_eq!(cfg.vod_id, 123456);
    }

    #[test]
    fn merged_length_keeps_end_and_still_wins() {
        let mut cfg = valid();
        cfg.end_time = Some("0 10 0".to_string());
        cfg.merge(ConfigOverrides {
            length: Some("0 5 0".to_string()),
            ..ConfigOverrides::default()
        });
        assert_eq!(cfg.end_time.as_deref(), Some("0 10 0"));
        assert_eq!(cfg.resolve_window().unwrap().end, WindowEnd::At(300));
    }

    #[test]
    fn validate_rejects_bad_values() {
        valid().validate().unwrap();

        let mut c = valid();
        c.vod_id = 0;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.manifest = None;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.start_time = "10:00".to_string();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.end_time = None;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.length = Some("forever".to_string());
        assert!(c.validate().is_err());

        let mut c = valid();
        c.file_prefix = Some("../x".to_string());
        assert!(c.validate().is_err());

        let mut c = valid();
        c.workers = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn privatized_masks_credentials() {
        let mut cfg = valid();
        cfg.client_id = Some("id".to_string());
        cfg.auth_token = Some("token".to_string());
        let p = cfg.privatized();
        assert_eq!(p.client_id.as_deref(), Some(REDACTED));
        assert_eq!(p.auth_token.as_deref(), Some(REDACTED));
        assert_eq!(p.vod_id, cfg.vod_id);
        assert!(valid().privatized().client_id.is_none());
    }

    #[test]
    fn credentials_become_headers() {
        let mut cfg = valid();
        assert!(cfg.http_headers().is_empty());
        cfg.client_id = Some("id".to_string());
        cfg.auth_token = Some("tok".to_string());
        let h = cfg.http_headers();
        assert_eq!(h.get("Client-ID").map(String::as_str), Some("id"));
        assert_eq!(h.get("Authorization").map(String::as_str), Some("OAuth tok"));
    }

    #[test]
    fn output_path_layout() {
        let mut cfg = valid();
        assert_eq!(
            cfg.output_path(15, 50),
            PathBuf::from("123456-0h0m15s-0h1m5s.ts")
        );
        cfg.file_prefix = Some("clip-".to_string());
        cfg.output_folder = Some(PathBuf::from("/srv/out"));
        cfg.assembler = AssemblerKind::Ffmpeg;
        assert_eq!(
            cfg.output_path(3600, 0),
            PathBuf::from("/srv/out/clip-123456-1h0m0s-1h0m0s.mp4")
        );
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        fs::write(&good, "vod_id = 7\nworkers = 2\n").unwrap();
        let cfg = load_from_path(&good).unwrap();
        assert_eq!(cfg.workers, 2);

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "workers = \"many\"").unwrap();
        let err = load_from_path(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }
}
