//! CLI command handlers, one file per subcommand.

mod fetch;
mod plan;
mod show_config;

pub use fetch::run_fetch;
pub use plan::run_plan;
pub use show_config::run_show_config;

use anyhow::{Context, Result};
use tvd_core::config::TvdConfig;
use tvd_core::source::{ManifestSource, SegmentList, SegmentSource};

/// Reads the configured manifest on a blocking thread.
async fn load_segments(cfg: &TvdConfig) -> Result<SegmentList> {
    let path = cfg.manifest.clone().context("manifest missing")?;
    tokio::task::spawn_blocking(move || ManifestSource::new(path).load())
        .await
        .context("manifest loader panicked")?
}
