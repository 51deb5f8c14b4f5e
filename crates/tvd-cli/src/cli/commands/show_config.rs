//! `tvd config` – print the effective configuration.

use anyhow::Result;
use tvd_core::config::TvdConfig;

pub fn run_show_config(cfg: &TvdConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(&cfg.privatized())?);
    Ok(())
}
