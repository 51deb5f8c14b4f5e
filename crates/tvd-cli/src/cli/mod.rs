//! CLI for tvd.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tvd_core::config::{self, AssemblerKind, ConfigOverrides, TvdConfig};

use commands::{run_fetch, run_plan, run_show_config};

/// Top-level CLI for tvd.
#[derive(Debug, Parser)]
#[command(name = "tvd")]
#[command(about = "tvd: download a time window of a segmented stream", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/tvd/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which stream to read.
#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct SourceArgs {
    /// Numeric stream id (used in the output name).
    #[arg(long, value_name = "ID")]
    pub vod_id: Option<u64>,

    /// JSON segment manifest for the stream.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Sent as the Client-ID header on segment requests.
    #[arg(long, value_name = "ID")]
    pub client_id: Option<String>,

    /// Sent as "Authorization: OAuth <TOKEN>" on segment requests.
    #[arg(long, value_name = "TOKEN")]
    pub auth_token: Option<String>,
}

/// Time window. Times are "start"/"end"/"full" or "H M S" (quoted).
#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct WindowArgs {
    /// Window start: "start" or "H M S".
    #[arg(long, value_name = "TIME")]
    pub start: Option<String>,

    /// Window end: "end" or "H M S". Ignored when --length is given.
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    /// Window length from the start: "full" or "H M S".
    #[arg(long, value_name = "TIME")]
    pub length: Option<String>,
}

/// Where and how the output is written.
#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct OutputArgs {
    /// Prepended to the output file name.
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Output directory (created if missing).
    #[arg(long, value_name = "DIR")]
    pub folder: Option<PathBuf>,

    /// Concurrent segment downloads.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// "bytes" (plain .ts concatenation) or "ffmpeg" (.mp4 via ffmpeg).
    #[arg(long, value_name = "KIND")]
    pub assembler: Option<AssemblerKind>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a time window and assemble it into one file.
    Fetch {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show which segments a window selects, without downloading.
    Plan {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the effective configuration (credentials masked).
    Config,
}

/// Flags that replace config-file values.
pub fn overrides(source: &SourceArgs, window: &WindowArgs, output: &OutputArgs) -> ConfigOverrides {
    ConfigOverrides {
        vod_id: source.vod_id,
        manifest: source.manifest.clone(),
        client_id: source.client_id.clone(),
        auth_token: source.auth_token.clone(),
        start_time: window.start.clone(),
        end_time: window.end.clone(),
        length: window.length.clone(),
        file_prefix: output.prefix.clone(),
        output_folder: output.folder.clone(),
        workers: output.workers,
        assembler: output.assembler,
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<TvdConfig> {
    let cfg = match path {
        Some(path) => config::load_from_path(path)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: {:?}", cfg.privatized());
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = load_config(cli.config.as_ref())?;

        match cli.command {
            CliCommand::Fetch {
                source,
                window,
                output,
            } => {
                cfg.merge(overrides(&source, &window, &output));
                run_fetch(&cfg).await?;
            }
            CliCommand::Plan {
                source,
                window,
                output,
            } => {
                cfg.merge(overrides(&source, &window, &output));
                run_plan(&cfg).await?;
            }
            CliCommand::Config => run_show_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
