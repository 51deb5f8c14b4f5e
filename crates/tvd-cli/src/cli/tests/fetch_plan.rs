//! Tests for the fetch, plan and config subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use tvd_core::config::AssemblerKind;

#[test]
fn cli_parse_fetch_all_flags() {
    let cli = parse(&[
        "tvd",
        "fetch",
        "--vod-id",
        "123456",
        "--manifest",
        "/srv/vods/123456.json",
        "--start",
        "0 30 0",
        "--length",
        "0 5 0",
        "--prefix",
        "clip-",
        "--folder",
        "/srv/out",
        "--workers",
        "8",
        "--assembler",
        "ffmpeg",
    ]);
    assert!(cli.config.is_none());
    match cli.command {
        CliCommand::Fetch {
            source,
            window,
            output,
        } => {
            assert_eq!(source.vod_id, Some(123456));
            assert_eq!(
                source.manifest.as_deref(),
                Some(std::path::Path::new("/srv/vods/123456.json"))
            );
            assert_eq!(window.start.as_deref(), Some("0 30 0"));
            assert!(window.end.is_none());
            assert_eq!(window.length.as_deref(), Some("0 5 0"));
            assert_eq!(output.prefix.as_deref(), Some("clip-"));
            assert_eq!(output.workers, Some(8));
            assert_eq!(output.assembler, Some(AssemblerKind::Ffmpeg));
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_credentials() {
    match parse(&[
        "tvd",
        "fetch",
        "--client-id",
        "kimne78kx3ncx6brgo4mv6wki5h1ko",
        "--auth-token",
        "abc123",
    ])
    .command
    {
        CliCommand::Fetch { source, .. } => {
            assert_eq!(
                source.client_id.as_deref(),
                Some("kimne78kx3ncx6brgo4mv6wki5h1ko")
            );
            assert_eq!(source.auth_token.as_deref(), Some("abc123"));
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_no_flags() {
    match parse(&["tvd", "fetch"]).command {
        CliCommand::Fetch {
            source,
            window,
            output,
        } => {
            assert_eq!(source, Default::default());
            assert_eq!(window, Default::default());
            assert_eq!(output, Default::default());
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_global_config_after_subcommand() {
    let cli = parse(&["tvd", "plan", "--config", "/etc/tvd.toml", "--end", "end"]);
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("/etc/tvd.toml"))
    );
    match cli.command {
        CliCommand::Plan { window, .. } => assert_eq!(window.end.as_deref(), Some("end")),
        _ => panic!("expected Plan"),
    }
}

#[test]
fn cli_parse_config() {
    let cli = parse(&["tvd", "--config", "tvd.toml", "config"]);
    assert!(matches!(cli.command, CliCommand::Config));
    assert!(cli.config.is_some());
}

#[test]
fn cli_rejects_unknown_assembler() {
    assert!(Cli::try_parse_from(["tvd", "fetch", "--assembler", "mkvmerge"]).is_err());
}

#[test]
fn cli_rejects_non_numeric_workers() {
    assert!(Cli::try_parse_from(["tvd", "fetch", "--workers", "many"]).is_err());
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["tvd"]).is_err());
}
