//! `tvd plan` – show what a fetch would download.

use anyhow::Result;
use tvd_core::config::TvdConfig;
use tvd_core::prune::prune_segments;
use tvd_core::timespec::{format_time_mask, WindowEnd};

use super::load_segments;

pub async fn run_plan(cfg: &TvdConfig) -> Result<()> {
    cfg.validate()?;
    let window = cfg.resolve_window()?;
    let list = load_segments(cfg).await?;
    let range = prune_segments(&list.segments, list.nominal_duration, &window)?;

    let end = match window.end {
        WindowEnd::At(secs) => format_time_mask(secs),
        WindowEnd::ToEnd => "end".to_string(),
    };
    println!("{:<10} {} .. {}", "WINDOW", format_time_mask(window.start_seconds), end);
    println!(
        "{:<10} {}..{} ({} of {}, nominal {}s)",
        "SEGMENTS",
        range.start_index,
        range.end_index,
        range.len(),
        list.segments.len(),
        list.nominal_duration
    );
    println!("{:<10} {}s", "DURATION", range.display_duration_secs());
    println!(
        "{:<10} {}",
        "OUTPUT",
        cfg.output_path(window.start_seconds, range.display_duration_secs())
            .display()
    );
    Ok(())
}
