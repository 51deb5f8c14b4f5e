//! `tvd fetch` – download a time window and assemble it.

use anyhow::{Context, Result};
use std::time::Instant;
use tvd_core::assemble::{ByteConcat, Concatenate, FfmpegConcat};
use tvd_core::config::{AssemblerKind, TvdConfig};
use tvd_core::fetch::HttpFetcher;
use tvd_core::pipeline::{run_pruned, ExecuteOptions};
use tvd_core::progress::ProgressEvent;
use tvd_core::prune::prune_segments;
use tvd_core::retry::RetryPolicy;

use super::load_segments;

const PROGRESS_INTERVAL_MS: u128 = 500;

pub async fn run_fetch(cfg: &TvdConfig) -> Result<()> {
    cfg.validate()?;
    tracing::info!("fetch with config: {:?}", cfg.privatized());

    let window = cfg.resolve_window()?;
    let list = load_segments(cfg).await?;
    let range = prune_segments(&list.segments, list.nominal_duration, &window)?;
    let output_path = cfg.output_path(window.start_seconds, range.display_duration_secs());

    if let Some(folder) = &cfg.output_folder {
        std::fs::create_dir_all(folder)
            .with_context(|| format!("cannot create output folder {}", folder.display()))?;
    }

    println!(
        "Fetching segments {}..{} ({} of {}) into {}",
        range.start_index,
        range.end_index,
        range.len(),
        list.segments.len(),
        output_path.display()
    );

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressEvent>(64);
    let progress_handle = tokio::spawn(async move {
        let mut last_print = Instant::now();
        while let Some(event) = progress_rx.recv().await {
            let (label, done, total) = match &event {
                ProgressEvent::SegmentFetched { done, total, .. } => ("fetched", *done, *total),
                ProgressEvent::SegmentAssembled { done, total } => ("assembled", *done, *total),
            };
            if last_print.elapsed().as_millis() >= PROGRESS_INTERVAL_MS || done >= total {
                println!(
                    "  {} {}/{} ({:.1}%)",
                    label,
                    done,
                    total,
                    event.fraction() * 100.0
                );
                last_print = Instant::now();
            }
        }
    });

    let options = ExecuteOptions {
        workers: cfg.workers,
        retry: cfg.retry.as_ref().map(RetryPolicy::from),
        staging_root: None,
    };
    let headers = cfg.http_headers();
    let assembler = cfg.assembler;
    let out = output_path.clone();
    let started = Instant::now();

    let report = tokio::task::spawn_blocking(move || {
        let fetcher = HttpFetcher::new(headers);
        let concatenator: Box<dyn Concatenate> = match assembler {
            AssemblerKind::Bytes => Box::new(ByteConcat),
            AssemblerKind::Ffmpeg => Box::new(FfmpegConcat::default()),
        };
        run_pruned(
            range,
            &options,
            &out,
            &fetcher,
            concatenator.as_ref(),
            Some(&progress_tx),
        )
    })
    .await
    .context("download task panicked")??;

    let _ = progress_handle.await;

    tracing::info!(
        output = %report.output_path.display(),
        segments = report.segment_count,
        bytes = report.bytes_written,
        "fetch complete"
    );
    println!(
        "Wrote {} ({} segments, {} bytes, {:.0}s of stream) in {:.1}s",
        report.output_path.display(),
        report.segment_count,
        report.bytes_written,
        report.duration_secs,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
