//! Assembler: staged segment files to one output artifact.
//!
//! `ByteConcat` appends the staged files byte-for-byte into `<output>.part`
//! and renames it into place once complete, so a failed run never leaves a
//! truncated artifact behind. `FfmpegConcat` hands the same ordered list to
//! ffmpeg's `concat:` protocol with the `aac_adtstoasc` bitstream filter for
//! a container-level, re-encode-free join.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::TvdError;
use crate::progress::{emit, ProgressEvent, ProgressSender};
use crate::segment::Segment;

/// Suffix of the in-progress output file.
pub const PART_SUFFIX: &str = ".part";

/// Joins ordered input files into `output`; returns the output size in bytes.
pub trait Concatenate: Send + Sync {
    fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<u64, TvdError>;
}

/// `file.ts` -> `file.ts.part`.
pub fn part_path(output: &Path) -> PathBuf {
    let mut o = output.as_os_str().to_owned();
    o.push(PART_SUFFIX);
    PathBuf::from(o)
}

/// Checks that every segment was staged and its file exists, then
/// concatenates them in list order.
pub fn assemble(
    segments: &[Segment],
    output: &Path,
    concatenator: &dyn Concatenate,
    progress: Option<&ProgressSender>,
) -> Result<u64, TvdError> {
    let mut inputs = Vec::with_capacity(segments.len());
    for segment in segments {
        let path = segment.staging_path.as_ref().ok_or_else(|| {
            TvdError::assembly(format!("segment '{}' was never staged", segment.name))
        })?;
        if !path.is_file() {
            return Err(TvdError::assembly(format!(
                "staged file for segment '{}' is missing: {}",
                segment.name,
                path.display()
            )));
        }
        inputs.push(path.clone());
    }
    if inputs.is_empty() {
        return Err(TvdError::assembly("no segments to assemble"));
    }
    tracing::info!(
        segments = inputs.len(),
        output = %output.display(),
        "assembling output"
    );
    let bytes = concatenator.concat(&inputs, output, progress)?;
    tracing::info!(bytes, output = %output.display(), "output assembled");
    Ok(bytes)
}

/// Plain byte-for-byte concatenation, no re-encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteConcat;

impl ByteConcat {
    fn write_all_inputs(
        inputs: &[PathBuf],
        part: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<u64, TvdError> {
        let file = File::create(part).map_err(|e| {
            TvdError::assembly_io(format!("cannot create {}", part.display()), e)
        })?;
        let mut writer = BufWriter::new(file);
        let mut total = 0u64;
        for (i, input) in inputs.iter().enumerate() {
            let mut reader = File::open(input).map_err(|e| {
                TvdError::assembly_io(format!("cannot open {}", input.display()), e)
            })?;
            total += io::copy(&mut reader, &mut writer).map_err(|e| {
                TvdError::assembly_io(format!("copying {}", input.display()), e)
            })?;
            emit(
                progress,
                ProgressEvent::SegmentAssembled {
                    done: i + 1,
                    total: inputs.len(),
                },
            );
        }
        writer
            .flush()
            .map_err(|e| TvdError::assembly_io("flushing output", e))?;
        let file = writer
            .into_inner()
            .map_err(|e| TvdError::assembly_io("flushing output", e.into_error()))?;
        file.sync_all()
            .map_err(|e| TvdError::assembly_io("syncing output", e))?;
        Ok(total)
    }
}

impl Concatenate for ByteConcat {
    fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<u64, TvdError> {
        let part = part_path(output);
        let written = Self::write_all_inputs(inputs, &part, progress).and_then(|bytes| {
            fs::rename(&part, output).map_err(|e| {
                TvdError::assembly_io(format!("cannot create {}", output.display()), e)
            })?;
            Ok(bytes)
        });
        if written.is_err() {
            let _ = fs::remove_file(&part);
        }
        written
    }
}

/// Concatenation through an external ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegConcat {
    pub program: PathBuf,
}

impl Default for FfmpegConcat {
    fn default() -> Self {
        let program = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
        Self {
            program: PathBuf::from(program),
        }
    }
}

impl FfmpegConcat {
    /// Argument list for joining `inputs` into `output`.
    pub fn args(inputs: &[PathBuf], output: &Path) -> Vec<OsString> {
        let mut concat = OsString::from("concat:");
        for (i, input) in inputs.iter().enumerate() {
            if i > 0 {
                concat.push("|");
            }
            concat.push(input.as_os_str());
        }
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(concat);
        args.extend(
            ["-c", "copy", "-bsf:a", "aac_adtstoasc", "-fflags", "+genpts"]
                .iter()
                .map(OsString::from),
        );
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Concatenate for FfmpegConcat {
    fn concat(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: Option<&ProgressSender>,
    ) -> Result<u64, TvdError> {
        let result = Command::new(&self.program)
            .args(Self::args(inputs, output))
            .stdin(Stdio::null())
            .output();
        let out = match result {
            Ok(out) => out,
            Err(e) => {
                return Err(TvdError::assembly_io(
                    format!("failed to run {}", self.program.display()),
                    e,
                ))
            }
        };
        if !out.status.success() {
            let _ = fs::remove_file(output);
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(TvdError::assembly(format!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                stderr.trim()
            )));
        }
        emit(
            progress,
            ProgressEvent::SegmentAssembled {
                done: inputs.len(),
                total: inputs.len(),
            },
        );
        fs::metadata(output)
            .map(|m| m.len())
            .map_err(|e| TvdError::assembly_io(format!("cannot stat {}", output.display()), e))
    }
}
