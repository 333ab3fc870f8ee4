//! ffmpeg invocation for detection sampling.
//!
//! One sample decodes a handful of frames at a seek position through a
//! video filter (`cropdetect` or `idet`) and collects the log lines the
//! filter emits. Interpretation of those lines lives in [`crate::detection`].

use crate::error::{CoreError, CoreResult, command_start_error};

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use std::path::Path;

/// Frames decoded per cropdetect sample point.
const CROP_SAMPLE_FRAMES: u32 = 15;

/// Frames decoded per idet sample point. The filter needs a longer run to
/// produce stable field statistics.
const IDET_SAMPLE_FRAMES: u32 = 100;

/// Runs one cropdetect sample at `position` seconds into the input and
/// returns every log line mentioning a crop rectangle.
pub fn cropdetect_sample(input: &Path, position: u64) -> CoreResult<Vec<String>> {
    filter_sample(input, position, CROP_SAMPLE_FRAMES, "cropdetect=24:2", "crop=")
}

/// Runs one idet sample at `position` seconds into the input and returns
/// every log line carrying the filter's multi frame totals.
pub fn idet_sample(input: &Path, position: u64) -> CoreResult<Vec<String>> {
    filter_sample(
        input,
        position,
        IDET_SAMPLE_FRAMES,
        "idet",
        "Multi frame detection",
    )
}

fn filter_sample(
    input: &Path,
    position: u64,
    frames: u32,
    filter: &str,
    marker: &str,
) -> CoreResult<Vec<String>> {
    log::trace!(
        "Sampling {filter} at {position}s in {}",
        input.display()
    );

    let mut cmd = FfmpegCommand::new();
    cmd.args([
        "-hide_banner",
        "-nostdin",
        "-noaccurate_seek",
        "-ss",
        &position.to_string(),
    ]);
    cmd.input(input.to_string_lossy());
    cmd.args([
        "-frames:v",
        &frames.to_string(),
        "-filter:v",
        filter,
        "-an",
        "-sn",
        "-ignore_unknown",
        "-f",
        "null",
        "-",
    ]);

    let mut child = cmd
        .spawn()
        .map_err(|e| command_start_error("ffmpeg", e))?;

    let mut matched = Vec::new();
    for event in child
        .iter()
        .map_err(|e| CoreError::OperationFailed(format!("Reading ffmpeg output failed: {e}")))?
    {
        if let FfmpegEvent::Log(_, line) = event {
            if line.contains(marker) {
                matched.push(line);
            }
        }
    }

    // Exit status is irrelevant here: samples near the end of the file can
    // make ffmpeg exit non-zero while still having logged what we need
    child.wait().map_err(|e| command_start_error("ffmpeg", e))?;

    Ok(matched)
}
