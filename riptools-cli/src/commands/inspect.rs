//! Implementation of the 'inspect' subcommand.
//!
//! Probes the input with ffprobe, decodes the first video frame to pick up
//! HDR side data, samples the source with idet for interlacing artefacts,
//! and prints a human-readable stream listing.

use crate::cli::InspectArgs;
use crate::error::CliResult;

use riptools_core::detection;
use riptools_core::external::{self, ffprobe, Tool};
use riptools_core::media::{HdrInfo, InspectionReport};
use riptools_core::CoreError;

pub fn run_inspect(args: &InspectArgs) -> CliResult<()> {
    external::verify_tools(&[Tool::Ffprobe, Tool::Ffmpeg])?;
    super::ensure_input_file(&args.file)?;

    let (media, probe) = super::scan_media(&args.file)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| {
            CoreError::MediaParse(format!("No video stream found in {}", args.file.display()))
        })?;
    let frame = ffprobe::probe_first_frame(&args.file)?;
    let hdr = HdrInfo::detect(video_stream, frame.as_ref());

    println!("Detecting interlacing artefacts...");
    let interlacing_artefacts = detection::detect_interlacing_artefacts(&args.file, &media.video)?;

    print!(
        "{}",
        InspectionReport {
            media,
            hdr,
            interlacing_artefacts,
        }
    );
    Ok(())
}
