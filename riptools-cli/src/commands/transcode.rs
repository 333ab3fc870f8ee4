//! Implementation of the 'transcode' subcommand.
//!
//! The long one: resolves crop and track policies, builds the HandBrakeCLI
//! invocation, runs it with a log file next to the output, then fixes up
//! subtitle flags with mkvpropedit and rewrites the container with a final
//! mkvmerge pass.

use crate::cli::TranscodeArgs;
use crate::error::CliResult;
use crate::logging::get_timestamp;

use riptools_core::detection::{self, Crop};
use riptools_core::external::{self, ffprobe, handbrake, Tool};
use riptools_core::media::{HdrInfo, InspectionReport};
use riptools_core::transcode::{self, BurnChoice, SubtitleChoice, TrackSelector, TranscodeOptions};
use riptools_core::utils::{parse_timestamp, shell_join};
use riptools_core::{CoreError, MediaInfo};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};

pub fn run_transcode(args: &TranscodeArgs) -> CliResult<()> {
    external::verify_tools(&[
        Tool::Ffprobe,
        Tool::HandBrake,
        Tool::Mkvpropedit,
        Tool::Ffmpeg,
        Tool::Mkvmerge,
    ])?;
    super::ensure_input_file(&args.file)?;

    let output = output_path(&args.file);
    if !args.dry_run && output.exists() {
        return Err(CoreError::OutputExists(output));
    }

    let (media, probe) = super::scan_media(&args.file)?;

    if args.scan {
        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| {
                CoreError::MediaParse(format!("No video stream found in {}", args.file.display()))
            })?;
        let frame = ffprobe::probe_first_frame(&args.file)?;
        let hdr = HdrInfo::detect(video_stream, frame.as_ref());
        // No idet pass here; the scan is a quick look, `inspect` does the
        // expensive sampling
        print!(
            "{}",
            InspectionReport {
                media,
                hdr,
                interlacing_artefacts: false,
            }
        );
        return Ok(());
    }

    let encoders = handbrake::discover_encoders()?;
    debug!("Available video encoders: {:?}", encoders.video);
    debug!("Available audio encoders: {:?}", encoders.audio);

    let options = build_options(args, &media)?;
    let plan = transcode::build_command(&media, &options, &encoders, &output)?;

    println!("{}", shell_join(&plan.command));
    if args.dry_run {
        return Ok(());
    }

    println!("Transcoding...");
    let mut log_file = external::open_run_log(&output)?;
    writeln!(log_file, "Run started {}", get_timestamp())?;
    external::run_streaming(&plan.command, &mut log_file)?;

    println!("Postprocessing...");
    if !plan.added_subtitles.is_empty() {
        let command = transcode::propedit_command(&output, plan.added_subtitles.len());
        external::run_logged(&command, Some(&mut log_file))?;
    }

    if !args.skip_remux && output.exists() {
        let tmp = unique_tmp_path();
        fs::rename(&output, &tmp)?;
        let command = transcode::cleanup_remux_command(&output, &tmp);
        external::run_logged(&command, Some(&mut log_file))?;
        fs::remove_file(&tmp)?;
    }

    info!("Finished {}", output.display());
    Ok(())
}

/// Output path for a transcode: `TITLE.mkv` in the current directory.
fn output_path(input: &Path) -> PathBuf {
    let title = input
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    PathBuf::from(format!("{title}.mkv"))
}

// HandBrake's output gets parked here during the cleanup remux.
fn unique_tmp_path() -> PathBuf {
    let mut tmp = PathBuf::from("tmp.mkv");
    let mut i = 1;
    while tmp.exists() {
        tmp = PathBuf::from(format!("tmp-{i}.mkv"));
        i += 1;
    }
    tmp
}

/// Turns raw CLI flags into fully resolved transcode options, including the
/// crop lookup order: explicit value, disabled, sidecar file, detection.
fn build_options(args: &TranscodeArgs, media: &MediaInfo) -> CliResult<TranscodeOptions> {
    let start_secs = args
        .start
        .as_deref()
        .map(|s| {
            parse_timestamp(s)
                .ok_or_else(|| CoreError::OperationFailed(format!("Invalid start: {s}")))
        })
        .transpose()?;
    let stop_secs = args
        .stop
        .as_deref()
        .map(|s| {
            parse_timestamp(s)
                .ok_or_else(|| CoreError::OperationFailed(format!("Invalid stop: {s}")))
        })
        .transpose()?;

    if let Some(par) = &args.par {
        let fields: Vec<&str> = par.split(':').collect();
        let valid = fields.len() == 2
            && fields
                .iter()
                .all(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
        if !valid {
            return Err(CoreError::OperationFailed(format!(
                "Invalid aspect ratio: {par}"
            )));
        }
    }

    let crop = resolve_crop(args, media)?;

    let deinterlace = if args.deinterlace {
        Some(true)
    } else if args.no_deinterlace {
        Some(false)
    } else {
        None
    };

    let audio = if args.audio.is_empty() {
        vec![TrackSelector::Index(1)]
    } else {
        args.audio
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<_>, _>>()?
    };

    let burn = if args.no_burn {
        BurnChoice::Off
    } else {
        match args.burn {
            Some(track) => BurnChoice::Track(track),
            None => BurnChoice::Auto,
        }
    };

    let subtitles = if args.no_subtitles {
        SubtitleChoice::Off
    } else if args.subtitles.is_empty() {
        SubtitleChoice::Auto
    } else {
        SubtitleChoice::Selected(
            args.subtitles
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<_>, _>>()?,
        )
    };

    Ok(TranscodeOptions {
        start_secs,
        stop_secs,
        small: args.small,
        hevc: args.hevc,
        hw_accel: args.hw_accel,
        two_pass: args.two_pass,
        hrd: args.hrd,
        crop,
        deinterlace,
        preserve_field_rate: args.preserve_field_rate,
        par: args.par.clone(),
        stereo: args.stereo,
        audio,
        burn,
        subtitles,
    })
}

fn resolve_crop(args: &TranscodeArgs, media: &MediaInfo) -> CliResult<Option<Crop>> {
    if let Some(crop) = &args.crop {
        return Ok(Some(crop.parse()?));
    }
    if args.no_crop {
        return Ok(None);
    }
    if let Some(crop) = detection::read_sidecar(&args.file)? {
        info!(
            "Using crop {crop} from {}",
            detection::sidecar_path(&args.file).display()
        );
        return Ok(Some(crop));
    }

    println!("Detecting crop...");
    let geometry = detection::detect_crop(&args.file, &media.video)?;
    Ok(Some(geometry.to_crop(media.video.width, media.video.height)))
}
