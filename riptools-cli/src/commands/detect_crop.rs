//! Implementation of the 'detect-crop' subcommand.

use crate::cli::DetectCropArgs;
use crate::error::CliResult;

use riptools_core::detection;
use riptools_core::external::{self, Tool};

pub fn run_detect_crop(args: &DetectCropArgs) -> CliResult<()> {
    external::verify_tools(&[Tool::Ffprobe, Tool::Ffmpeg])?;
    super::ensure_input_file(&args.file)?;

    let (media, _) = super::scan_media(&args.file)?;

    println!("Detecting crop...");
    let geometry = detection::detect_crop(&args.file, &media.video)?;
    let crop = geometry.to_crop(media.video.width, media.video.height);

    println!("HandBrake crop: {crop}");
    println!("ffmpeg crop: {geometry}");

    if !args.no_sidecar {
        if detection::write_sidecar(&args.file, crop)? {
            println!(
                "Wrote {}",
                detection::sidecar_path(&args.file).display()
            );
        } else {
            println!(
                "{} already exists, leaving it alone",
                detection::sidecar_path(&args.file).display()
            );
        }
    }

    Ok(())
}
