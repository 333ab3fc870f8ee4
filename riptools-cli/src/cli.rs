// riptools-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Riptools: Blu-ray and DVD rip toolkit",
    long_about = "Inspects, remuxes and transcodes video rips by driving \
                  ffprobe, ffmpeg, mkvmerge, mkvpropedit and HandBrakeCLI."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print debug information (same as RUST_LOG=debug)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prints stream and HDR information for a rip
    Inspect(InspectArgs),
    /// Detects black bars and writes the crop sidecar
    DetectCrop(DetectCropArgs),
    /// Remuxes a rip into a clean Matroska file
    Remux(RemuxArgs),
    /// Transcodes a rip into a smaller, Plex-friendly file
    Transcode(TranscodeArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DetectCropArgs {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Don't write a `crop.txt` sidecar next to the input
    #[arg(long)]
    pub no_sidecar: bool,
}

#[derive(Parser, Debug)]
pub struct RemuxArgs {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the mkvmerge command and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Audio tracks to include, by 1-based position (default: all)
    #[arg(short = 'a', long = "select-audio", value_name = "TRACK", num_args = 1..)]
    pub select_audio: Vec<usize>,

    /// Subtitle tracks to include, by 1-based position (default: all)
    #[arg(short = 's', long = "select-subtitle", value_name = "TRACK", num_args = 1..)]
    pub select_subtitle: Vec<usize>,

    /// Subtitle track to flag as forced
    #[arg(short = 'f', long = "force-subtitle", value_name = "TRACK")]
    pub force_subtitle: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct TranscodeArgs {
    /// Input file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Scan the input and exit
    #[arg(long)]
    pub scan: bool,

    /// Print the HandBrakeCLI command and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Time in the input file to start at
    #[arg(long, value_name = "HH:MM:SS")]
    pub start: Option<String>,

    /// Time in the input file to stop at
    #[arg(long, value_name = "HH:MM:SS")]
    pub stop: Option<String>,

    /// Lower bitrate targets
    #[arg(long)]
    pub small: bool,

    /// Output h.265 (hevc) instead of h.264; also lowers the target bitrate
    #[arg(long)]
    pub hevc: bool,

    /// Use a hardware encoder. Much faster, but generally lower quality
    #[arg(long)]
    pub hw_accel: bool,

    /// Two-pass encoding
    #[arg(long)]
    pub two_pass: bool,

    /// Encode an HRD compliant stream
    #[arg(long)]
    pub hrd: bool,

    /// Crop values (default: auto detected, or read from `crop.txt`)
    #[arg(long, value_name = "TOP:BOTTOM:LEFT:RIGHT", conflicts_with = "no_crop")]
    pub crop: Option<String>,

    /// Disable cropping
    #[arg(long)]
    pub no_crop: bool,

    /// Deinterlace the input (default: auto-applied on interlaced inputs)
    #[arg(long, conflicts_with = "no_deinterlace")]
    pub deinterlace: bool,

    /// Disable deinterlacing
    #[arg(long)]
    pub no_deinterlace: bool,

    /// Preserve field rate when deinterlacing, e.g. 50i -> 50p
    #[arg(long)]
    pub preserve_field_rate: bool,

    /// Override the pixel aspect ratio (default: same as input)
    #[arg(long, value_name = "X:Y")]
    pub par: Option<String>,

    /// Audio tracks to include: positions, languages, or `all` (default: 1)
    #[arg(long, value_name = "TRACK|LANGUAGE|all", num_args = 1..)]
    pub audio: Vec<String>,

    /// Restrict the output to stereo
    #[arg(long)]
    pub stereo: bool,

    /// Subtitle track to burn into the video (default: the forced track)
    #[arg(long, value_name = "TRACK", conflicts_with = "no_burn")]
    pub burn: Option<usize>,

    /// Disable burning of subtitles
    #[arg(long)]
    pub no_burn: bool,

    /// Subtitle tracks to include: positions, languages, or `all`
    /// (default: same language as the main audio)
    #[arg(long, value_name = "TRACK|LANGUAGE|all", num_args = 1.., conflicts_with = "no_subtitles")]
    pub subtitles: Vec<String>,

    /// Disable added subtitles
    #[arg(long)]
    pub no_subtitles: bool,

    /// Don't remux the output after transcoding
    #[arg(long)]
    pub skip_remux: bool,
}
