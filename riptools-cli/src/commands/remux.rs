//! Implementation of the 'remux' subcommand.
//!
//! Builds and runs an mkvmerge invocation that copies the wanted tracks
//! into a fresh Matroska file in the current directory, clearing the title
//! and normalizing default/forced flags on the way.

use crate::cli::RemuxArgs;
use crate::error::CliResult;

use riptools_core::external::{self, Tool};
use riptools_core::remux;
use riptools_core::utils::shell_join;
use riptools_core::{CoreError, RemuxOptions};

pub fn run_remux(args: &RemuxArgs) -> CliResult<()> {
    external::verify_tools(&[Tool::Ffprobe, Tool::Mkvmerge])?;
    super::ensure_input_file(&args.file)?;

    let (media, _) = super::scan_media(&args.file)?;

    let options = RemuxOptions {
        audio_tracks: args.select_audio.clone(),
        subtitle_tracks: args.select_subtitle.clone(),
        forced_subtitle: args.force_subtitle,
    };

    let output = remux::output_path(&args.file);
    let command = remux::build_command(&media, &options, &output)?;

    if args.dry_run {
        println!("{}", shell_join(&command));
        return Ok(());
    }

    if output.exists() {
        return Err(CoreError::OutputExists(output));
    }

    println!("Remuxing {}...", args.file.display());
    external::run_passthrough(&command)
}
