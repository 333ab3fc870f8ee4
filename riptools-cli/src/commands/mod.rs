//! Subcommand implementations.

pub mod detect_crop;
pub mod inspect;
pub mod remux;
pub mod transcode;

use crate::error::CliResult;
use riptools_core::external::ffprobe::{self, FfprobeOutput};
use riptools_core::{CoreError, MediaInfo};

use std::path::Path;

use log::{debug, info};

/// Rejects inputs that can't be processed before any tool is invoked.
pub(crate) fn ensure_input_file(path: &Path) -> CliResult<()> {
    if !path.exists() {
        return Err(CoreError::OperationFailed(format!(
            "Input doesn't exist: {}",
            path.display()
        )));
    }
    if path.is_dir() {
        return Err(CoreError::OperationFailed(format!(
            "Input cannot be a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Probes the input and builds the stream model every command starts from.
pub(crate) fn scan_media(path: &Path) -> CliResult<(MediaInfo, FfprobeOutput)> {
    info!("Scanning input...");
    let probe = ffprobe::probe(path)?;
    debug!("Probe result: {probe:?}");
    let media = MediaInfo::from_probe(path.to_path_buf(), &probe)?;
    Ok((media, probe))
}
