//! HandBrakeCLI capability discovery.
//!
//! HandBrake builds differ in which video and audio encoders they ship
//! (hardware encoders, ca_aac vs fdk_aac, ...). The only reliable way to
//! find out is to scrape the `--encoder` and `--aencoder` option blocks of
//! `HandBrakeCLI --help`, which list one encoder name per line.

use crate::error::{CoreResult, command_start_error};

use std::process::{Command, Stdio};

/// Encoders a particular HandBrake build offers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableEncoders {
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

impl AvailableEncoders {
    #[must_use]
    pub fn has_video(&self, name: &str) -> bool {
        self.video.iter().any(|e| e == name)
    }

    #[must_use]
    pub fn has_audio(&self, name: &str) -> bool {
        self.audio.iter().any(|e| e == name)
    }
}

/// Runs `HandBrakeCLI --help` and parses the encoder lists out of it.
pub fn discover_encoders() -> CoreResult<AvailableEncoders> {
    let output = Command::new("HandBrakeCLI")
        .arg("--help")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| command_start_error("HandBrakeCLI", e))?;

    // HandBrake exits non-zero for --help on some builds; the text is all
    // that matters here.
    let help = String::from_utf8_lossy(&output.stdout);
    let encoders = parse_help_encoders(&help);
    log::debug!(
        "HandBrake encoders: video={:?} audio={:?}",
        encoders.video,
        encoders.audio
    );
    Ok(encoders)
}

/// Extracts encoder names from HandBrake's help text.
///
/// The `--encoder` and `--aencoder` options are each followed by an
/// indented block listing one encoder per line; the block ends at the next
/// option flag or quoted default value.
#[must_use]
pub fn parse_help_encoders(help: &str) -> AvailableEncoders {
    let mut encoders = AvailableEncoders::default();
    let mut in_video_block = false;
    let mut in_audio_block = false;

    for line in help.lines() {
        if line.contains("--encoder ") {
            in_video_block = true;
        } else if line.contains("--aencoder ") {
            in_audio_block = true;
        } else if (in_video_block || in_audio_block)
            && (line.contains("--") || line.contains('"'))
        {
            in_video_block = false;
            in_audio_block = false;
        } else if in_video_block {
            let name = line.trim();
            if !name.is_empty() {
                encoders.video.push(name.to_string());
            }
        } else if in_audio_block {
            let name = line.trim();
            if !name.is_empty() {
                encoders.audio.push(name.to_string());
            }
        }
    }

    encoders
}
