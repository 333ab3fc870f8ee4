//! ffprobe invocation and JSON output deserialization.
//!
//! Streams, format, and first-frame information all come from
//! `ffprobe -print_format json`. The structs here keep ffprobe's loose
//! schema at arm's length: almost everything is optional, and tags arrive
//! as free-form string maps because the interesting entries (`BPS`,
//! `NUMBER_OF_FRAMES-eng`, ...) are written by muxers, not ffprobe.

use crate::error::{CoreError, CoreResult, command_failed_error, command_start_error};

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

/// Top-level ffprobe output for a streams + format probe.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    #[serde(default)]
    pub format: FfprobeFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeFormat {
    #[serde(default)]
    pub filename: String,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeStream {
    pub index: i64,
    #[serde(default)]
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: String,
    #[serde(default)]
    pub codec_tag_string: String,
    pub profile: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub field_order: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub channels: Option<i64>,
    pub channel_layout: Option<String>,
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub disposition: FfprobeDisposition,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeDisposition {
    #[serde(default)]
    pub default: i64,
    #[serde(default)]
    pub forced: i64,
}

/// First decoded frame of the video stream, used for HDR detection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeFrame {
    pub color_transfer: Option<String>,
    #[serde(default)]
    pub side_data_list: Vec<FfprobeSideData>,
}

/// One side-data entry. Beyond the type, the fields vary wildly per entry,
/// so everything else is kept as a raw value map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FfprobeSideData {
    #[serde(default)]
    pub side_data_type: String,
    #[serde(flatten)]
    pub fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FfprobeFrames {
    #[serde(default)]
    frames: Vec<FfprobeFrame>,
}

impl FfprobeStream {
    /// Language tag, defaulting to ffprobe's "und" marker when missing.
    #[must_use]
    pub fn language(&self) -> &str {
        self.tags.get("language").map_or("und", String::as_str)
    }

    /// Stream bitrate in kb/s, preferring the muxer statistics tags over
    /// the often-absent `bit_rate` field.
    #[must_use]
    pub fn bitrate_kbps(&self) -> Option<u64> {
        self.tags
            .get("BPS")
            .or_else(|| self.tags.get("BPS-eng"))
            .or(self.bit_rate.as_ref())
            .and_then(|bps| bps.parse::<u64>().ok())
            .map(|bps| bps / 1000)
    }
}

/// Probes streams and container format in one ffprobe run.
pub fn probe(input: &Path) -> CoreResult<FfprobeOutput> {
    let output = run_ffprobe(
        input,
        &["-show_streams", "-show_format", "-print_format", "json"],
    )?;
    serde_json::from_slice(&output)
        .map_err(|e| CoreError::JsonParse(format!("ffprobe stream info: {e}")))
}

/// Probes the first frame of the first video stream.
pub fn probe_first_frame(input: &Path) -> CoreResult<Option<FfprobeFrame>> {
    let output = run_ffprobe(
        input,
        &[
            "-select_streams",
            "v:0",
            "-show_frames",
            "-read_intervals",
            "%+#1",
            "-print_format",
            "json",
        ],
    )?;
    let frames: FfprobeFrames = serde_json::from_slice(&output)
        .map_err(|e| CoreError::JsonParse(format!("ffprobe frame info: {e}")))?;
    Ok(frames.frames.into_iter().next())
}

fn run_ffprobe(input: &Path, args: &[&str]) -> CoreResult<Vec<u8>> {
    log::debug!("Running ffprobe {:?} on {}", args, input.display());

    let output = Command::new("ffprobe")
        .args(["-loglevel", "quiet"])
        .args(args)
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| command_start_error("ffprobe", e))?;

    if !output.status.success() {
        return Err(command_failed_error(
            "ffprobe",
            output.status,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_and_format_json() {
        let json = r#"{
            "streams": [
                {
                    "index": 0,
                    "codec_name": "h264",
                    "codec_type": "video",
                    "codec_tag_string": "[0][0][0][0]",
                    "width": 1920,
                    "height": 1080,
                    "field_order": "progressive",
                    "avg_frame_rate": "24000/1001",
                    "disposition": {"default": 1, "forced": 0},
                    "tags": {"BPS": "24000000"}
                },
                {
                    "index": 1,
                    "codec_name": "dts",
                    "profile": "DTS-HD MA",
                    "codec_type": "audio",
                    "codec_tag_string": "[0][0][0][0]",
                    "channels": 6,
                    "channel_layout": "5.1(side)",
                    "disposition": {"default": 1, "forced": 0},
                    "tags": {"language": "eng", "title": "Surround"}
                }
            ],
            "format": {"filename": "movie.mkv", "duration": "5970.000000"}
        }"#;

        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.streams.len(), 2);
        assert_eq!(parsed.format.filename, "movie.mkv");
        assert_eq!(parsed.format.duration.as_deref(), Some("5970.000000"));

        let video = &parsed.streams[0];
        assert_eq!(video.codec_type, "video");
        assert_eq!(video.width, Some(1920));
        assert_eq!(video.bitrate_kbps(), Some(24000));
        assert_eq!(video.language(), "und");

        let audio = &parsed.streams[1];
        assert_eq!(audio.channels, Some(6));
        assert_eq!(audio.language(), "eng");
        assert_eq!(audio.profile.as_deref(), Some("DTS-HD MA"));
        assert_eq!(audio.bitrate_kbps(), None);
    }

    #[test]
    fn parses_minimal_stream() {
        // DVD subtitle streams often carry almost nothing
        let json = r#"{"streams": [{"index": 2, "codec_type": "subtitle", "codec_name": "dvd_subtitle"}]}"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        let sub = &parsed.streams[0];
        assert_eq!(sub.disposition.forced, 0);
        assert!(sub.tags.is_empty());
        assert_eq!(sub.language(), "und");
    }

    #[test]
    fn bitrate_prefers_statistics_tags() {
        let json = r#"{
            "streams": [{
                "index": 1,
                "codec_type": "audio",
                "bit_rate": "640000",
                "tags": {"BPS-eng": "1509000"}
            }]
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.streams[0].bitrate_kbps(), Some(1509));
    }

    #[test]
    fn parses_frame_side_data() {
        let json = r#"{
            "frames": [{
                "color_transfer": "smpte2084",
                "side_data_list": [
                    {
                        "side_data_type": "Mastering display metadata",
                        "red_x": "34000/50000",
                        "max_luminance": "10000000/10000"
                    }
                ]
            }]
        }"#;
        let frames: FfprobeFrames = serde_json::from_str(json).unwrap();
        let frame = &frames.frames[0];
        assert_eq!(frame.color_transfer.as_deref(), Some("smpte2084"));
        assert_eq!(
            frame.side_data_list[0].side_data_type,
            "Mastering display metadata"
        );
        assert!(frame.side_data_list[0].fields.contains_key("max_luminance"));
    }
}
