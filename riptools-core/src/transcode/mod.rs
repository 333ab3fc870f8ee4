//! Building HandBrakeCLI invocations for Plex-friendly transcodes.
//!
//! All of the opinionated policy lives here: bitrate ladders by resolution,
//! encoder selection with hardware fallback, audio passthrough rules, and
//! subtitle inclusion/burn-in defaults. The output of [`build_command`] is a
//! plain argument vector; running it is the caller's business.

mod audio;
mod subtitles;
mod video;

pub use audio::select_aac_encoder;
pub use video::{select_video_encoder, target_bitrate, EncoderSpec, VideoFormat};

use crate::detection::Crop;
use crate::error::{CoreError, CoreResult};
use crate::external::handbrake::AvailableEncoders;
use crate::media::MediaInfo;

use std::path::Path;
use std::str::FromStr;

/// One element of an `--audio`/`--subtitles` selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    /// A 1-based track position.
    Index(usize),
    /// An ISO 639-2 language code, selecting every matching track.
    Language(String),
    /// Every track.
    All,
}

impl FromStr for TrackSelector {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(TrackSelector::All)
        } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let index = s.parse().map_err(|_| invalid_selector(s))?;
            Ok(TrackSelector::Index(index))
        } else if s.len() == 3 && s.bytes().all(|b| b.is_ascii_lowercase()) {
            Ok(TrackSelector::Language(s.to_string()))
        } else {
            Err(invalid_selector(s))
        }
    }
}

fn invalid_selector(s: &str) -> CoreError {
    CoreError::InvalidSelection(format!("Invalid track selector: {s}"))
}

/// Resolves selectors against `(position, language)` pairs, deduplicating
/// while preserving selection order.
fn resolve_selectors(selectors: &[TrackSelector], tracks: &[(usize, &str)]) -> Vec<usize> {
    let mut selected = Vec::new();
    for selector in selectors {
        match selector {
            TrackSelector::Index(index) => selected.push(*index),
            TrackSelector::All => {
                selected = tracks.iter().map(|(position, _)| *position).collect();
                break;
            }
            TrackSelector::Language(language) => selected.extend(
                tracks
                    .iter()
                    .filter(|(_, track_language)| track_language == language)
                    .map(|(position, _)| *position),
            ),
        }
    }

    let mut deduped = Vec::new();
    for position in selected {
        if !deduped.contains(&position) {
            deduped.push(position);
        }
    }
    deduped
}

/// Subtitle burn-in behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurnChoice {
    /// Burn the forced track, if there is exactly one.
    #[default]
    Auto,
    /// Burn a specific 1-based track.
    Track(usize),
    /// Never burn.
    Off,
}

/// Added-subtitle behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubtitleChoice {
    /// Include tracks matching the main audio language.
    #[default]
    Auto,
    /// Include the given selection.
    Selected(Vec<TrackSelector>),
    /// Include nothing.
    Off,
}

/// Everything that shapes a transcode, fully resolved by the caller.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    pub start_secs: Option<u64>,
    pub stop_secs: Option<u64>,
    pub small: bool,
    pub hevc: bool,
    pub hw_accel: bool,
    pub two_pass: bool,
    pub hrd: bool,
    /// `None` disables cropping entirely.
    pub crop: Option<Crop>,
    /// `None` lets the source's interlacing metadata decide.
    pub deinterlace: Option<bool>,
    pub preserve_field_rate: bool,
    pub par: Option<String>,
    pub stereo: bool,
    pub audio: Vec<TrackSelector>,
    pub burn: BurnChoice,
    pub subtitles: SubtitleChoice,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        TranscodeOptions {
            start_secs: None,
            stop_secs: None,
            small: false,
            hevc: false,
            hw_accel: false,
            two_pass: false,
            hrd: false,
            crop: Some(Crop::NONE),
            deinterlace: None,
            preserve_field_rate: false,
            par: None,
            stereo: false,
            audio: vec![TrackSelector::Index(1)],
            burn: BurnChoice::Auto,
            subtitles: SubtitleChoice::Auto,
        }
    }
}

/// A built transcode invocation plus what the postprocessing steps need.
#[derive(Debug)]
pub struct TranscodePlan {
    /// The full HandBrakeCLI argument vector.
    pub command: Vec<String>,
    /// 1-based output positions of subtitles added (not burned), in order.
    /// Their default flags get cleared with mkvpropedit afterwards.
    pub added_subtitles: Vec<usize>,
}

/// Builds the HandBrakeCLI command for one transcode.
pub fn build_command(
    media: &MediaInfo,
    options: &TranscodeOptions,
    encoders: &AvailableEncoders,
    output: &Path,
) -> CoreResult<TranscodePlan> {
    let mut command = vec![
        "HandBrakeCLI".to_string(),
        "--input".to_string(),
        media.path.to_string_lossy().into_owned(),
        "--output".to_string(),
        output.to_string_lossy().into_owned(),
        "--markers".to_string(),
    ];

    if let Some(start) = options.start_secs {
        command.push("--start-at".to_string());
        command.push(format!("seconds:{start}"));
    }
    if let Some(stop) = options.stop_secs {
        command.push("--stop-at".to_string());
        command.push(format!("seconds:{stop}"));
    }

    command.extend(video::video_args(&media.video, options, encoders)?);

    let (audio_args, main_language) = audio::audio_args(media, options, encoders)?;
    command.extend(audio_args);

    let (subtitle_args, added_subtitles) = subtitles::subtitle_args(media, options, &main_language)?;
    command.extend(subtitle_args);

    Ok(TranscodePlan {
        command,
        added_subtitles,
    })
}

/// Builds the mkvpropedit command that clears the default flag on each
/// subtitle track HandBrake added.
#[must_use]
pub fn propedit_command(output: &Path, added_subtitle_count: usize) -> Vec<String> {
    let mut command = vec![
        "mkvpropedit".to_string(),
        output.to_string_lossy().into_owned(),
    ];
    for track in 1..=added_subtitle_count {
        command.push("--edit".to_string());
        command.push(format!("track:s{track}"));
        command.push("--set".to_string());
        command.push("flag-default=0".to_string());
    }
    command
}

/// Builds the final cleanup remux that rewrites HandBrake's output headers.
#[must_use]
pub fn cleanup_remux_command(output: &Path, tmp: &Path) -> Vec<String> {
    vec![
        "mkvmerge".to_string(),
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
        tmp.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioStream, SubtitleStream, VideoStream};
    use std::path::PathBuf;

    pub(super) fn test_encoders() -> AvailableEncoders {
        AvailableEncoders {
            video: vec![
                "x264".to_string(),
                "x265".to_string(),
                "nvenc_h264".to_string(),
                "nvenc_h265".to_string(),
            ],
            audio: vec!["av_aac".to_string(), "ac3".to_string()],
        }
    }

    pub(super) fn test_media() -> MediaInfo {
        MediaInfo {
            path: PathBuf::from("Movie (2020).mkv"),
            video: VideoStream {
                stream_index: 0,
                width: 1920,
                height: 1080,
                codec: "h264".to_string(),
                interlaced: false,
                fps: 23.976,
                duration_secs: Some(5400.0),
                bitrate_kbps: None,
            },
            audio: vec![
                AudioStream {
                    position: 1,
                    stream_index: 1,
                    language: "eng".to_string(),
                    codec: "dts".to_string(),
                    channels: 6,
                    layout: "5.1(side)".to_string(),
                    bitrate_kbps: Some(1509),
                    title: None,
                },
                AudioStream {
                    position: 2,
                    stream_index: 2,
                    language: "eng".to_string(),
                    codec: "ac3".to_string(),
                    channels: 2,
                    layout: "stereo".to_string(),
                    bitrate_kbps: Some(192),
                    title: None,
                },
                AudioStream {
                    position: 3,
                    stream_index: 3,
                    language: "fra".to_string(),
                    codec: "ac3".to_string(),
                    channels: 6,
                    layout: "5.1(side)".to_string(),
                    bitrate_kbps: Some(448),
                    title: None,
                },
            ],
            subtitles: vec![
                SubtitleStream {
                    position: 1,
                    stream_index: 4,
                    language: "eng".to_string(),
                    codec: "hdmv_pgs_subtitle".to_string(),
                    forced: false,
                    default: false,
                    frame_count: Some(700),
                },
                SubtitleStream {
                    position: 2,
                    stream_index: 5,
                    language: "fra".to_string(),
                    codec: "hdmv_pgs_subtitle".to_string(),
                    forced: false,
                    default: false,
                    frame_count: Some(650),
                },
            ],
        }
    }

    fn arg_value<'a>(command: &'a [String], flag: &str) -> Option<&'a str> {
        command
            .iter()
            .position(|arg| arg == flag)
            .and_then(|pos| command.get(pos + 1))
            .map(String::as_str)
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("3".parse::<TrackSelector>().unwrap(), TrackSelector::Index(3));
        assert_eq!("all".parse::<TrackSelector>().unwrap(), TrackSelector::All);
        assert_eq!(
            "eng".parse::<TrackSelector>().unwrap(),
            TrackSelector::Language("eng".to_string())
        );
        assert!("ENG".parse::<TrackSelector>().is_err());
        assert!("en".parse::<TrackSelector>().is_err());
        assert!("".parse::<TrackSelector>().is_err());
        assert!("1a".parse::<TrackSelector>().is_err());
    }

    #[test]
    fn selectors_resolve_in_order_without_duplicates() {
        let tracks = [(1, "eng"), (2, "eng"), (3, "fra")];
        assert_eq!(
            resolve_selectors(
                &[
                    TrackSelector::Language("eng".to_string()),
                    TrackSelector::Index(1)
                ],
                &tracks
            ),
            vec![1, 2]
        );
        assert_eq!(
            resolve_selectors(&[TrackSelector::All], &tracks),
            vec![1, 2, 3]
        );
        assert_eq!(
            resolve_selectors(&[TrackSelector::Language("jpn".to_string())], &tracks),
            Vec::<usize>::new()
        );
    }

    #[test]
    fn default_command_shape() {
        let plan = build_command(
            &test_media(),
            &TranscodeOptions::default(),
            &test_encoders(),
            Path::new("Movie (2020).mkv"),
        )
        .unwrap();

        let command = &plan.command;
        assert_eq!(command[0], "HandBrakeCLI");
        assert_eq!(arg_value(command, "--input"), Some("Movie (2020).mkv"));
        assert_eq!(arg_value(command, "--output"), Some("Movie (2020).mkv"));
        assert!(command.contains(&"--markers".to_string()));
        assert_eq!(arg_value(command, "--crop"), Some("0:0:0:0"));
        assert_eq!(arg_value(command, "--encoder"), Some("x264"));
        assert_eq!(arg_value(command, "--vb"), Some("8000"));
        assert_eq!(arg_value(command, "--audio"), Some("1"));
        // Auto subtitles follow the main audio language
        assert_eq!(arg_value(command, "--subtitle"), Some("1"));
        assert_eq!(plan.added_subtitles, vec![1]);
        assert!(!command.contains(&"--start-at".to_string()));
        assert!(!command.contains(&"--two-pass".to_string()));
    }

    #[test]
    fn start_stop_and_two_pass() {
        let options = TranscodeOptions {
            start_secs: Some(300),
            stop_secs: Some(900),
            two_pass: true,
            ..Default::default()
        };
        let plan = build_command(
            &test_media(),
            &options,
            &test_encoders(),
            Path::new("out.mkv"),
        )
        .unwrap();
        let command = &plan.command;
        assert_eq!(arg_value(command, "--start-at"), Some("seconds:300"));
        assert_eq!(arg_value(command, "--stop-at"), Some("seconds:900"));
        let two_pass = command.iter().position(|a| a == "--two-pass").unwrap();
        assert_eq!(command[two_pass + 1], "--turbo");
    }

    #[test]
    fn propedit_clears_default_flags() {
        assert_eq!(
            propedit_command(Path::new("out.mkv"), 2),
            vec![
                "mkvpropedit",
                "out.mkv",
                "--edit",
                "track:s1",
                "--set",
                "flag-default=0",
                "--edit",
                "track:s2",
                "--set",
                "flag-default=0",
            ]
        );
    }

    #[test]
    fn cleanup_remux_shape() {
        assert_eq!(
            cleanup_remux_command(Path::new("out.mkv"), Path::new("tmp.mkv")),
            vec!["mkvmerge", "-o", "out.mkv", "tmp.mkv"]
        );
    }
}
