//! Stream model built from ffprobe output, plus the inspection report.
//!
//! Streams are transient records living for one invocation: HandBrake-facing
//! commands address tracks by 1-based position within their type, while
//! mkvmerge addresses them by container stream index, so both are kept.

use crate::error::{CoreError, CoreResult};
use crate::external::ffprobe::{FfprobeFrame, FfprobeOutput, FfprobeStream};
use crate::utils::{format_bitrate, format_duration, parse_rational};

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub video: VideoStream,
    pub audio: Vec<AudioStream>,
    pub subtitles: Vec<SubtitleStream>,
}

#[derive(Debug, Clone)]
pub struct VideoStream {
    pub stream_index: i64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub interlaced: bool,
    pub fps: f64,
    /// Container duration. Broken rips can lack one; only the ffmpeg
    /// sampling detectors actually need it.
    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AudioStream {
    /// 1-based position among audio streams (HandBrake track numbering).
    pub position: usize,
    /// Container stream index (mkvmerge track id).
    pub stream_index: i64,
    pub language: String,
    pub codec: String,
    pub channels: u32,
    pub layout: String,
    pub bitrate_kbps: Option<u64>,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubtitleStream {
    /// 1-based position among subtitle streams (HandBrake track numbering).
    pub position: usize,
    /// Container stream index (mkvmerge track id).
    pub stream_index: i64,
    pub language: String,
    pub codec: String,
    pub forced: bool,
    pub default: bool,
    pub frame_count: Option<u64>,
}

impl MediaInfo {
    /// Builds the stream model from one ffprobe probe.
    ///
    /// Fails when there is no usable video stream.
    pub fn from_probe(path: PathBuf, probe: &FfprobeOutput) -> CoreResult<Self> {
        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| {
                CoreError::MediaParse(format!("No video stream found in {}", path.display()))
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok());

        let width = dimension(video_stream.width, "width", &path)?;
        let height = dimension(video_stream.height, "height", &path)?;

        let fps = video_stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rational)
            .unwrap_or(0.0);

        let video = VideoStream {
            stream_index: video_stream.index,
            width,
            height,
            codec: video_stream.codec_name.clone(),
            interlaced: video_stream
                .field_order
                .as_deref()
                .is_some_and(|order| order != "progressive"),
            fps,
            duration_secs,
            bitrate_kbps: video_stream.bitrate_kbps(),
        };

        let mut audio_streams: Vec<&FfprobeStream> = probe
            .streams
            .iter()
            .filter(|s| s.codec_type == "audio")
            .collect();
        audio_streams.sort_by_key(|s| s.index);

        let audio = audio_streams
            .iter()
            .enumerate()
            .map(|(i, s)| AudioStream {
                position: i + 1,
                stream_index: s.index,
                language: s.language().to_string(),
                codec: audio_codec(s),
                channels: s.channels.unwrap_or(0).max(0) as u32,
                layout: channel_layout(s),
                bitrate_kbps: s.bitrate_kbps(),
                title: s.tags.get("title").cloned(),
            })
            .collect();

        let mut subtitle_streams: Vec<&FfprobeStream> = probe
            .streams
            .iter()
            .filter(|s| s.codec_type == "subtitle")
            .collect();
        subtitle_streams.sort_by_key(|s| s.index);

        let subtitles = subtitle_streams
            .iter()
            .enumerate()
            .map(|(i, s)| SubtitleStream {
                position: i + 1,
                stream_index: s.index,
                language: s.language().to_string(),
                codec: s.codec_name.clone(),
                forced: s.disposition.forced != 0,
                default: s.disposition.default != 0,
                frame_count: s
                    .tags
                    .get("NUMBER_OF_FRAMES-eng")
                    .or_else(|| s.tags.get("NUMBER_OF_FRAMES"))
                    .and_then(|n| n.parse::<u64>().ok()),
            })
            .collect();

        Ok(MediaInfo {
            path,
            video,
            audio,
            subtitles,
        })
    }

    /// Audio stream at a 1-based position.
    #[must_use]
    pub fn audio_track(&self, position: usize) -> Option<&AudioStream> {
        self.audio.get(position.checked_sub(1)?)
    }

    /// Subtitle stream at a 1-based position.
    #[must_use]
    pub fn subtitle_track(&self, position: usize) -> Option<&SubtitleStream> {
        self.subtitles.get(position.checked_sub(1)?)
    }
}

fn dimension(value: Option<i64>, name: &str, path: &std::path::Path) -> CoreResult<u32> {
    match value {
        Some(v) if v > 0 => Ok(v as u32),
        _ => Err(CoreError::MediaParse(format!(
            "Video stream missing {name} in {}",
            path.display()
        ))),
    }
}

// DTS variants (DTS-HD MA, DTS:X, ...) only show up in the profile field.
fn audio_codec(stream: &FfprobeStream) -> String {
    if stream.codec_name == "dts" {
        if let Some(profile) = &stream.profile {
            return profile.to_lowercase();
        }
    }
    stream.codec_name.clone()
}

fn channel_layout(stream: &FfprobeStream) -> String {
    match &stream.channel_layout {
        Some(layout) if !layout.is_empty() => layout.clone(),
        _ => match stream.channels {
            Some(1) => "mono".to_string(),
            Some(2) => "stereo".to_string(),
            _ => "unknown".to_string(),
        },
    }
}

// ---- HDR detection ------------------------------------------------------

/// HDR characteristics of the first video frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdrInfo {
    pub hdr: bool,
    pub hlg: bool,
    pub hdr10: bool,
    pub hdr10_plus: bool,
    pub dolby_vision: Option<String>,
}

const MASTERING_DISPLAY: &str = "Mastering display metadata";
const HDR10_PLUS: &str = "HDR Dynamic Metadata SMPTE2094-40 (HDR10+)";
const DOVI_RECORD: &str = "DOVI configuration record";

impl HdrInfo {
    /// Derives HDR flags from the video stream and its first decoded frame.
    #[must_use]
    pub fn detect(stream: &FfprobeStream, frame: Option<&FfprobeFrame>) -> Self {
        let transfer = frame
            .and_then(|f| f.color_transfer.as_deref())
            .unwrap_or("unknown");

        let hlg = transfer == "arib-std-b67";
        let pq = transfer == "smpte2084";
        let dolby_vision = dolby_vision_label(stream);
        let dovi_tag = matches!(stream.codec_tag_string.as_str(), "dvh1" | "dvhe");

        let hdr10 = frame.is_some_and(|f| {
            f.side_data_list.iter().any(|sd| {
                sd.side_data_type == MASTERING_DISPLAY
                    && [
                        "red_x",
                        "red_y",
                        "green_x",
                        "green_y",
                        "blue_x",
                        "blue_y",
                        "white_point_x",
                        "white_point_y",
                        "min_luminance",
                        "max_luminance",
                    ]
                    .iter()
                    .all(|key| sd.fields.contains_key(*key))
            })
        });

        let hdr10_plus = frame.is_some_and(|f| {
            f.side_data_list
                .iter()
                .any(|sd| sd.side_data_type == HDR10_PLUS)
        });

        HdrInfo {
            hdr: pq || hlg || dovi_tag,
            hlg,
            hdr10,
            hdr10_plus,
            dolby_vision,
        }
    }
}

fn dolby_vision_label(stream: &FfprobeStream) -> Option<String> {
    let record = stream
        .side_data_list
        .iter()
        .find(|sd| sd.side_data_type == DOVI_RECORD)?;

    let profile = record
        .fields
        .get("dv_profile")
        .map_or_else(|| "unknown profile".to_string(), json_scalar);
    let compat_id = record
        .fields
        .get("dv_bl_signal_compatibility_id")
        .map_or_else(|| "unknown".to_string(), json_scalar);

    Some(format!("Dolby Vision {profile}.{compat_id}"))
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---- Inspection report ---------------------------------------------------

/// Human-readable stream listing printed by `riptools inspect`.
#[derive(Debug, Clone)]
pub struct InspectionReport {
    pub media: MediaInfo,
    pub hdr: HdrInfo,
    /// Result of the idet sampling pass over the source.
    pub interlacing_artefacts: bool,
}

impl fmt::Display for InspectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let video = &self.media.video;
        writeln!(f, "Video:")?;
        write!(
            f,
            "  {}x{}, {}, {}{}, {}",
            video.width,
            video.height,
            video.codec,
            if video.interlaced { "interlaced" } else { "progressive" },
            if self.interlacing_artefacts { " with artefacts" } else { "" },
            format_duration(video.duration_secs.unwrap_or(f64::NAN)),
        )?;
        if let Some(kbps) = video.bitrate_kbps {
            write!(f, ", {}", format_bitrate(kbps))?;
        }
        write!(f, ", {}", if self.hdr.hdr { "HDR" } else { "SDR" })?;
        if self.hdr.hlg {
            write!(f, " (HLG)")?;
        }
        if self.hdr.hdr10 {
            write!(f, " (HDR10)")?;
        }
        if self.hdr.hdr10_plus {
            write!(f, " (HDR10+)")?;
        }
        if let Some(dv) = &self.hdr.dolby_vision {
            write!(f, " ({dv})")?;
        }
        writeln!(f)?;

        writeln!(f, "Audio streams:")?;
        for audio in &self.media.audio {
            write!(
                f,
                "  {}: {}, {}, {}",
                audio.position, audio.language, audio.layout, audio.codec
            )?;
            if let Some(kbps) = audio.bitrate_kbps {
                write!(f, ", {}", format_bitrate(kbps))?;
            }
            if let Some(title) = &audio.title {
                write!(f, ", '{title}'")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Subtitle streams:")?;
        for subtitle in &self.media.subtitles {
            write!(
                f,
                "  {}: {}, {}",
                subtitle.position, subtitle.language, subtitle.codec
            )?;
            if let Some(count) = subtitle.frame_count {
                write!(f, ", {count} elements")?;
            }
            if subtitle.default {
                write!(f, ", default")?;
            }
            if subtitle.forced {
                write!(f, ", forced")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ffprobe::FfprobeOutput;

    fn probe_fixture() -> FfprobeOutput {
        serde_json::from_str(
            r#"{
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
                    "tags": {"BPS": "24000000"}
                },
                {
                    "index": 1,
                    "codec_name": "dts",
                    "profile": "DTS-HD MA",
                    "codec_type": "audio",
                    "channels": 6,
                    "channel_layout": "5.1(side)",
                    "tags": {"language": "eng", "title": "Surround", "BPS-eng": "1509000"}
                },
                {
                    "index": 2,
                    "codec_name": "ac3",
                    "codec_type": "audio",
                    "channels": 2,
                    "tags": {"language": "fra"}
                },
                {
                    "index": 3,
                    "codec_name": "hdmv_pgs_subtitle",
                    "codec_type": "subtitle",
                    "disposition": {"default": 1, "forced": 1},
                    "tags": {"language": "eng", "NUMBER_OF_FRAMES-eng": "42"}
                }
            ],
            "format": {"filename": "movie.mkv", "duration": "5970.000000"}
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_model_from_probe() {
        let media = MediaInfo::from_probe(PathBuf::from("movie.mkv"), &probe_fixture()).unwrap();

        assert_eq!(media.video.width, 1920);
        assert!(!media.video.interlaced);
        assert!((media.video.fps - 23.976).abs() < 0.001);
        assert_eq!(media.video.bitrate_kbps, Some(24000));

        assert_eq!(media.audio.len(), 2);
        assert_eq!(media.audio[0].position, 1);
        assert_eq!(media.audio[0].codec, "dts-hd ma");
        assert_eq!(media.audio[0].layout, "5.1(side)");
        assert_eq!(media.audio[1].layout, "stereo");
        assert_eq!(media.audio[1].language, "fra");

        assert_eq!(media.subtitles.len(), 1);
        assert!(media.subtitles[0].forced);
        assert_eq!(media.subtitles[0].frame_count, Some(42));
        assert_eq!(media.subtitles[0].stream_index, 3);

        assert_eq!(media.audio_track(2).unwrap().codec, "ac3");
        assert!(media.audio_track(3).is_none());
        assert!(media.audio_track(0).is_none());
    }

    #[test]
    fn missing_video_stream_is_an_error() {
        let probe: FfprobeOutput = serde_json::from_str(
            r#"{"streams": [{"index": 0, "codec_type": "audio"}],
                "format": {"duration": "10.0"}}"#,
        )
        .unwrap();
        let err = MediaInfo::from_probe(PathBuf::from("x.mkv"), &probe).unwrap_err();
        assert!(matches!(err, CoreError::MediaParse(_)));
    }

    #[test]
    fn interlaced_field_orders() {
        let mut probe = probe_fixture();
        probe.streams[0].field_order = Some("tt".to_string());
        let media = MediaInfo::from_probe(PathBuf::from("x.mkv"), &probe).unwrap();
        assert!(media.video.interlaced);

        probe.streams[0].field_order = None;
        let media = MediaInfo::from_probe(PathBuf::from("x.mkv"), &probe).unwrap();
        assert!(!media.video.interlaced);
    }

    #[test]
    fn detects_hdr10() {
        let frame: FfprobeFrame = serde_json::from_str(
            r#"{
            "color_transfer": "smpte2084",
            "side_data_list": [{
                "side_data_type": "Mastering display metadata",
                "red_x": "34000/50000", "red_y": "16000/50000",
                "green_x": "13250/50000", "green_y": "34500/50000",
                "blue_x": "7500/50000", "blue_y": "3000/50000",
                "white_point_x": "15635/50000", "white_point_y": "16450/50000",
                "min_luminance": "50/10000", "max_luminance": "10000000/10000"
            }]
        }"#,
        )
        .unwrap();
        let stream = FfprobeStream::default();

        let hdr = HdrInfo::detect(&stream, Some(&frame));
        assert!(hdr.hdr);
        assert!(hdr.hdr10);
        assert!(!hdr.hlg);
        assert!(!hdr.hdr10_plus);
        assert!(hdr.dolby_vision.is_none());
    }

    #[test]
    fn detects_dolby_vision_from_stream_side_data() {
        let stream: FfprobeStream = serde_json::from_str(
            r#"{
            "index": 0,
            "codec_type": "video",
            "codec_tag_string": "dvhe",
            "side_data_list": [{
                "side_data_type": "DOVI configuration record",
                "dv_profile": 8,
                "dv_bl_signal_compatibility_id": 1
            }]
        }"#,
        )
        .unwrap();

        let hdr = HdrInfo::detect(&stream, None);
        assert!(hdr.hdr);
        assert_eq!(hdr.dolby_vision.as_deref(), Some("Dolby Vision 8.1"));
    }

    #[test]
    fn sdr_without_frame_info() {
        let hdr = HdrInfo::detect(&FfprobeStream::default(), None);
        assert_eq!(hdr, HdrInfo::default());
    }

    #[test]
    fn missing_container_duration_is_tolerated() {
        let mut probe = probe_fixture();
        probe.format.duration = None;
        let media = MediaInfo::from_probe(PathBuf::from("x.mkv"), &probe).unwrap();
        assert_eq!(media.video.duration_secs, None);

        let report = InspectionReport {
            media,
            hdr: HdrInfo::default(),
            interlacing_artefacts: false,
        };
        assert!(report.to_string().contains("h264, progressive, ?:??:??"));
    }

    #[test]
    fn report_formatting() {
        let media = MediaInfo::from_probe(PathBuf::from("movie.mkv"), &probe_fixture()).unwrap();
        let report = InspectionReport {
            media,
            hdr: HdrInfo::default(),
            interlacing_artefacts: false,
        };

        let text = report.to_string();
        assert!(text.contains("Video:\n  1920x1080, h264, progressive, 1:39:30, 24,000 kb/s, SDR"));
        assert!(text.contains("  1: eng, 5.1(side), dts-hd ma, 1,509 kb/s, 'Surround'"));
        assert!(text.contains("  2: fra, stereo, ac3"));
        assert!(text.contains("  1: eng, hdmv_pgs_subtitle, 42 elements, default, forced"));
    }

    #[test]
    fn report_flags_interlacing_artefacts() {
        let mut probe = probe_fixture();
        probe.streams[0].field_order = Some("tt".to_string());
        let media = MediaInfo::from_probe(PathBuf::from("movie.mkv"), &probe).unwrap();
        let report = InspectionReport {
            media,
            hdr: HdrInfo::default(),
            interlacing_artefacts: true,
        };
        assert!(report
            .to_string()
            .contains("1920x1080, h264, interlaced with artefacts, 1:39:30"));
    }
}
