//! Video encoder selection and rate control.

use crate::error::{CoreError, CoreResult};
use crate::external::handbrake::AvailableEncoders;
use crate::media::VideoStream;

use super::TranscodeOptions;

use once_cell::sync::Lazy;

/// Output video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Avc,
    Hevc,
}

/// Rate-control tuning for one encoder.
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub encopts: Option<&'static str>,
    /// `vbv-maxrate` as a multiple of the target bitrate.
    pub maxrate: Option<f64>,
    /// `vbv-bufsize` as a multiple of the target bitrate.
    pub bufsize: Option<f64>,
}

impl Tuning {
    const NONE: Tuning = Tuning {
        encopts: None,
        maxrate: None,
        bufsize: None,
    };
}

/// A HandBrake video encoder this tool knows how to drive.
#[derive(Debug, Clone, Copy)]
pub struct EncoderSpec {
    pub name: &'static str,
    pub format: VideoFormat,
    pub hardware: bool,
    tuning: Tuning,
    hrd_tuning: Tuning,
}

impl EncoderSpec {
    fn tuning(&self, hrd: bool) -> &Tuning {
        if hrd { &self.hrd_tuning } else { &self.tuning }
    }
}

pub static SUPPORTED_ENCODERS: Lazy<Vec<EncoderSpec>> = Lazy::new(|| {
    vec![
        EncoderSpec {
            name: "x264",
            format: VideoFormat::Avc,
            hardware: false,
            tuning: Tuning {
                encopts: Some("ratetol=inf:mbtree=0"),
                maxrate: Some(3.0),
                bufsize: Some(3.75),
            },
            hrd_tuning: Tuning {
                encopts: Some("nal-hrd=vbr"),
                maxrate: Some(1.5),
                bufsize: Some(2.0),
            },
        },
        EncoderSpec {
            name: "x265",
            format: VideoFormat::Hevc,
            hardware: false,
            tuning: Tuning {
                encopts: Some(
                    "ctu=32:merange=25:weightb=1:aq-mode=1:cutree=0:deblock=-1,-1:selective-sao=2",
                ),
                maxrate: Some(1.5),
                bufsize: Some(2.0),
            },
            hrd_tuning: Tuning {
                encopts: Some(
                    "ctu=32:merange=25:weightb=1:aq-mode=1:cutree=0:deblock=-1,-1:selective-sao=2:hrd=1",
                ),
                maxrate: Some(1.5),
                bufsize: Some(2.0),
            },
        },
        EncoderSpec {
            name: "nvenc_h264",
            format: VideoFormat::Avc,
            hardware: true,
            tuning: Tuning {
                encopts: Some("spatial-aq=1"),
                ..Tuning::NONE
            },
            hrd_tuning: Tuning {
                encopts: Some("spatial-aq=1"),
                ..Tuning::NONE
            },
        },
        EncoderSpec {
            name: "nvenc_h265",
            format: VideoFormat::Hevc,
            hardware: true,
            tuning: Tuning {
                encopts: Some("spatial-aq=1:temporal-aq=1"),
                ..Tuning::NONE
            },
            hrd_tuning: Tuning {
                encopts: Some("spatial-aq=1:temporal-aq=1"),
                ..Tuning::NONE
            },
        },
        EncoderSpec {
            name: "qsv_h264",
            format: VideoFormat::Avc,
            hardware: true,
            tuning: Tuning::NONE,
            hrd_tuning: Tuning::NONE,
        },
        EncoderSpec {
            name: "qsv_h265",
            format: VideoFormat::Hevc,
            hardware: true,
            tuning: Tuning::NONE,
            hrd_tuning: Tuning::NONE,
        },
        EncoderSpec {
            name: "vce_h264",
            format: VideoFormat::Avc,
            hardware: true,
            tuning: Tuning::NONE,
            hrd_tuning: Tuning {
                encopts: Some("enforce_hrd=1"),
                ..Tuning::NONE
            },
        },
        EncoderSpec {
            name: "vce_h265",
            format: VideoFormat::Hevc,
            hardware: true,
            tuning: Tuning::NONE,
            hrd_tuning: Tuning {
                encopts: Some("enforce_hrd=1"),
                ..Tuning::NONE
            },
        },
        EncoderSpec {
            name: "vt_h264",
            format: VideoFormat::Avc,
            hardware: true,
            tuning: Tuning::NONE,
            hrd_tuning: Tuning::NONE,
        },
        EncoderSpec {
            name: "vt_h265",
            format: VideoFormat::Hevc,
            hardware: true,
            tuning: Tuning::NONE,
            hrd_tuning: Tuning::NONE,
        },
    ]
});

// Faster hardware encoders are preferred over more broadly available ones.
const HEVC_HW_PREFERENCE: [&str; 4] = ["nvenc_h265", "qsv_h265", "vce_h265", "vt_h265"];
const AVC_HW_PREFERENCE: [&str; 4] = ["qsv_h264", "nvenc_h264", "vce_h264", "vt_h264"];

fn spec_by_name(name: &str) -> Option<&'static EncoderSpec> {
    SUPPORTED_ENCODERS.iter().find(|spec| spec.name == name)
}

/// Picks the encoder for a format, falling through the hardware preference
/// order when acceleration is requested.
pub fn select_video_encoder(
    format: VideoFormat,
    hw_accel: bool,
    available: &AvailableEncoders,
) -> CoreResult<&'static EncoderSpec> {
    if hw_accel {
        let preference = match format {
            VideoFormat::Hevc => &HEVC_HW_PREFERENCE,
            VideoFormat::Avc => &AVC_HW_PREFERENCE,
        };
        preference
            .iter()
            .filter(|name| available.has_video(name))
            .find_map(|name| spec_by_name(name))
            .ok_or_else(|| {
                CoreError::DependencyNotFound("No supported hardware encoders found".to_string())
            })
    } else {
        let name = match format {
            VideoFormat::Hevc => "x265",
            VideoFormat::Avc => "x264",
        };
        spec_by_name(name).ok_or_else(|| {
            CoreError::DependencyNotFound(format!("Encoder not supported: {name}"))
        })
    }
}

/// Average bitrate target in kb/s and the matching encoder level, by output
/// resolution class and frame rate.
#[must_use]
pub fn target_bitrate(
    width: u32,
    height: u32,
    fps: f64,
    small: bool,
    hevc: bool,
) -> (u32, &'static str) {
    let (full_hd, hd, sd) = if small && hevc {
        (5000.0, 2500.0, 1250.0)
    } else if small || hevc {
        (6000.0, 3000.0, 1500.0)
    } else {
        (8000.0, 4000.0, 2000.0)
    };

    let hfr = fps > 30.0;
    let multiplier = if hfr { 1.2 } else { 1.0 };

    let (bitrate, level) = if width > 1280 || height > 720 {
        let level = if !hfr {
            "4.0"
        } else if hevc {
            "4.1"
        } else {
            "4.2"
        };
        (full_hd * multiplier, level)
    } else if width * height > 720 * 576 {
        let level = if !hfr {
            "3.1"
        } else if hevc {
            "4.0"
        } else {
            "3.2"
        };
        (hd * multiplier, level)
    } else {
        (sd * multiplier, if !hfr { "3.0" } else { "3.1" })
    };

    (bitrate as u32, level)
}

/// Picture, encoder and rate-control arguments.
pub fn video_args(
    video: &VideoStream,
    options: &TranscodeOptions,
    encoders: &AvailableEncoders,
) -> CoreResult<Vec<String>> {
    let mut args = Vec::new();

    if let Some(par) = &options.par {
        args.push("--pixel-aspect".to_string());
        args.push(par.clone());
    }

    args.push("--crop".to_string());
    match options.crop {
        Some(crop) => args.push(crop.to_string()),
        None => args.push("0:0:0:0".to_string()),
    }

    let mut fps = video.fps;
    if options.deinterlace.unwrap_or(video.interlaced) {
        if options.preserve_field_rate {
            args.push("--deinterlace=bob".to_string());
            fps *= 2.0;
        } else {
            args.push("--comb-detect".to_string());
            args.push("--decomb".to_string());
        }
    }

    let (bitrate, level) =
        target_bitrate(video.width, video.height, fps, options.small, options.hevc);

    let format = if options.hevc {
        VideoFormat::Hevc
    } else {
        VideoFormat::Avc
    };
    let encoder = select_video_encoder(format, options.hw_accel, encoders)?;

    args.push("--encoder".to_string());
    args.push(encoder.name.to_string());
    args.push("--encoder-level".to_string());
    args.push(level.to_string());

    let tuning = encoder.tuning(options.hrd);
    let mut encopts = tuning.encopts.map(str::to_string).unwrap_or_default();
    if let Some(maxrate) = tuning.maxrate {
        if !encopts.is_empty() {
            encopts.push(':');
        }
        encopts.push_str(&format!("vbv-maxrate={}", (maxrate * f64::from(bitrate)) as u32));
    }
    if let Some(bufsize) = tuning.bufsize {
        if !encopts.is_empty() {
            encopts.push(':');
        }
        encopts.push_str(&format!("vbv-bufsize={}", (bufsize * f64::from(bitrate)) as u32));
    }
    if !encopts.is_empty() {
        args.push("--encopts".to_string());
        args.push(encopts);
    }

    args.push("--vb".to_string());
    args.push(bitrate.to_string());

    if options.two_pass {
        args.push("--two-pass".to_string());
        args.push("--turbo".to_string());
    }

    Ok(args)
}
