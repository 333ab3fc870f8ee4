//! Audio track selection and the passthrough/transcode policy.
//!
//! Surround sources become 640kb/s AC3, stereo 192kb/s AAC and mono 96kb/s
//! AAC (448/160/80 with `--small`). A source track already in AC3 or AAC is
//! copied untouched when its bitrate is within budget; stereo and mono get
//! 1.5x headroom since a lossy re-encode costs more than the saved bits.

use crate::error::{CoreError, CoreResult};
use crate::external::handbrake::AvailableEncoders;
use crate::media::MediaInfo;

use super::{resolve_selectors, TranscodeOptions};

// Codecs HandBrake can pass through with `copy`.
const PASSTHROUGH_CODECS: [&str; 2] = ["ac3", "aac"];

struct AudioBitrates {
    surround: u32,
    stereo: u32,
    mono: u32,
}

const DEFAULT_BITRATES: AudioBitrates = AudioBitrates {
    surround: 640,
    stereo: 192,
    mono: 96,
};

const SMALL_BITRATES: AudioBitrates = AudioBitrates {
    surround: 448,
    stereo: 160,
    mono: 80,
};

/// Picks the best available AAC encoder, preferring Apple's, then
/// Fraunhofer's, then the ffmpeg built-in.
pub fn select_aac_encoder(available: &AvailableEncoders) -> CoreResult<&'static str> {
    ["ca_aac", "fdk_aac", "av_aac"]
        .into_iter()
        .find(|name| available.has_audio(name))
        .ok_or_else(|| CoreError::DependencyNotFound("No AAC audio encoder found".to_string()))
}

/// Audio arguments plus the language of the main (first selected) track,
/// which drives the default subtitle selection.
pub fn audio_args(
    media: &MediaInfo,
    options: &TranscodeOptions,
    encoders: &AvailableEncoders,
) -> CoreResult<(Vec<String>, String)> {
    let aac_encoder = select_aac_encoder(encoders)?;
    if !encoders.has_audio("ac3") {
        return Err(CoreError::DependencyNotFound(
            "No AC3 audio encoder found".to_string(),
        ));
    }

    let bitrates = if options.small {
        &SMALL_BITRATES
    } else {
        &DEFAULT_BITRATES
    };

    let tracks: Vec<(usize, &str)> = media
        .audio
        .iter()
        .map(|stream| (stream.position, stream.language.as_str()))
        .collect();
    let selected = resolve_selectors(&options.audio, &tracks);
    if selected.is_empty() {
        return Err(CoreError::InvalidSelection(
            "No audio tracks selected".to_string(),
        ));
    }

    let mut args = vec![
        "--audio".to_string(),
        selected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    ];

    let mut track_encoders = Vec::new();
    let mut mixdowns = Vec::new();
    let mut track_bitrates = Vec::new();

    for &position in &selected {
        let stream = media.audio_track(position).ok_or_else(|| {
            CoreError::InvalidSelection(format!("Invalid track index: {position}"))
        })?;
        let passthrough_codec = PASSTHROUGH_CODECS.contains(&stream.codec.as_str());

        if options.stereo {
            let stereo_fits = stream.channels <= 2
                && passthrough_codec
                && stream
                    .bitrate_kbps
                    .is_some_and(|rate| rate as f64 <= f64::from(bitrates.stereo) * 1.5);
            if stereo_fits {
                track_encoders.push("copy".to_string());
                mixdowns.push(String::new());
                track_bitrates.push(String::new());
            } else {
                mixdowns.push(if stream.channels > 2 {
                    "stereo".to_string()
                } else {
                    String::new()
                });
                track_encoders.push(aac_encoder.to_string());
                track_bitrates.push(
                    if stream.channels >= 2 {
                        bitrates.stereo
                    } else {
                        bitrates.mono
                    }
                    .to_string(),
                );
            }
        } else {
            let (budget, headroom) = if stream.channels > 2 {
                (bitrates.surround, 1.0)
            } else if stream.channels == 2 {
                (bitrates.stereo, 1.5)
            } else {
                (bitrates.mono, 1.5)
            };

            let fits = passthrough_codec
                && stream
                    .bitrate_kbps
                    .is_some_and(|rate| rate as f64 <= f64::from(budget) * headroom);
            if fits {
                track_encoders.push("copy".to_string());
                mixdowns.push(String::new());
                track_bitrates.push(String::new());
            } else {
                track_encoders.push(if stream.channels > 2 {
                    "ac3".to_string()
                } else {
                    aac_encoder.to_string()
                });
                mixdowns.push(String::new());
                track_bitrates.push(budget.to_string());
            }
        }
    }

    args.push("--aencoder".to_string());
    args.push(track_encoders.join(","));

    if mixdowns.iter().any(|mixdown| !mixdown.is_empty()) {
        args.push("--mixdown".to_string());
        args.push(mixdowns.join(","));
    }
    if track_bitrates.iter().any(|bitrate| !bitrate.is_empty()) {
        args.push("--ab".to_string());
        args.push(track_bitrates.join(","));
    }

    // Position validity was checked above, the lookup cannot fail here
    let main_language = media
        .audio_track(selected[0])
        .map(|stream| stream.language.clone())
        .unwrap_or_else(|| "und".to_string());

    Ok((args, main_language))
}
