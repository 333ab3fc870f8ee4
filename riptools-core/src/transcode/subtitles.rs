//! Subtitle inclusion and burn-in policy.

use crate::error::{CoreError, CoreResult};
use crate::media::MediaInfo;

use super::{resolve_selectors, BurnChoice, SubtitleChoice, TranscodeOptions};

/// Subtitle arguments plus the 1-based output positions of tracks added
/// without being burned. The burned track always ends up first in the
/// HandBrake selection, which is what `--subtitle-burned` acts on.
pub fn subtitle_args(
    media: &MediaInfo,
    options: &TranscodeOptions,
    audio_language: &str,
) -> CoreResult<(Vec<String>, Vec<usize>)> {
    let tracks: Vec<(usize, &str)> = media
        .subtitles
        .iter()
        .map(|stream| (stream.position, stream.language.as_str()))
        .collect();

    let mut selected = match &options.subtitles {
        SubtitleChoice::Auto => tracks
            .iter()
            .filter(|(_, language)| *language == audio_language)
            .map(|(position, _)| *position)
            .collect(),
        SubtitleChoice::Selected(selectors) => resolve_selectors(selectors, &tracks),
        SubtitleChoice::Off => Vec::new(),
    };

    let burned = match options.burn {
        BurnChoice::Auto => {
            let mut forced = None;
            for stream in &media.subtitles {
                if stream.forced {
                    if forced.is_some() {
                        return Err(CoreError::InvalidSelection(
                            "Multiple forced subtitle tracks detected".to_string(),
                        ));
                    }
                    forced = Some(stream.position);
                }
            }
            forced
        }
        BurnChoice::Track(position) => Some(position),
        BurnChoice::Off => None,
    };

    if let Some(position) = burned {
        selected.insert(0, position);
    }

    let mut deduped = Vec::new();
    for position in selected {
        if !deduped.contains(&position) {
            deduped.push(position);
        }
    }

    for &position in &deduped {
        if media.subtitle_track(position).is_none() {
            return Err(CoreError::InvalidSelection(format!(
                "Invalid subtitle track index: {position}"
            )));
        }
    }

    let mut args = Vec::new();
    if !deduped.is_empty() {
        args.push("--subtitle".to_string());
        args.push(
            deduped
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    let added = if let Some(position) = burned {
        args.push("--subtitle-burned".to_string());
        deduped.into_iter().filter(|&p| p != position).collect()
    } else {
        deduped
    };

    Ok((args, added))
}
