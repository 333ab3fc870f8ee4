//! Remuxing rips into clean Matroska files with mkvmerge.
//!
//! The remux keeps the video stream, a chosen set of audio and subtitle
//! streams, and nothing else: buttons, attachments and tags are dropped and
//! the container title is cleared. Track selection uses 1-based positions
//! within each stream type; the generated command itself addresses streams
//! by their container index, which is what mkvmerge expects.

use crate::error::{CoreError, CoreResult};
use crate::media::{MediaInfo, SubtitleStream};

use std::path::{Path, PathBuf};

/// Track selection for a remux.
#[derive(Debug, Clone, Default)]
pub struct RemuxOptions {
    /// 1-based audio positions to keep. Empty keeps all.
    pub audio_tracks: Vec<usize>,
    /// 1-based subtitle positions to keep. Empty keeps all.
    pub subtitle_tracks: Vec<usize>,
    /// 1-based subtitle position to flag as forced/default.
    pub forced_subtitle: Option<usize>,
}

/// Output path for a remux: `TITLE.mkv` in the current directory.
#[must_use]
pub fn output_path(input: &Path) -> PathBuf {
    let title = input
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    PathBuf::from(format!("{title}.mkv"))
}

/// Builds the full mkvmerge invocation for a remux.
pub fn build_command(
    media: &MediaInfo,
    options: &RemuxOptions,
    output: &Path,
) -> CoreResult<Vec<String>> {
    for &track in &options.audio_tracks {
        if track == 0 || media.audio.len() < track {
            return Err(CoreError::InvalidSelection(format!(
                "Selected audio track out of range: {track}"
            )));
        }
    }
    for &track in &options.subtitle_tracks {
        if track == 0 || media.subtitles.len() < track {
            return Err(CoreError::InvalidSelection(format!(
                "Selected subtitle track out of range: {track}"
            )));
        }
    }
    if let Some(forced) = options.forced_subtitle {
        if forced == 0 || media.subtitles.len() < forced {
            return Err(CoreError::InvalidSelection(format!(
                "Forced subtitle out of range: {forced}"
            )));
        }
    }

    let selected_audio: Vec<_> = if options.audio_tracks.is_empty() {
        media.audio.iter().collect()
    } else {
        media
            .audio
            .iter()
            .filter(|stream| options.audio_tracks.contains(&stream.position))
            .collect()
    };
    let first_audio = selected_audio.first().ok_or_else(|| {
        CoreError::MediaParse(format!("No audio streams in {}", media.path.display()))
    })?;

    let mut selected_subtitles: Vec<&SubtitleStream> = if options.subtitle_tracks.is_empty() {
        media.subtitles.iter().collect()
    } else {
        media
            .subtitles
            .iter()
            .filter(|stream| options.subtitle_tracks.contains(&stream.position))
            .collect()
    };
    let forced_stream = options
        .forced_subtitle
        .and_then(|position| media.subtitle_track(position));
    if let Some(forced) = forced_stream {
        // The forced track rides along even when not explicitly selected
        if !selected_subtitles
            .iter()
            .any(|stream| stream.position == forced.position)
        {
            selected_subtitles.push(forced);
        }
    }

    let video_index = media.video.stream_index.to_string();
    let first_audio_index = first_audio.stream_index.to_string();

    let mut command = vec![
        "mkvmerge".to_string(),
        "--output".to_string(),
        output.to_string_lossy().into_owned(),
        "--title".to_string(),
        String::new(),
        "--default-track".to_string(),
        video_index.clone(),
        "--default-track".to_string(),
        first_audio_index,
    ];

    let mut subtitle_arg = String::new();
    for subtitle in &selected_subtitles {
        if !subtitle_arg.is_empty() {
            subtitle_arg.push(',');
        }
        let stream_index = subtitle.stream_index.to_string();
        subtitle_arg.push_str(&stream_index);

        let is_forced = forced_stream.is_some_and(|forced| forced.position == subtitle.position);
        if is_forced {
            command.push("--default-track".to_string());
            command.push(stream_index.clone());
            command.push("--forced-track".to_string());
            command.push(stream_index);
        } else {
            command.push("--default-track".to_string());
            command.push(format!("{stream_index}:0"));
            command.push("--forced-track".to_string());
            command.push(format!("{stream_index}:0"));
        }
    }

    let audio_arg = selected_audio
        .iter()
        .map(|stream| stream.stream_index.to_string())
        .collect::<Vec<_>>()
        .join(",");

    command.push("--video-tracks".to_string());
    command.push(video_index);
    command.push("--audio-tracks".to_string());
    command.push(audio_arg);

    if !subtitle_arg.is_empty() {
        command.push("--subtitle-tracks".to_string());
        command.push(subtitle_arg);
    }

    command.extend(
        [
            "--no-buttons",
            "--no-attachments",
            "--no-track-tags",
            "--no-global-tags",
        ]
        .iter()
        .map(ToString::to_string),
    );
    command.push(media.path.to_string_lossy().into_owned());

    Ok(command)
}
