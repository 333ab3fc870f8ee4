//! Core library for inspecting, remuxing and transcoding Blu-ray and DVD rips.
//!
//! This crate parses ffprobe output into a stream model, detects black bars
//! and interlacing artefacts by sampling with ffmpeg, and builds command
//! lines for mkvmerge, mkvpropedit and HandBrakeCLI. It never processes media itself; every
//! heavy operation is delegated to those external tools.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use riptools_core::external::ffprobe;
//! use riptools_core::media::MediaInfo;
//! use std::path::Path;
//!
//! let input = Path::new("/path/to/rip.mkv");
//! let probe = ffprobe::probe(input).unwrap();
//! let media = MediaInfo::from_probe(input.to_path_buf(), &probe).unwrap();
//! let crop = riptools_core::detection::detect_crop(input, &media.video).unwrap();
//! println!("{}", crop.to_crop(media.video.width, media.video.height));
//! ```

pub mod detection;
pub mod error;
pub mod external;
pub mod media;
pub mod remux;
pub mod transcode;
pub mod utils;

// Re-exports for public API
pub use detection::{detect_crop, detect_interlacing_artefacts, Crop, CropGeometry};
pub use error::{CoreError, CoreResult};
pub use media::{HdrInfo, InspectionReport, MediaInfo};
pub use remux::RemuxOptions;
pub use transcode::{BurnChoice, SubtitleChoice, TrackSelector, TranscodeOptions, TranscodePlan};
pub use utils::{format_bitrate, format_duration, parse_timestamp};
