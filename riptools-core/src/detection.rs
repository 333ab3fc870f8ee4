//! Black bar and interlacing artefact detection, plus the crop sidecar.
//!
//! Both detectors sample the source at evenly spaced positions with an
//! ffmpeg filter: cropdetect merges the reported rectangles, idet votes on
//! field statistics. Sampling is deliberately sequential; one ffmpeg run
//! finishes before the next starts.
//!
//! Two crop notations are in play: ffmpeg reports `w:h:x:y` rectangles,
//! HandBrake and the `crop.txt` sidecar use `top:bottom:left:right` margins.

use crate::error::{CoreError, CoreResult};
use crate::external::ffmpeg;
use crate::media::VideoStream;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Sidecar filename, stored next to the source file.
pub const CROP_SIDECAR: &str = "crop.txt";

// Sampling aims for one probe every five minutes on long sources.
const DEFAULT_STEPS: u64 = 10;
const TARGET_INTERVAL_SECS: f64 = 5.0 * 60.0;

/// Crop margins in HandBrake order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Crop {
    /// The identity crop.
    pub const NONE: Crop = Crop {
        top: 0,
        bottom: 0,
        left: 0,
        right: 0,
    };
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.top, self.bottom, self.left, self.right)
    }
}

impl FromStr for Crop {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<u32> = s
            .split(':')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid_crop(s))?;
        match fields.as_slice() {
            [top, bottom, left, right] => Ok(Crop {
                top: *top,
                bottom: *bottom,
                left: *left,
                right: *right,
            }),
            _ => Err(invalid_crop(s)),
        }
    }
}

fn invalid_crop(s: &str) -> CoreError {
    CoreError::CropDetection(format!("Invalid crop geometry: {s}"))
}

/// A crop rectangle in ffmpeg's cropdetect notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropGeometry {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropGeometry {
    /// The full frame (nothing cropped).
    #[must_use]
    pub fn full_frame(width: u32, height: u32) -> Self {
        CropGeometry {
            width,
            height,
            x: 0,
            y: 0,
        }
    }

    // Identity for `widen`: zero area positioned past the frame.
    fn empty(frame_width: u32, frame_height: u32) -> Self {
        CropGeometry {
            width: 0,
            height: 0,
            x: frame_width,
            y: frame_height,
        }
    }

    /// Grows this rectangle to cover `other` as well.
    pub fn widen(&mut self, other: &CropGeometry) {
        self.width = self.width.max(other.width);
        self.height = self.height.max(other.height);
        self.x = self.x.min(other.x);
        self.y = self.y.min(other.y);
    }

    /// Converts to HandBrake margins for the given frame dimensions.
    #[must_use]
    pub fn to_crop(self, frame_width: u32, frame_height: u32) -> Crop {
        let top = self.y;
        let left = self.x;
        Crop {
            top,
            bottom: frame_height.saturating_sub(top + self.height),
            left,
            right: frame_width.saturating_sub(left + self.width),
        }
    }
}

impl fmt::Display for CropGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

// ---- Sampling plan --------------------------------------------------------

/// Evenly spaced sample positions over the source duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePlan {
    pub steps: u64,
    pub interval_secs: u64,
}

impl SamplePlan {
    /// Plans sampling for a source of the given duration.
    ///
    /// Ten samples normally; very short sources get a single sample one
    /// second in, and sources longer than ~an hour get enough extra samples
    /// to keep the spacing near five minutes.
    pub fn for_duration(duration_secs: f64) -> CoreResult<SamplePlan> {
        if duration_secs < 2.0 {
            return Err(CoreError::CropDetection(format!(
                "Duration too short: {duration_secs}"
            )));
        }

        let mut steps = DEFAULT_STEPS;
        let mut interval = (duration_secs / (steps + 1) as f64) as u64;

        if interval == 0 {
            steps = 1;
            interval = 1;
        } else if interval as f64 > TARGET_INTERVAL_SECS {
            steps = ((duration_secs / TARGET_INTERVAL_SECS) - 1.0) as u64;
            interval = (duration_secs / (steps + 1) as f64) as u64;
        }

        Ok(SamplePlan {
            steps,
            interval_secs: interval,
        })
    }

    /// Seek positions in seconds, one per step.
    pub fn positions(&self) -> impl Iterator<Item = u64> + '_ {
        (1..=self.steps).map(|step| self.interval_secs * step)
    }
}

fn plan_for(video: &VideoStream) -> CoreResult<SamplePlan> {
    let duration = video.duration_secs.ok_or_else(|| {
        CoreError::MediaParse("Container duration missing, cannot plan sampling".to_string())
    })?;
    SamplePlan::for_duration(duration)
}

// ---- Sample parsing -------------------------------------------------------

/// Parses one cropdetect log line into a rectangle.
#[must_use]
pub fn parse_cropdetect_line(line: &str) -> Option<CropGeometry> {
    let crop_pos = line.find("crop=")?;
    let crop_part = &line[crop_pos + 5..];
    let end = crop_part
        .find(|c: char| c.is_whitespace())
        .unwrap_or(crop_part.len());

    let fields: Vec<u32> = crop_part[..end]
        .split(':')
        .map(|part| part.parse::<u32>())
        .collect::<Result<_, _>>()
        .ok()?;
    match fields.as_slice() {
        [width, height, x, y] => Some(CropGeometry {
            width: *width,
            height: *height,
            x: *x,
            y: *y,
        }),
        _ => None,
    }
}

/// Merges all cropdetect lines of one sample into a single rectangle.
#[must_use]
pub fn merge_sample(frame_width: u32, frame_height: u32, lines: &[String]) -> CropGeometry {
    let mut sample = CropGeometry::empty(frame_width, frame_height);
    for geometry in lines.iter().filter_map(|line| parse_cropdetect_line(line)) {
        sample.widen(&geometry);
    }
    sample
}

// ---- Accumulation ---------------------------------------------------------

/// Folds per-sample rectangles into a final detected crop.
///
/// An isolated full-frame sample right after a cropped one is treated as a
/// bright scene defeating cropdetect (fades, explosions) and skipped; too
/// many of those, and the whole detection falls back to no crop.
#[derive(Debug)]
pub struct CropAccumulator {
    frame_width: u32,
    frame_height: u32,
    merged: CropGeometry,
    last_sample: CropGeometry,
    ignore_count: u32,
}

impl CropAccumulator {
    #[must_use]
    pub fn new(frame_width: u32, frame_height: u32) -> Self {
        let empty = CropGeometry::empty(frame_width, frame_height);
        CropAccumulator {
            frame_width,
            frame_height,
            merged: empty,
            last_sample: empty,
            ignore_count: 0,
        }
    }

    pub fn add_sample(&mut self, sample: CropGeometry) {
        let full_frame = CropGeometry::full_frame(self.frame_width, self.frame_height);
        if sample == full_frame && self.last_sample != full_frame {
            self.ignore_count += 1;
            log::debug!("Ignoring full-frame sample after cropped sample");
        } else {
            self.merged.widen(&sample);
        }
        self.last_sample = sample;
    }

    /// The final rectangle, after sanity checks against false positives.
    #[must_use]
    pub fn finish(self) -> CropGeometry {
        let full_frame = CropGeometry::full_frame(self.frame_width, self.frame_height);
        let nothing_detected =
            self.merged == CropGeometry::empty(self.frame_width, self.frame_height);
        // A bare two-pixel side crop with ignored samples is cropdetect
        // rounding, not a real matte
        let sliver = self.ignore_count > 0
            && self.merged.width + 2 == self.frame_width
            && self.merged.height == self.frame_height;

        if nothing_detected || self.ignore_count > 2 || sliver {
            full_frame
        } else {
            self.merged
        }
    }
}

// ---- Detection entry point ------------------------------------------------

/// Detects the crop rectangle of a source by sampling it with ffmpeg.
pub fn detect_crop(input: &Path, video: &VideoStream) -> CoreResult<CropGeometry> {
    let plan = plan_for(video)?;
    log::debug!(
        "Crop detection: {} steps, {}s interval",
        plan.steps,
        plan.interval_secs
    );

    let mut accumulator = CropAccumulator::new(video.width, video.height);
    for position in plan.positions() {
        let lines = ffmpeg::cropdetect_sample(input, position)?;
        let sample = merge_sample(video.width, video.height, &lines);
        log::trace!("Sample at {position}s: {sample}");
        accumulator.add_sample(sample);
    }

    Ok(accumulator.finish())
}

// ---- Interlacing artefacts ------------------------------------------------

/// Frame counts reported by ffmpeg's idet filter for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdetCounts {
    pub tff: u64,
    pub bff: u64,
    pub progressive: u64,
    pub undetermined: u64,
}

/// What one idet sample says about the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleVerdict {
    Interlaced,
    Progressive,
    Undetermined,
}

impl IdetCounts {
    /// This sample's reading. A field order only counts when it beats both
    /// progressive and undetermined frames two to one; same bar for
    /// progressive against each field order.
    #[must_use]
    pub fn verdict(&self) -> SampleVerdict {
        let dominant = |n: u64| n > 2 * self.progressive && n > 2 * self.undetermined;
        if dominant(self.tff) || dominant(self.bff) {
            SampleVerdict::Interlaced
        } else if self.progressive > 2 * self.tff
            && self.progressive > 2 * self.bff
            && self.progressive > 2 * self.undetermined
        {
            SampleVerdict::Progressive
        } else {
            SampleVerdict::Undetermined
        }
    }
}

/// Parses one idet summary log line into frame counts.
#[must_use]
pub fn parse_idet_line(line: &str) -> Option<IdetCounts> {
    let pos = line.find("Multi frame detection:")?;
    let rest = &line[pos..];
    Some(IdetCounts {
        tff: labelled_count(rest, "TFF:")?,
        bff: labelled_count(rest, "BFF:")?,
        progressive: labelled_count(rest, "Progressive:")?,
        undetermined: labelled_count(rest, "Undetermined:")?,
    })
}

// idet pads counts with spaces after the label
fn labelled_count(line: &str, label: &str) -> Option<u64> {
    let tail = line[line.find(label)? + label.len()..].trim_start();
    let end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    tail[..end].parse().ok()
}

/// Folds per-sample idet verdicts into a yes/no answer.
#[derive(Debug, Default)]
pub struct InterlaceTally {
    interlaced: u32,
    progressive: u32,
    undetermined: u32,
}

impl InterlaceTally {
    pub fn add_verdict(&mut self, verdict: SampleVerdict) {
        match verdict {
            SampleVerdict::Interlaced => self.interlaced += 1,
            SampleVerdict::Progressive => self.progressive += 1,
            SampleVerdict::Undetermined => self.undetermined += 1,
        }
    }

    /// The final answer. Errors when neither side holds an outright majority
    /// over everything else.
    pub fn finish(self) -> CoreResult<bool> {
        if self.interlaced > self.progressive + self.undetermined {
            Ok(true)
        } else if self.progressive > self.interlaced + self.undetermined {
            Ok(false)
        } else {
            Err(CoreError::OperationFailed(
                "Unable to determine whether the input is interlaced".to_string(),
            ))
        }
    }
}

/// Detects interlacing artefacts by sampling the source with ffmpeg's idet
/// filter, over the same positions crop detection uses.
pub fn detect_interlacing_artefacts(input: &Path, video: &VideoStream) -> CoreResult<bool> {
    let plan = plan_for(video)?;
    log::debug!(
        "Interlace detection: {} steps, {}s interval",
        plan.steps,
        plan.interval_secs
    );

    let mut tally = InterlaceTally::default();
    for position in plan.positions() {
        let lines = ffmpeg::idet_sample(input, position)?;
        for counts in lines.iter().filter_map(|line| parse_idet_line(line)) {
            log::trace!("Sample at {position}s: {counts:?}");
            tally.add_verdict(counts.verdict());
        }
    }
    tally.finish()
}

// ---- Sidecar --------------------------------------------------------------

/// Path of the crop sidecar for a given source file.
#[must_use]
pub fn sidecar_path(input: &Path) -> PathBuf {
    input
        .parent()
        .map_or_else(|| PathBuf::from(CROP_SIDECAR), |dir| dir.join(CROP_SIDECAR))
}

/// Reads the crop stored next to the source, if any.
pub fn read_sidecar(input: &Path) -> CoreResult<Option<Crop>> {
    let path = sidecar_path(input);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)?;
    let line = contents.lines().next().unwrap_or("").trim();
    let crop = line
        .parse::<Crop>()
        .map_err(|_| CoreError::CropDetection(format!("Invalid crop in {}: {line}", path.display())))?;
    Ok(Some(crop))
}

/// Writes the crop sidecar next to the source.
///
/// Returns `false` without touching anything when a sidecar already exists.
pub fn write_sidecar(input: &Path, crop: Crop) -> CoreResult<bool> {
    let path = sidecar_path(input);
    if path.exists() {
        return Ok(false);
    }
    fs::write(&path, format!("{crop}\n"))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_round_trip() {
        let crop: Crop = "140:140:0:0".parse().unwrap();
        assert_eq!(
            crop,
            Crop {
                top: 140,
                bottom: 140,
                left: 0,
                right: 0
            }
        );
        assert_eq!(crop.to_string(), "140:140:0:0");

        assert!("1:2:3".parse::<Crop>().is_err());
        assert!("1:2:3:4:5".parse::<Crop>().is_err());
        assert!("a:b:c:d".parse::<Crop>().is_err());
        assert!("-1:0:0:0".parse::<Crop>().is_err());
    }

    #[test]
    fn geometry_to_crop() {
        let geometry = CropGeometry {
            width: 1920,
            height: 800,
            x: 0,
            y: 140,
        };
        assert_eq!(
            geometry.to_crop(1920, 1080),
            Crop {
                top: 140,
                bottom: 140,
                left: 0,
                right: 0
            }
        );
        assert_eq!(
            CropGeometry::full_frame(1920, 1080).to_crop(1920, 1080),
            Crop::NONE
        );
    }

    #[test]
    fn sample_plan_arithmetic() {
        // Short source: one sample, one second in
        let plan = SamplePlan::for_duration(5.0).unwrap();
        assert_eq!(plan.steps, 1);
        assert_eq!(plan.interval_secs, 1);
        assert_eq!(plan.positions().collect::<Vec<_>>(), vec![1]);

        // Typical movie: ten samples
        let plan = SamplePlan::for_duration(600.0).unwrap();
        assert_eq!(plan.steps, 10);
        assert_eq!(plan.interval_secs, 54);

        // Long source: spacing capped near five minutes
        let plan = SamplePlan::for_duration(7200.0).unwrap();
        assert_eq!(plan.steps, 23);
        assert_eq!(plan.interval_secs, 300);

        assert!(SamplePlan::for_duration(1.5).is_err());
    }

    #[test]
    fn parses_cropdetect_lines() {
        let line = "[Parsed_cropdetect_0 @ 0x7f8] x1:0 x2:1919 y1:140 y2:939 w:1920 h:800 x:0 y:140 pts:0 t:0.000000 crop=1920:800:0:140";
        assert_eq!(
            parse_cropdetect_line(line),
            Some(CropGeometry {
                width: 1920,
                height: 800,
                x: 0,
                y: 140
            })
        );
        // Trailing fields after the crop value
        assert_eq!(
            parse_cropdetect_line("crop=1920:800:0:140 pts:1234"),
            Some(CropGeometry {
                width: 1920,
                height: 800,
                x: 0,
                y: 140
            })
        );
        assert_eq!(parse_cropdetect_line("no rectangles here"), None);
        assert_eq!(parse_cropdetect_line("crop=bad:values"), None);
    }

    #[test]
    fn merge_widens_over_lines() {
        let lines = vec![
            "crop=1920:800:0:140".to_string(),
            "crop=1900:810:10:130".to_string(),
            "garbage".to_string(),
        ];
        assert_eq!(
            merge_sample(1920, 1080, &lines),
            CropGeometry {
                width: 1920,
                height: 810,
                x: 0,
                y: 130
            }
        );
    }

    fn letterbox() -> CropGeometry {
        CropGeometry {
            width: 1920,
            height: 800,
            x: 0,
            y: 140,
        }
    }

    #[test]
    fn consistent_samples_detect_letterbox() {
        let mut acc = CropAccumulator::new(1920, 1080);
        for _ in 0..10 {
            acc.add_sample(letterbox());
        }
        assert_eq!(acc.finish(), letterbox());
    }

    #[test]
    fn no_rectangles_means_no_crop() {
        let mut acc = CropAccumulator::new(1920, 1080);
        for _ in 0..10 {
            acc.add_sample(merge_sample(1920, 1080, &[]));
        }
        assert_eq!(acc.finish(), CropGeometry::full_frame(1920, 1080));
    }

    #[test]
    fn isolated_full_frame_samples_are_ignored() {
        let full = CropGeometry::full_frame(1920, 1080);
        let mut acc = CropAccumulator::new(1920, 1080);
        acc.add_sample(letterbox());
        acc.add_sample(full); // bright scene, skipped
        acc.add_sample(letterbox());
        assert_eq!(acc.finish(), letterbox());
    }

    #[test]
    fn too_many_ignored_samples_fall_back_to_full_frame() {
        let full = CropGeometry::full_frame(1920, 1080);
        let mut acc = CropAccumulator::new(1920, 1080);
        for _ in 0..3 {
            acc.add_sample(letterbox());
            acc.add_sample(full);
        }
        assert_eq!(acc.finish(), full);
    }

    #[test]
    fn sliver_crop_with_ignored_sample_is_rejected() {
        let full = CropGeometry::full_frame(1920, 1080);
        let sliver = CropGeometry {
            width: 1918,
            height: 1080,
            x: 2,
            y: 0,
        };
        let mut acc = CropAccumulator::new(1920, 1080);
        acc.add_sample(sliver);
        acc.add_sample(full);
        acc.add_sample(sliver);
        assert_eq!(acc.finish(), full);
    }

    #[test]
    fn detection_requires_a_container_duration() {
        let video = VideoStream {
            stream_index: 0,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
            interlaced: false,
            fps: 23.976,
            duration_secs: None,
            bitrate_kbps: None,
        };
        assert!(matches!(
            detect_crop(Path::new("movie.mkv"), &video),
            Err(CoreError::MediaParse(_))
        ));
        assert!(matches!(
            detect_interlacing_artefacts(Path::new("movie.mkv"), &video),
            Err(CoreError::MediaParse(_))
        ));
    }

    #[test]
    fn parses_idet_lines() {
        let line = "[Parsed_idet_0 @ 0x7f8] Multi frame detection: TFF:    45 BFF:     0 Progressive:     3 Undetermined:     2";
        assert_eq!(
            parse_idet_line(line),
            Some(IdetCounts {
                tff: 45,
                bff: 0,
                progressive: 3,
                undetermined: 2
            })
        );
        assert_eq!(parse_idet_line("Single frame detection: TFF: 1"), None);
        assert_eq!(parse_idet_line("frame=  100 fps=0.0"), None);
    }

    #[test]
    fn idet_sample_verdicts() {
        let tff = IdetCounts {
            tff: 45,
            bff: 0,
            progressive: 3,
            undetermined: 2,
        };
        assert_eq!(tff.verdict(), SampleVerdict::Interlaced);

        let bff = IdetCounts {
            bff: 60,
            ..IdetCounts::default()
        };
        assert_eq!(bff.verdict(), SampleVerdict::Interlaced);

        let progressive = IdetCounts {
            tff: 1,
            bff: 0,
            progressive: 90,
            undetermined: 9,
        };
        assert_eq!(progressive.verdict(), SampleVerdict::Progressive);

        // Nothing dominates two to one
        let murky = IdetCounts {
            tff: 30,
            bff: 0,
            progressive: 40,
            undetermined: 30,
        };
        assert_eq!(murky.verdict(), SampleVerdict::Undetermined);
    }

    #[test]
    fn tally_needs_an_outright_majority() {
        let mut tally = InterlaceTally::default();
        for _ in 0..6 {
            tally.add_verdict(SampleVerdict::Interlaced);
        }
        for _ in 0..4 {
            tally.add_verdict(SampleVerdict::Progressive);
        }
        assert!(tally.finish().unwrap());

        let mut tally = InterlaceTally::default();
        for _ in 0..7 {
            tally.add_verdict(SampleVerdict::Progressive);
        }
        for _ in 0..3 {
            tally.add_verdict(SampleVerdict::Undetermined);
        }
        assert!(!tally.finish().unwrap());

        // A split decision is an error, not a guess
        let mut tally = InterlaceTally::default();
        for _ in 0..5 {
            tally.add_verdict(SampleVerdict::Interlaced);
            tally.add_verdict(SampleVerdict::Progressive);
        }
        assert!(tally.finish().is_err());
    }

    #[test]
    fn sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        std::fs::write(&input, b"").unwrap();

        assert_eq!(read_sidecar(&input).unwrap(), None);

        let crop = Crop {
            top: 140,
            bottom: 140,
            left: 0,
            right: 0,
        };
        assert!(write_sidecar(&input, crop).unwrap());
        assert_eq!(read_sidecar(&input).unwrap(), Some(crop));

        // Existing sidecar is left alone
        assert!(!write_sidecar(&input, Crop::NONE).unwrap());
        assert_eq!(read_sidecar(&input).unwrap(), Some(crop));
    }

    #[test]
    fn sidecar_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        std::fs::write(dir.path().join(CROP_SIDECAR), "not a crop\n").unwrap();
        assert!(read_sidecar(&input).is_err());
    }
}
