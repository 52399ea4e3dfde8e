//! Input metadata from `ffprobe -show_streams`

use std::path::Path;
use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{InterpError, InterpResult};
use crate::follow::line::split_lines;
use crate::probe::tools::run_tool;
use crate::utils::time::TimeParser;

struct ProbePatterns {
    duration: Regex,
    frame_rate: Regex,
    frames: Regex,
}

fn patterns() -> &'static ProbePatterns {
    static PATTERNS: OnceLock<ProbePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ProbePatterns {
        duration: Regex::new(r"^(?:TAG:DURATION|duration)=(\S+)$").expect("valid duration regex"),
        frame_rate: Regex::new(r"^r_frame_rate=(\d+)/(\d+)$").expect("valid frame rate regex"),
        frames: Regex::new(r"^(?:TAG:NUMBER_OF_FRAMES|nb_frames)=(\d+)$")
            .expect("valid frame count regex"),
    })
}

/// Number of frames in the input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrameCount {
    /// Reported by the container
    Counted(u64),
    /// Derived from duration and frame rate
    Estimated(f64),
}

/// Facts about the first video stream of the input
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInfo {
    /// Frame count
    #[serde(rename = "nf")]
    pub frames: Option<FrameCount>,
    /// Frame rate as `[numerator, denominator]`
    #[serde(rename = "r")]
    pub frame_rate: Option<[u64; 2]>,
    /// Duration in seconds
    #[serde(rename = "d")]
    pub duration: Option<f64>,
}

impl MediaInfo {
    /// Expected output frames when re-timed to `fps`, rounded half up
    pub fn target_frames(&self, fps: f64) -> Option<u64> {
        self.duration.map(|d| (d * fps + 0.5) as u64)
    }
}

/// Parse `ffprobe -show_streams` output.
///
/// Later lines win over earlier ones, so container tags override stream
/// fields printed as `N/A`. A missing frame count is derived from duration
/// and frame rate.
pub fn parse_ffprobe(output: &[u8]) -> MediaInfo {
    let patterns = patterns();
    let mut info = MediaInfo::default();

    for line in split_lines(output) {
        if let Some(caps) = patterns.frames.captures(&line) {
            if let Some(count) = number::<u64>(&caps[1]) {
                info.frames = Some(FrameCount::Counted(count));
            }
        } else if let Some(caps) = patterns.frame_rate.captures(&line) {
            if let (Some(num), Some(den)) = (number::<u64>(&caps[1]), number::<u64>(&caps[2])) {
                info.frame_rate = Some([num, den]);
            }
        } else if let Some(caps) = patterns.duration.captures(&line) {
            if let Some(duration) = TimeParser::parse(&caps[1]) {
                info.duration = Some(duration);
            }
        }
    }

    if info.frames.is_none() {
        if let (Some(duration), Some([num, den])) = (info.duration, info.frame_rate) {
            if den != 0 {
                info.frames = Some(FrameCount::Estimated(duration * num as f64 / den as f64));
            }
        }
    }

    info
}

/// Probe an input file.
///
/// Any failure, including an input without a readable duration, is a
/// probe error.
pub fn probe_media(ffprobe: &Path, input: &Path) -> InterpResult<MediaInfo> {
    info!("Probing input file: {}", input.display());

    let input_arg = input.to_string_lossy();
    let output = run_tool(
        ffprobe,
        &["-v", "error", "-select_streams", "v:0", "-show_streams", &input_arg],
    )
    .map_err(|e| InterpError::ProbeError {
        message: e.to_string(),
    })?;

    let info = parse_ffprobe(&output);
    if info.duration.is_none() {
        return Err(InterpError::ProbeError {
            message: format!("no duration reported for {}", input.display()),
        });
    }

    debug!(?info, "probe finished");
    Ok(info)
}

fn number<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
