//! Encoder progress line parsing
//!
//! ffmpeg reports progress on its diagnostic stream as one fielded line per
//! update, e.g.
//!
//! ```text
//! frame=  120 fps=23.9 q=27.0 size=    512kB time=00:00:05.00 bitrate= 838.0kbits/s speed=0.98x
//! ```
//!
//! Anything that does not match that layout exactly is not a progress line.

use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::time::TimeParser;

fn progress_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^frame=\s*(\S+)\s+fps=\s*(\S+)\s+q=\s*(\S+)\s+size=\s*(\S+)",
            r"\s+time=\s*(\S+)\s+bitrate=\s*(\S+)\s+speed=\s*(\S+)\s*$",
        ))
        .expect("valid progress regex")
    })
}

/// One decoded progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Frames encoded so far
    #[serde(rename = "f")]
    pub frame: u64,
    /// Current encoding rate
    pub fps: f64,
    /// Current quantizer
    #[serde(rename = "q")]
    pub quantizer: f64,
    /// Output size, unit suffix included
    #[serde(rename = "sz")]
    pub size: String,
    /// Output timestamp reached, in seconds
    #[serde(rename = "t")]
    pub elapsed_time: f64,
    /// Bitrate, unit suffix included
    #[serde(rename = "br")]
    pub bitrate: String,
    /// Speed relative to realtime, e.g. `0.98x`
    #[serde(rename = "spd")]
    pub speed: String,
}

/// Decode one assembled line.
///
/// Returns `None` for anything that is not a well-formed progress line,
/// including lines whose numeric fields do not decode (`N/A`).
pub fn parse_progress(line: &[u8]) -> Option<ProgressSnapshot> {
    let caps = progress_re().captures(line)?;
    let field = |i: usize| caps.get(i).map(|m| m.as_bytes());

    Some(ProgressSnapshot {
        frame: number(field(1)?)?,
        fps: number(field(2)?)?,
        quantizer: number(field(3)?)?,
        size: text(field(4)?)?,
        elapsed_time: TimeParser::parse(field(5)?)?,
        bitrate: text(field(6)?)?,
        speed: text(field(7)?)?,
    })
}

fn number<T: std::str::FromStr>(token: &[u8]) -> Option<T> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn text(token: &[u8]) -> Option<String> {
    std::str::from_utf8(token).ok().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] =
        b"frame=   10 fps=25.0 q=28.0 size=     100kB time=00:00:00.40 bitrate= 500.0kbits/s speed=1.0x";

    #[test]
    fn test_parse_sample_line() {
        let snapshot = parse_progress(SAMPLE).unwrap();
        assert_eq!(
            snapshot,
            ProgressSnapshot {
                frame: 10,
                fps: 25.0,
                quantizer: 28.0,
                size: "100kB".to_string(),
                elapsed_time: 0.40,
                bitrate: "500.0kbits/s".to_string(),
                speed: "1.0x".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_documented_example() {
        let line = b"frame=  120 fps=23.9 q=27.0 size=    512kB time=00:00:05.00 bitrate= 838.0kbits/s speed=0.98x";
        let snapshot = parse_progress(line).unwrap();
        assert_eq!(snapshot.frame, 120);
        assert!((snapshot.elapsed_time - 5.0).abs() < 1e-9);
        assert_eq!(snapshot.speed, "0.98x");
    }

    #[test]
    fn test_parse_plain_seconds_time() {
        let line = b"frame=1 fps=0.0 q=0.0 size=0kB time=12.50 bitrate=0.0kbits/s speed=0x";
        let snapshot = parse_progress(line).unwrap();
        assert!((snapshot.elapsed_time - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_trailing_whitespace_allowed() {
        let mut line = SAMPLE.to_vec();
        line.extend_from_slice(b"   ");
        assert!(parse_progress(&line).is_some());
    }

    #[test]
    fn test_parse_rejects_non_progress() {
        assert_eq!(parse_progress(b""), None);
        assert_eq!(parse_progress(b"Input #0, matroska,webm, from 'in.mkv':"), None);
        assert_eq!(
            parse_progress(b"[libx264 @ 0x55d] using cpu capabilities: MMX2 SSE2Fast"),
            None
        );
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let line = b"frame=   10 fps=25.0 size=     100kB time=00:00:00.40 bitrate= 500.0kbits/s speed=1.0x";
        assert_eq!(parse_progress(line), None);
    }

    #[test]
    fn test_parse_rejects_reordered_fields() {
        let line = b"fps=25.0 frame=   10 q=28.0 size=     100kB time=00:00:00.40 bitrate= 500.0kbits/s speed=1.0x";
        assert_eq!(parse_progress(line), None);
    }

    #[test]
    fn test_parse_rejects_trailing_content() {
        let mut line = SAMPLE.to_vec();
        line.extend_from_slice(b" elapsed=0:00:01.00");
        assert_eq!(parse_progress(&line), None);
    }

    #[test]
    fn test_parse_rejects_undecodable_values() {
        let line = b"frame=   10 fps=25.0 q=28.0 size=N/A time=N/A bitrate=N/A speed=N/A";
        assert_eq!(parse_progress(line), None);
        let line = b"frame=  abc fps=25.0 q=28.0 size=1kB time=00:00:00.40 bitrate=1kbits/s speed=1x";
        assert_eq!(parse_progress(line), None);
    }

    #[test]
    fn test_parse_every_field_dropped() {
        let fields = [
            "frame=10", "fps=25.0", "q=28.0", "size=100kB",
            "time=00:00:00.40", "bitrate=500.0kbits/s", "speed=1.0x",
        ];
        for skip in 0..fields.len() {
            let line: Vec<&str> = fields
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, f)| *f)
                .collect();
            assert_eq!(parse_progress(line.join(" ").as_bytes()), None, "without {}", fields[skip]);
        }
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse_progress(SAMPLE), parse_progress(SAMPLE));
    }

    #[test]
    fn test_fine_grained_time_round_trips() {
        for time in ["12.345", "00:00:01.234567", "01:59:59.999", "0.001"] {
            let line = format!(
                "frame=1 fps=1.0 q=1.0 size=1kB time={} bitrate=1kbits/s speed=1x",
                time
            );
            let decoded = parse_progress(line.as_bytes()).unwrap().elapsed_time;
            let encoded = TimeParser::format(decoded);
            let reparsed = TimeParser::parse(encoded.as_bytes()).unwrap();
            assert!((reparsed - decoded).abs() < 1e-6, "{} -> {}", time, encoded);
        }
    }

    #[test]
    fn test_time_round_trips_through_format() {
        for centis in [0u64, 40, 500, 5_999, 6_000, 359_999, 360_000, 1_234_567] {
            let seconds = centis as f64 / 100.0;
            let line = format!(
                "frame=1 fps=1.0 q=1.0 size=1kB time={} bitrate=1kbits/s speed=1x",
                TimeParser::format(seconds)
            );
            let decoded = parse_progress(line.as_bytes()).unwrap().elapsed_time;
            let reparsed = TimeParser::parse(TimeParser::format(decoded).as_bytes()).unwrap();
            assert!((reparsed - decoded).abs() < 1e-6, "{}", line);
            assert!((decoded - seconds).abs() < 1e-6, "{}", line);
        }
    }

    #[test]
    fn test_snapshot_wire_keys() {
        let json = serde_json::to_value(parse_progress(SAMPLE).unwrap()).unwrap();
        assert_eq!(json["f"], 10);
        assert_eq!(json["sz"], "100kB");
        assert_eq!(json["br"], "500.0kbits/s");
        assert_eq!(json["spd"], "1.0x");
    }
}
