//! Timestamp parsing and formatting utilities

use std::sync::OnceLock;

use regex::bytes::Regex;

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+\.\d+)|(\d+):(\d\d):(\d\d)(\.\d+))$").expect("valid timestamp regex")
    })
}

/// Time parser for the timestamp forms ffmpeg and ffprobe print
pub struct TimeParser;

impl TimeParser {
    /// Parse `SS.frac` or `HH:MM:SS.frac` into seconds.
    ///
    /// Both forms require a fractional part. Anything else (`N/A`, negative
    /// values, bare integers) yields `None`.
    pub fn parse(value: &[u8]) -> Option<f64> {
        let caps = timestamp_re().captures(value)?;

        if let Some(seconds) = caps.get(1) {
            return Self::number(seconds.as_bytes());
        }

        let hours = Self::number(caps.get(2)?.as_bytes())?;
        let minutes = Self::number(caps.get(3)?.as_bytes())?;
        let seconds = Self::number(caps.get(4)?.as_bytes())?;
        let fraction = Self::number(caps.get(5)?.as_bytes())?;

        Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction)
    }

    /// Format seconds as `HH:MM:SS.frac`.
    ///
    /// The fraction keeps up to nanosecond precision, with trailing zeros
    /// trimmed down to at least two digits, so `parse` reads back the
    /// same value.
    pub fn format(seconds: f64) -> String {
        let nanos = (seconds.max(0.0) * NANOS_PER_SEC as f64).round() as u64;
        let whole = nanos / NANOS_PER_SEC;
        let hours = whole / 3600;
        let minutes = (whole / 60) % 60;
        let secs = whole % 60;

        let digits = format!("{:09}", nanos % NANOS_PER_SEC);
        let trimmed = digits.trim_end_matches('0');
        let fraction = if trimmed.len() < 2 { &digits[..2] } else { trimmed };

        format!("{:02}:{:02}:{:02}.{}", hours, minutes, secs, fraction)
    }

    fn number(digits: &[u8]) -> Option<f64> {
        std::str::from_utf8(digits).ok()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(TimeParser::parse(b"90.5"), Some(90.5));
        assert_eq!(TimeParser::parse(b"0.40"), Some(0.4));
    }

    #[test]
    fn test_parse_hh_mm_ss() {
        let value = TimeParser::parse(b"01:02:03.456").unwrap();
        assert!((value - 3723.456).abs() < 1e-9);
        let value = TimeParser::parse(b"00:00:05.00").unwrap();
        assert!((value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(TimeParser::parse(b"N/A"), None);
        assert_eq!(TimeParser::parse(b"90"), None);
        assert_eq!(TimeParser::parse(b"-00:00:00.04"), None);
        assert_eq!(TimeParser::parse(b"1:2:3.4"), None);
        assert_eq!(TimeParser::parse(b"00:00:05.00x"), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(TimeParser::format(0.4), "00:00:00.40");
        assert_eq!(TimeParser::format(0.0), "00:00:00.00");
        assert_eq!(TimeParser::format(3723.456), "01:02:03.456");
        assert_eq!(TimeParser::format(59.999), "00:00:59.999");
        assert_eq!(TimeParser::format(1.234567), "00:00:01.234567");
        assert_eq!(TimeParser::format(3600.5), "01:00:00.50");
    }

    #[test]
    fn test_sub_centisecond_round_trip() {
        for seconds in [12.345, 1.234567, 0.001, 86399.999999, 4.000000001] {
            let encoded = TimeParser::format(seconds);
            let decoded = TimeParser::parse(encoded.as_bytes()).unwrap();
            assert!(
                (decoded - seconds).abs() < 1e-6,
                "{} -> {} -> {}",
                seconds,
                encoded,
                decoded
            );
        }
    }

    #[test]
    fn test_format_parse_round_trip() {
        for centis in (0u64..400_000).step_by(997) {
            let seconds = centis as f64 / 100.0;
            let encoded = TimeParser::format(seconds);
            let decoded = TimeParser::parse(encoded.as_bytes()).unwrap();
            assert!(
                (decoded - seconds).abs() < 1e-6,
                "{} -> {} -> {}",
                seconds,
                encoded,
                decoded
            );
        }
    }
}
