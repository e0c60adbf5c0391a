use std::path::Path;
use log::{debug, warn};
use crate::engine::Engine;

/// Parse an `HH:MM:SS.ff` timestamp into seconds
///
/// Hours and minutes must be integers; seconds may carry a fraction.
/// Anything with other than three colon-separated fields is rejected.
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    // f64 so absurd hour counts cannot overflow
    let total = hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds;
    total.is_finite().then_some(total)
}

/// Find the `Duration: HH:MM:SS.ff,` field in ffmpeg's header dump
///
/// The first line carrying a parseable field wins, so a source path that
/// happens to contain `Duration` does not hide it. Returns `None` for
/// `Duration: N/A` and for output without the field.
pub fn parse_duration_field(diagnostics: &str) -> Option<f64> {
    diagnostics.lines().find_map(|line| {
        let (_, rest) = line.split_once("Duration: ")?;
        parse_timestamp(rest.split(',').next()?)
    })
}

impl Engine {
    /// Total duration of `path` in seconds, or 0.0 if it cannot be determined
    ///
    /// 0.0 means "unknown": progress percentages and remaining-time estimates
    /// are suppressed for that file instead of dividing by zero.
    pub async fn get_duration(&self, path: &Path) -> f64 {
        let output = match self.inspect_command(path).output().await {
            Ok(o) => o,
            Err(e) => {
                warn!("Duration unknown for {}: failed to run ffmpeg: {}", path.display(), e);
                return 0.0;
            }
        };

        // ffmpeg writes the header to stderr; check stdout too in case of a wrapper
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);

        match parse_duration_field(&stderr).or_else(|| parse_duration_field(&stdout)) {
            Some(secs) => {
                debug!("Duration of {}: {:.2}s", path.display(), secs);
                secs
            }
            None => {
                warn!("Duration unknown for {}: no Duration field in ffmpeg output", path.display());
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str = "Input #0, mpeg, from 'VTS_01_1.VOB':\n  Duration: 00:12:03.50, start: 0.280633, bitrate: 5721 kb/s\n    Stream #0:0[0x1e0]: Video: mpeg2video (Main), yuv420p(tv, top first), 720x576 [SAR 16:15 DAR 4:3], 25 fps\n";

    #[test]
    fn test_duration_from_header() {
        assert_eq!(parse_duration_field(HEADER), Some(723.5));
    }

    #[test]
    fn test_duration_not_available() {
        let text = "Input #0, mpeg, from 'broken.VOB':\n  Duration: N/A, start: 0.000000, bitrate: N/A\n";
        assert_eq!(parse_duration_field(text), None);
    }

    #[test]
    fn test_no_duration_field() {
        assert_eq!(parse_duration_field("broken.VOB: Invalid data found when processing input\n"), None);
        assert_eq!(parse_duration_field(""), None);
    }

    #[test]
    fn test_duration_in_source_path_does_not_hide_field() {
        let text = "Input #0, mpeg, from '/media/Duration: old/VTS_01_1.VOB':\n  Duration: 00:12:03.50, start: 0.280633, bitrate: 5721 kb/s\n";
        assert_eq!(parse_duration_field(text), Some(723.5));

        let text = "Input #0, mpeg, from '/media/Duration/VTS_01_1.VOB':\n  Duration: 00:12:03.50, start: 0.280633, bitrate: 5721 kb/s\n";
        assert_eq!(parse_duration_field(text), Some(723.5));
    }

    #[test]
    fn test_huge_hour_count_does_not_overflow() {
        let secs = parse_timestamp("9999999999999999:00:00").unwrap();
        assert_eq!(secs, 9999999999999999.0 * 3600.0);
        assert_eq!(parse_timestamp("18446744073709551615:59:59.99").map(f64::is_finite), Some(true));
    }

    #[test]
    fn test_timestamp_rejects_wrong_segment_count() {
        assert_eq!(parse_timestamp("12:03.50"), None);
        assert_eq!(parse_timestamp("1:00:12:03"), None);
        assert_eq!(parse_timestamp("00:00:00"), Some(0.0));
    }

    proptest! {
        /// Parsed seconds equal 3600h + 60m + s for any well-formed HH:MM:SS.ff
        #[test]
        fn test_duration_field_sums_components(
            h in 0u64..100,
            m in 0u64..60,
            s in 0u64..60,
            ff in 0u64..100,
        ) {
            let text = format!("  Duration: {:02}:{:02}:{:02}.{:02}, start: 0.000000, bitrate: 1 kb/s\n", h, m, s, ff);
            let expected = (3600 * h + 60 * m) as f64 + format!("{}.{:02}", s, ff).parse::<f64>().unwrap();

            let parsed = parse_duration_field(&text);
            prop_assert_eq!(parsed, Some(expected));
        }
    }
}
