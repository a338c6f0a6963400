//! Parsing of the yt-dlp progress stream.
//!
//! Downloads run with `--newline` and a fixed `--progress-template`, so every
//! progress tick arrives as one machine-readable line on stdout. Fields yt-dlp
//! does not know yet are printed as `NA` and parsed as absent here.

use std::path::PathBuf;

/// Template handed to yt-dlp; keep in sync with [`parse_progress_line`].
pub const PROGRESS_TEMPLATE: &str = "progress:%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";

/// One progress tick, discarded after display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Instantaneous speed in bytes per second.
    pub speed: Option<f64>,
    /// Estimated seconds remaining.
    pub eta: Option<u64>,
}

impl ProgressSnapshot {
    /// Completion ratio in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f32> {
        let total = self.total_bytes.filter(|t| *t > 0)?;
        Some((self.downloaded_bytes as f64 / total as f64).min(1.0) as f32)
    }

    /// Status text in the shape the GUI shows while downloading.
    pub fn status_line(&self) -> String {
        let speed_mb = self.speed.unwrap_or(0.0) / (1024.0 * 1024.0);
        match self.fraction() {
            Some(f) => format!(
                "Downloading: {:.1}% - {:.2} MB/s - ETA: {} seconds",
                f * 100.0,
                speed_mb,
                self.eta.unwrap_or(0)
            ),
            None => format!(
                "Downloading: {:.1} MB - {:.2} MB/s",
                self.downloaded_bytes as f64 / (1024.0 * 1024.0),
                speed_mb
            ),
        }
    }
}

fn field_u64(s: &str) -> Option<u64> {
    // Numeric fields may render as floats ("12.0"); round them down.
    let s = s.trim();
    if s.is_empty() || s == "NA" || s == "None" {
        return None;
    }
    s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as u64))
}

fn field_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "NA" || s == "None" {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Parses one `progress:` template line. Returns `None` for any other output.
pub fn parse_progress_line(line: &str) -> Option<ProgressSnapshot> {
    let rest = line.trim().strip_prefix("progress:")?;
    let mut fields = rest.split('|');
    let downloaded = field_u64(fields.next()?)?;
    let total = field_u64(fields.next()?);
    let estimate = field_u64(fields.next()?);
    let speed = field_f64(fields.next()?);
    let eta = field_u64(fields.next()?);
    Some(ProgressSnapshot {
        downloaded_bytes: downloaded,
        total_bytes: total.or(estimate),
        speed,
        eta,
    })
}

/// Extracts the output file path from yt-dlp's destination announcements.
///
/// Covers plain downloads, the mp4 merge step and the audio-extraction step;
/// the last one seen wins, which is the final file after post-processing.
pub fn parse_destination_line(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    for prefix in ["[download] Destination: ", "[ExtractAudio] Destination: "] {
        if let Some(path) = line.strip_prefix(prefix) {
            return Some(PathBuf::from(path.trim()));
        }
    }
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into ") {
        return Some(PathBuf::from(rest.trim_matches('"')));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_progress_line() {
        let snap = parse_progress_line("progress:1048576|10485760|NA|2097152.0|9").unwrap();
        assert_eq!(snap.downloaded_bytes, 1_048_576);
        assert_eq!(snap.total_bytes, Some(10_485_760));
        assert_eq!(snap.speed, Some(2_097_152.0));
        assert_eq!(snap.eta, Some(9));
        assert!((snap.fraction().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn falls_back_to_total_estimate() {
        let snap = parse_progress_line("progress:512|NA|2048|NA|NA").unwrap();
        assert_eq!(snap.total_bytes, Some(2048));
        assert_eq!(snap.speed, None);
        assert_eq!(snap.eta, None);
    }

    #[test]
    fn unknown_total_yields_no_fraction() {
        let snap = parse_progress_line("progress:512|NA|NA|NA|NA").unwrap();
        assert_eq!(snap.fraction(), None);
        assert!(snap.status_line().starts_with("Downloading: 0.0 MB"));
    }

    #[test]
    fn ignores_ordinary_output_lines() {
        assert_eq!(parse_progress_line("[download]  42.0% of 10MiB"), None);
        assert_eq!(parse_progress_line("progress:NA|NA|NA|NA|NA"), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[test]
    fn status_line_matches_display_shape() {
        let snap = ProgressSnapshot {
            downloaded_bytes: 5 * 1024 * 1024,
            total_bytes: Some(10 * 1024 * 1024),
            speed: Some(2.5 * 1024.0 * 1024.0),
            eta: Some(2),
        };
        assert_eq!(snap.status_line(), "Downloading: 50.0% - 2.50 MB/s - ETA: 2 seconds");
    }

    #[test]
    fn destination_lines() {
        assert_eq!(
            parse_destination_line("[download] Destination: downloads/clip.mp4"),
            Some(PathBuf::from("downloads/clip.mp4"))
        );
        assert_eq!(
            parse_destination_line("[Merger] Merging formats into \"downloads/clip.mp4\""),
            Some(PathBuf::from("downloads/clip.mp4"))
        );
        assert_eq!(
            parse_destination_line("[ExtractAudio] Destination: downloads/track.mp3"),
            Some(PathBuf::from("downloads/track.mp3"))
        );
        assert_eq!(parse_destination_line("[youtube] abc: Downloading webpage"), None);
    }
}
