//! Non-downloading metadata probe and the display heuristics built on it.
//!
//! The probe runs yt-dlp with `--dump-single-json` and reads the format table
//! out of the result. Everything derived from it (quality label, size
//! estimate) is cosmetic: the label is a coarse bucket over the best reported
//! stream, and the size is a linear guess, not a byte-accurate figure.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Subset of the yt-dlp info JSON the GUI cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extractor: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    /// "none" means the stream carries no video track.
    #[serde(default)]
    pub vcodec: Option<String>,
    /// "none" means the stream carries no audio track.
    #[serde(default)]
    pub acodec: Option<String>,
}

/// Dynamic-range signal; the format-note wins over the codec sniff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicRange {
    Sdr,
    Hdr,
    DolbyVision,
}

impl DynamicRange {
    fn suffix(&self) -> &'static str {
        match self {
            DynamicRange::Sdr => "",
            DynamicRange::Hdr => " HDR",
            DynamicRange::DolbyVision => " Dolby Vision",
        }
    }
}

/// Aggregate over all reported formats of one video.
#[derive(Debug, Clone, Copy)]
pub struct FormatScan {
    pub has_video: bool,
    pub has_audio: bool,
    pub max_height: u32,
    pub max_fps: u32,
    pub range: DynamicRange,
}

/// Display strings for the GUI info panel.
#[derive(Debug, Clone)]
pub struct MediaSummary {
    pub title: String,
    pub platform: String,
    pub quality: String,
    pub size: String,
}

fn has_track(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if c != "none")
}

fn is_hdr_codec(vcodec: &str) -> bool {
    let lower = vcodec.to_lowercase();
    ["vp9.2", "hdr", "av01"].iter().any(|sig| lower.contains(sig))
}

/// Walks the format table collecting the best height/fps and HDR signals.
pub fn scan_formats(formats: &[FormatInfo]) -> FormatScan {
    let mut scan = FormatScan {
        has_video: false,
        has_audio: false,
        max_height: 0,
        max_fps: 0,
        range: DynamicRange::Sdr,
    };
    let mut codec_hdr = false;

    for f in formats {
        if has_track(&f.vcodec) {
            scan.has_video = true;
            if let Some(vcodec) = &f.vcodec {
                codec_hdr |= is_hdr_codec(vcodec);
            }
            let note = f.format_note.as_deref().unwrap_or("");
            if note.contains("Dolby Vision") {
                scan.range = DynamicRange::DolbyVision;
            } else if note.contains("HDR") && scan.range == DynamicRange::Sdr {
                scan.range = DynamicRange::Hdr;
            }
            scan.max_height = scan.max_height.max(f.height.unwrap_or(0));
            scan.max_fps = scan.max_fps.max(f.fps.unwrap_or(0.0).round() as u32);
        }
        if has_track(&f.acodec) {
            scan.has_audio = true;
        }
    }

    if scan.range == DynamicRange::Sdr && codec_hdr {
        scan.range = DynamicRange::Hdr;
    }
    scan
}

/// Coarse quality label, e.g. "4K HDR 60FPS" or "1080p 30FPS".
///
/// Buckets use the standard vertical resolutions (1440 → 2K, 2160 → 4K,
/// 4320 → 8K, 8640 → 16K); anything lower prints the raw height.
pub fn quality_label(scan: &FormatScan) -> String {
    let bucket = match scan.max_height {
        h if h >= 8640 => "16K".to_string(),
        h if h >= 4320 => "8K".to_string(),
        h if h >= 2160 => "4K".to_string(),
        h if h >= 1440 => "2K".to_string(),
        h => format!("{h}p"),
    };
    format!("{bucket}{} {}FPS", scan.range.suffix(), scan.max_fps)
}

/// Rough size estimate in MB; a linear formula, explicitly not byte-accurate.
pub fn estimated_size_mb(scan: &FormatScan) -> f64 {
    let base = scan.max_height as f64 * 0.5; // 30fps SDR baseline
    let fps_mult = if scan.max_fps > 30 {
        scan.max_fps as f64 / 30.0
    } else {
        1.0
    };
    let hdr_mult = if scan.range == DynamicRange::Sdr { 1.0 } else { 1.5 };
    let audio = if scan.has_audio { 10.0 } else { 0.0 };
    base * fps_mult * hdr_mult + audio
}

// Title-cases extractor ids for display ("youtube" -> "Youtube").
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(c);
            boundary = true;
        }
    }
    out
}

/// Derives the info-panel strings from a probe result.
pub fn summarize(info: &VideoInfo) -> MediaSummary {
    let scan = scan_formats(&info.formats);

    let quality = if scan.has_video {
        let label = quality_label(&scan);
        if scan.has_audio {
            format!("Video+Audio ({label})")
        } else {
            format!("Video Only ({label})")
        }
    } else if scan.has_audio {
        "Audio Only".to_string()
    } else {
        "Unknown Format".to_string()
    };

    let size = if scan.has_video {
        let est = estimated_size_mb(&scan);
        if scan.has_audio {
            format!("~{est:.1} MB (Video+Audio)")
        } else {
            format!("~{est:.1} MB (Video Only)")
        }
    } else if scan.has_audio {
        "~10-20 MB (Audio Only)".to_string()
    } else {
        "Size unknown".to_string()
    };

    MediaSummary {
        title: info.title.clone().unwrap_or_else(|| "Unknown Title".to_string()),
        platform: title_case(info.extractor.as_deref().unwrap_or("Unknown Platform")),
        quality,
        size,
    }
}

/// Fetches the info JSON for a URL without downloading anything.
pub async fn probe(bin: &Path, url: &str) -> Result<VideoInfo> {
    debug!(%url, "probing video metadata");
    let output = Command::new(bin)
        .args(["--dump-single-json", "--no-playlist", "--no-warnings", url])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::ProbeFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::ProbeFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr)
                .lines()
                .last()
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_format(height: u32, fps: f64, vcodec: &str, note: &str) -> FormatInfo {
        FormatInfo {
            format_note: Some(note.to_string()),
            height: Some(height),
            fps: Some(fps),
            vcodec: Some(vcodec.to_string()),
            acodec: Some("none".to_string()),
        }
    }

    fn audio_format() -> FormatInfo {
        FormatInfo {
            vcodec: Some("none".to_string()),
            acodec: Some("opus".to_string()),
            ..FormatInfo::default()
        }
    }

    #[test]
    fn hdr_codec_at_2160p_class_height_labels_as_4k_hdr() {
        let scan = scan_formats(&[video_format(3840, 60.0, "vp9.2", ""), audio_format()]);
        assert_eq!(quality_label(&scan), "4K HDR 60FPS");
    }

    #[test]
    fn plain_1080p_labels_without_hdr() {
        let scan = scan_formats(&[video_format(1080, 30.0, "avc1.640028", ""), audio_format()]);
        assert_eq!(quality_label(&scan), "1080p 30FPS");
    }

    #[test]
    fn format_note_dolby_vision_wins_over_codec_signal() {
        let scan = scan_formats(&[video_format(2160, 24.0, "vp9.2", "Dolby Vision")]);
        assert_eq!(quality_label(&scan), "4K Dolby Vision 24FPS");
    }

    #[test]
    fn resolution_buckets() {
        for (height, bucket) in [(8640, "16K"), (4320, "8K"), (2160, "4K"), (1440, "2K"), (720, "720p")] {
            let scan = scan_formats(&[video_format(height, 30.0, "avc1", "")]);
            assert!(
                quality_label(&scan).starts_with(bucket),
                "height {height} should label as {bucket}"
            );
        }
    }

    #[test]
    fn size_estimate_formula() {
        // 2160 * 0.5 * (60/30) * 1.5 + 10 audio = 3250
        let scan = scan_formats(&[video_format(2160, 60.0, "vp9.2", "HDR"), audio_format()]);
        assert!((estimated_size_mb(&scan) - 3250.0).abs() < 1e-9);

        // 1080 * 0.5 + 10 audio = 550
        let scan = scan_formats(&[video_format(1080, 30.0, "avc1", ""), audio_format()]);
        assert!((estimated_size_mb(&scan) - 550.0).abs() < 1e-9);
    }

    #[test]
    fn summarize_reads_probe_json() {
        let json = r#"{
            "title": "Test Clip",
            "extractor": "youtube",
            "formats": [
                {"format_note": "1080p", "height": 1080, "fps": 30, "vcodec": "avc1.64", "acodec": "none"},
                {"vcodec": "none", "acodec": "mp4a.40.2"}
            ]
        }"#;
        let info: VideoInfo = serde_json::from_str(json).unwrap();
        let summary = summarize(&info);
        assert_eq!(summary.title, "Test Clip");
        assert_eq!(summary.platform, "Youtube");
        assert_eq!(summary.quality, "Video+Audio (1080p 30FPS)");
        assert_eq!(summary.size, "~550.0 MB (Video+Audio)");
    }

    #[test]
    fn summarize_degrades_on_sparse_json() {
        let info: VideoInfo = serde_json::from_str("{}").unwrap();
        let summary = summarize(&info);
        assert_eq!(summary.title, "Unknown Title");
        assert_eq!(summary.quality, "Unknown Format");
        assert_eq!(summary.size, "Size unknown");
    }

    #[test]
    fn audio_only_media_uses_fixed_size_hint() {
        let info = VideoInfo {
            title: Some("Track".to_string()),
            extractor: Some("soundcloud".to_string()),
            formats: vec![audio_format()],
        };
        let summary = summarize(&info);
        assert_eq!(summary.quality, "Audio Only");
        assert_eq!(summary.size, "~10-20 MB (Audio Only)");
        assert_eq!(summary.platform, "Soundcloud");
    }
}
