//! Quality tiers and yt-dlp argument construction.
//!
//! The mapping from a tier to a format-selection expression is pure and
//! stateless; everything else here is the fixed speed/retry tuning every
//! download runs with.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;
use crate::progress::PROGRESS_TEMPLATE;

// Retry counts handed through to yt-dlp (whole item / single fragment).
const RETRIES: &str = "10";
const FRAGMENT_RETRIES: &str = "10";
// Download buffer and byte-range chunk sizes.
const BUFFER_SIZE: &str = "16M";
const HTTP_CHUNK_SIZE: &str = "10M";
// Fixed audio post-processing target for audio-only downloads.
const AUDIO_FORMAT: &str = "mp3";
const AUDIO_QUALITY: &str = "192K";

/// Requested quality bucket for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Best,
    P1080,
    P1440,
    P2160,
    AudioOnly,
}

impl QualityTier {
    /// Every tier, in the order the GUI lists them.
    pub const ALL: [QualityTier; 5] = [
        QualityTier::Best,
        QualityTier::P1080,
        QualityTier::P1440,
        QualityTier::P2160,
        QualityTier::AudioOnly,
    ];

    /// The yt-dlp format-selection expression for this tier.
    pub fn format_expr(&self) -> &'static str {
        match self {
            QualityTier::Best => "bestvideo+bestaudio/best",
            QualityTier::P1080 => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
            QualityTier::P1440 => "bestvideo[height<=1440]+bestaudio/best[height<=1440]",
            QualityTier::P2160 => "bestvideo[height<=2160]+bestaudio/best[height<=2160]",
            QualityTier::AudioOnly => "bestaudio/best",
        }
    }

    /// Format selection plus container/post-processing arguments.
    ///
    /// Video tiers merge into mp4; audio-only adds the extract-and-transcode
    /// post-processing step instead of a merge container.
    pub fn format_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.format_expr().to_string()];
        match self {
            QualityTier::AudioOnly => {
                args.push("--extract-audio".to_string());
                args.push("--audio-format".to_string());
                args.push(AUDIO_FORMAT.to_string());
                args.push("--audio-quality".to_string());
                args.push(AUDIO_QUALITY.to_string());
            }
            _ => {
                args.push("--merge-output-format".to_string());
                args.push("mp4".to_string());
            }
        }
        args
    }

    /// Human label as shown in the GUI quality dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Best => "Best",
            QualityTier::P1080 => "1080p",
            QualityTier::P1440 => "1440p",
            QualityTier::P2160 => "2160p",
            QualityTier::AudioOnly => "Audio Only",
        }
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(QualityTier::Best),
            "1080p" => Ok(QualityTier::P1080),
            "1440p" => Ok(QualityTier::P1440),
            "2160p" => Ok(QualityTier::P2160),
            other => Err(Error::UnknownTier(other.to_string())),
        }
    }
}

/// One download invocation: URL plus everything yt-dlp needs to run it.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub tier: QualityTier,
    /// Fragment-level concurrency inside yt-dlp, opaque to this crate.
    pub threads: u32,
    /// Optional rate limit string, e.g. "50M".
    pub limit_rate: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            tier: QualityTier::Best,
            threads: 4,
            limit_rate: None,
        }
    }

    pub fn tier(mut self, tier: QualityTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn limit_rate(mut self, rate: Option<String>) -> Self {
        self.limit_rate = rate;
        self
    }

    /// Full yt-dlp argument vector: format selection, the fixed speed/retry
    /// tuning, the title-based output template, and the machine-readable
    /// progress stream.
    pub fn to_args(&self) -> Vec<String> {
        let template = self.output_dir.join("%(title)s.%(ext)s");
        let mut args = self.tier.format_args();
        args.extend(
            [
                "--no-playlist",
                "--concurrent-fragments",
            ]
            .map(str::to_string),
        );
        args.push(self.threads.to_string());
        args.extend(
            [
                "--retries",
                RETRIES,
                "--fragment-retries",
                FRAGMENT_RETRIES,
                "--skip-unavailable-fragments",
                "--buffer-size",
                BUFFER_SIZE,
                "--http-chunk-size",
                HTTP_CHUNK_SIZE,
                "--newline",
                "--progress-template",
                PROGRESS_TEMPLATE,
            ]
            .map(str::to_string),
        );
        if let Some(rate) = &self.limit_rate {
            args.push("--limit-rate".to_string());
            args.push(rate.clone());
        }
        args.push("-o".to_string());
        args.push(template.display().to_string());
        args.push(self.url.clone());
        args
    }
}
