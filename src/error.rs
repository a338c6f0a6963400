use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("yt-dlp executable not found; install it on PATH or bundle one under assets/")]
    ToolMissing,

    #[error("unsupported video URL: {0}")]
    UnsupportedUrl(String),

    #[error("no video URL given")]
    EmptyUrl,

    #[error("unknown quality tier: {0} (expected best, 1080p, 1440p or 2160p)")]
    UnknownTier(String),

    #[error("yt-dlp exited with {code:?}: {stderr}")]
    DownloadFailed { code: Option<i32>, stderr: String },

    #[error("could not list formats for {url}: {reason}")]
    ListFormatsFailed { url: String, reason: String },

    #[error("metadata probe failed for {url}: {reason}")]
    ProbeFailed { url: String, reason: String },

    #[error("icon tool failed: {tool} (code={code:?}) {stderr}")]
    IconToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("icon source image is missing: {0}")]
    IconSourceMissing(PathBuf),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
