//! SuperFast video downloader built around the yt-dlp extractor.
//!
//! The crate is a thin orchestration layer: format resolution, fragment
//! downloading, retries and media post-processing all happen inside yt-dlp.
//! Three binaries share this library: the `tubefast` CLI, the `tubefast-gui`
//! window, and the `tubefast-bundle` macOS packager.

// Quality tiers and yt-dlp argument construction
pub mod options;
// Locating the yt-dlp executable (PATH or embedded fallback)
pub mod ytdlp;
// Progress template parsing utilities
pub mod progress;
// Single-download orchestration
pub mod downloader;
// Multi-URL sequential/concurrent batches
pub mod batch;
// Non-downloading metadata probe and display heuristics
pub mod probe;
// Domain allow-list heuristics
pub mod sites;
// GUI session state machine
pub mod session;
// Thumbnail fetching for the GUI
pub mod thumbnail;
// macOS application bundle builder
pub mod bundle;
// Error types
pub mod error;

pub use downloader::{download, DownloadEvent, Downloaded, SharedChild};
pub use error::{Error, Result};
pub use options::{DownloadRequest, QualityTier};
pub use progress::ProgressSnapshot;
pub use session::{SessionController, SessionState};
pub use sites::SitePolicy;
