//! Single-download orchestration.
//!
//! Spawns yt-dlp for one URL, streams its stdout into [`DownloadEvent`]s on a
//! channel, and reports the outcome both as a terminal event and as the return
//! value. The spawned child is published into a shared slot so a cancel action
//! on another thread can signal it; the kill is advisory and the reader loops
//! simply drain whatever output remains.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::options::DownloadRequest;
use crate::progress::{parse_destination_line, parse_progress_line, ProgressSnapshot};

/// How many trailing stderr lines are kept for the failure report.
const STDERR_TAIL: usize = 20;

/// Handle to the in-flight yt-dlp process, shared between the worker that
/// spawned it and the UI thread that may cancel it. Always lock to touch it.
pub type SharedChild = Arc<Mutex<Option<Child>>>;

pub fn new_child_slot() -> SharedChild {
    Arc::new(Mutex::new(None))
}

/// Push-based updates emitted while a download runs.
///
/// The terminal `Finished`/`Failed` event mirrors the function's return value
/// so channel-only consumers (the GUI) see the outcome too.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Raw tool output line, for the log pane.
    Log(String),
    Progress(ProgressSnapshot),
    /// The file yt-dlp is writing; the last one seen is the final output.
    Destination(PathBuf),
    Finished {
        path: Option<PathBuf>,
        elapsed: Duration,
    },
    Failed(String),
}

/// Outcome of a completed download.
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// Final output path, when yt-dlp announced one.
    pub path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Runs one download to completion.
///
/// Creates the output directory if absent, spawns yt-dlp with the request's
/// argument vector, and streams output until the process exits. Any tool
/// failure is terminal for this download; retries happen inside yt-dlp with
/// the counts the request passes through. Exactly one terminal event is sent
/// before returning.
pub async fn download(
    bin: &Path,
    req: &DownloadRequest,
    events: &UnboundedSender<DownloadEvent>,
    slot: &SharedChild,
) -> Result<Downloaded> {
    let result = run(bin, req, events, slot).await;
    match &result {
        Ok(done) => {
            info!(elapsed_secs = done.elapsed.as_secs_f64(), "download finished");
            let _ = events.send(DownloadEvent::Finished {
                path: done.path.clone(),
                elapsed: done.elapsed,
            });
        }
        Err(err) => {
            warn!(url = %req.url, %err, "download failed");
            let _ = events.send(DownloadEvent::Failed(err.to_string()));
        }
    }
    result
}

async fn run(
    bin: &Path,
    req: &DownloadRequest,
    events: &UnboundedSender<DownloadEvent>,
    slot: &SharedChild,
) -> Result<Downloaded> {
    std::fs::create_dir_all(&req.output_dir)?;

    info!(url = %req.url, tier = req.tier.label(), threads = req.threads, "starting download");
    let _ = events.send(DownloadEvent::Log(format!("Starting download: {}", req.url)));
    let _ = events.send(DownloadEvent::Log(format!(
        "Output directory: {}",
        req.output_dir.display()
    )));

    let started = Instant::now();
    let mut child = Command::new(bin)
        .args(req.to_args())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    *slot.lock().unwrap() = Some(child);

    let out_events = events.clone();
    let stdout_reader = async move {
        let mut last_path = None;
        if let Some(out) = stdout {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(snap) = parse_progress_line(&line) {
                    let _ = out_events.send(DownloadEvent::Progress(snap));
                } else if let Some(path) = parse_destination_line(&line) {
                    last_path = Some(path.clone());
                    let _ = out_events.send(DownloadEvent::Destination(path));
                    let _ = out_events.send(DownloadEvent::Log(line));
                } else if !line.trim().is_empty() {
                    let _ = out_events.send(DownloadEvent::Log(line));
                }
            }
        }
        last_path
    };

    let err_events = events.clone();
    let stderr_reader = async move {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
        if let Some(err) = stderr {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
                let _ = err_events.send(DownloadEvent::Log(line));
            }
        }
        tail
    };

    let (last_path, stderr_tail) = tokio::join!(stdout_reader, stderr_reader);

    let reaped = slot.lock().unwrap().take();
    let status = match reaped {
        Some(mut child) => child.wait().await?,
        None => {
            return Err(Error::DownloadFailed {
                code: None,
                stderr: "download process handle was lost".to_string(),
            });
        }
    };
    let elapsed = started.elapsed();

    if status.success() {
        Ok(Downloaded {
            path: last_path,
            elapsed,
        })
    } else {
        Err(Error::DownloadFailed {
            code: status.code(),
            stderr: stderr_tail.into_iter().collect::<Vec<_>>().join("\n"),
        })
    }
}

/// Lists the formats available for a URL without downloading.
///
/// The listing is printed straight to the caller's stdout, matching yt-dlp's
/// own table output.
pub async fn list_formats(bin: &Path, url: &str) -> Result<()> {
    let output = Command::new(bin)
        .args(["--list-formats", "--no-playlist", url])
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::ListFormatsFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr)
                .lines()
                .last()
                .unwrap_or("unknown error")
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DownloadRequest;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn missing_tool_surfaces_as_error_and_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let req = DownloadRequest::new("https://youtu.be/abc123", dir.path().join("out"));
        let (tx, mut rx) = unbounded_channel();
        let slot = new_child_slot();

        let result = download(Path::new("/nonexistent/yt-dlp"), &req, &tx, &slot).await;
        assert!(result.is_err());
        // Output directory is still created before the spawn attempt.
        assert!(dir.path().join("out").is_dir());
        assert!(slot.lock().unwrap().is_none());

        // The startup log lines arrive first, then exactly one Failed event.
        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                DownloadEvent::Failed(_) => {
                    assert!(!saw_failed, "terminal event sent more than once");
                    saw_failed = true;
                }
                DownloadEvent::Log(_) => assert!(!saw_failed),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_failed);
    }
}
