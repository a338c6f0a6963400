//! Download session state machine for the windowed front-end.
//!
//! One controller per window, at most one active download per controller. The
//! background task never touches UI state directly: it reports through the
//! event channel, and the UI thread drains it via [`SessionController::pump`]
//! every frame, applying events in the order they were sent. Cancellation is
//! an advisory kill signal on the shared child handle; the controller resets
//! to idle without waiting for worker teardown, so late events from the dying
//! task are applied as log lines only.

use std::path::{Path, PathBuf};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::downloader::{download, new_child_slot, DownloadEvent, SharedChild};
use crate::error::{Error, Result};
use crate::options::DownloadRequest;
use crate::sites::SitePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Downloading,
    CancelRequested,
}

pub struct SessionController {
    state: SessionState,
    policy: SitePolicy,
    runtime: Handle,
    child: SharedChild,
    events_tx: UnboundedSender<DownloadEvent>,
    events_rx: UnboundedReceiver<DownloadEvent>,
    /// Completion ratio shown by the progress bar, `0.0..=1.0`.
    pub progress: f32,
    /// One-line status under the progress bar.
    pub status: String,
    /// Log pane contents, oldest first.
    pub log: Vec<String>,
    last_file: Option<PathBuf>,
}

impl SessionController {
    pub fn new(policy: SitePolicy, runtime: Handle) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            state: SessionState::Idle,
            policy,
            runtime,
            child: new_child_slot(),
            events_tx,
            events_rx,
            progress: 0.0,
            status: "Ready to download".to_string(),
            log: Vec::new(),
            last_file: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn policy(&self) -> SitePolicy {
        self.policy
    }

    /// The last file a download announced; target of the play button.
    pub fn last_file(&self) -> Option<&Path> {
        self.last_file.as_deref()
    }

    /// Starts a download if the session is idle and the URL passes the
    /// domain check. Clears the log and progress, then spawns the background
    /// task; all further updates arrive through [`pump`](Self::pump).
    pub fn start(&mut self, bin: PathBuf, req: DownloadRequest) -> Result<()> {
        if self.state != SessionState::Idle {
            return Ok(());
        }
        let url = req.url.trim();
        if url.is_empty() {
            return Err(Error::EmptyUrl);
        }
        if !self.policy.allows(url) {
            return Err(Error::UnsupportedUrl(url.to_string()));
        }

        self.log.clear();
        self.progress = 0.0;
        self.status = "Starting download...".to_string();
        self.state = SessionState::Downloading;

        let events = self.events_tx.clone();
        let slot = self.child.clone();
        self.runtime.spawn(async move {
            // Terminal outcome arrives as a Finished/Failed event.
            let _ = download(&bin, &req, &events, &slot).await;
        });
        Ok(())
    }

    /// Signals the in-flight download to stop and optimistically returns the
    /// session to idle. A no-op when nothing is downloading.
    pub fn cancel(&mut self) {
        if self.state != SessionState::Downloading {
            return;
        }
        self.state = SessionState::CancelRequested;
        if let Some(child) = self.child.lock().unwrap().as_mut() {
            let _ = child.start_kill();
        }
        info!("download cancelled by user");
        self.status = "Download cancelled".to_string();
        self.log.push("Download cancelled by user".to_string());
        // Best-effort signal only; the worker may still be tearing down.
        self.state = SessionState::Idle;
    }

    /// Drains pending events from the background task onto the UI state.
    /// Returns true when anything changed, so the caller can repaint.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
            changed = true;
        }
        changed
    }

    fn apply_event(&mut self, event: DownloadEvent) {
        match event {
            DownloadEvent::Log(line) => self.log.push(line),
            DownloadEvent::Progress(snapshot) => {
                if self.state != SessionState::Idle {
                    if let Some(fraction) = snapshot.fraction() {
                        self.progress = fraction;
                    }
                    self.status = snapshot.status_line();
                }
            }
            DownloadEvent::Destination(path) => {
                self.last_file = Some(path);
            }
            DownloadEvent::Finished { path, elapsed } => {
                let message = format!(
                    "Download completed successfully in {:.2} seconds!",
                    elapsed.as_secs_f64()
                );
                self.log.push(message.clone());
                if let Some(path) = path {
                    self.last_file = Some(path);
                }
                if self.state != SessionState::Idle {
                    self.state = SessionState::Idle;
                    self.progress = 1.0;
                    self.status = message;
                }
            }
            DownloadEvent::Failed(reason) => {
                self.log.push(format!("Error: {reason}"));
                if self.state != SessionState::Idle {
                    self.state = SessionState::Idle;
                    self.status = format!("Download failed: {reason}");
                }
            }
        }
    }

    /// Opens the last downloaded file with the platform's default handler.
    pub fn play_last(&self) {
        if let Some(path) = &self.last_file {
            if path.exists() {
                open_path(path);
            }
        }
    }
}

/// Hands a file or directory to the OS default opener, fire-and-forget.
pub fn open_path(path: &Path) {
    let path = path.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&path).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd")
            .args(["/C", "start", ""])
            .arg(&path)
            .spawn();
        #[cfg(all(unix, not(target_os = "macos")))]
        let _ = std::process::Command::new("xdg-open").arg(&path).spawn();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::QualityTier;
    use std::time::Duration;

    fn controller(policy: SitePolicy) -> SessionController {
        SessionController::new(policy, Handle::current())
    }

    fn request(url: &str, dir: &Path) -> DownloadRequest {
        DownloadRequest::new(url, dir).tier(QualityTier::Best)
    }

    async fn wait_until_idle(session: &mut SessionController) {
        for _ in 0..100 {
            session.pump();
            if session.is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("session never returned to idle");
    }

    #[tokio::test]
    async fn cancel_before_any_download_is_a_noop() {
        let mut session = controller(SitePolicy::AllSupported);
        session.cancel();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.log.is_empty());
    }

    #[tokio::test]
    async fn start_rejects_empty_and_unsupported_urls() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = controller(SitePolicy::YoutubeOnly);

        let err = session
            .start("yt-dlp".into(), request("   ", dir.path()))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyUrl));

        let err = session
            .start("yt-dlp".into(), request("https://vimeo.com/1", dir.path()))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedUrl(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn failed_spawn_returns_session_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = controller(SitePolicy::AllSupported);
        session
            .start(
                "/nonexistent/yt-dlp".into(),
                request("https://youtu.be/abc123", dir.path()),
            )
            .unwrap();
        assert_eq!(session.state(), SessionState::Downloading);

        wait_until_idle(&mut session).await;
        assert!(session.status.starts_with("Download failed"));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_during_download_returns_to_idle_without_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("yt-dlp");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut session = controller(SitePolicy::AllSupported);
        session
            .start(script, request("https://youtu.be/abc123", dir.path()))
            .unwrap();

        // Wait for the worker to publish the child handle.
        for _ in 0..100 {
            if session.child.lock().unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        session.cancel();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.log.iter().any(|l| l.contains("cancelled")));

        // Worker teardown events land while idle and must not flip state.
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.pump();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn finished_event_records_file_and_resets_state() {
        let mut session = controller(SitePolicy::AllSupported);
        session.state = SessionState::Downloading;
        session.apply_event(DownloadEvent::Destination(PathBuf::from("out/a.mp4")));
        session.apply_event(DownloadEvent::Finished {
            path: Some(PathBuf::from("out/clip.mp4")),
            elapsed: Duration::from_secs(3),
        });
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.last_file(), Some(Path::new("out/clip.mp4")));
        assert_eq!(session.progress, 1.0);
        assert!(session.status.contains("completed successfully"));
    }

    #[tokio::test]
    async fn start_while_downloading_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = controller(SitePolicy::AllSupported);
        session.state = SessionState::Downloading;
        session
            .start("yt-dlp".into(), request("https://youtu.be/x", dir.path()))
            .unwrap();
        assert_eq!(session.state(), SessionState::Downloading);
    }
}
