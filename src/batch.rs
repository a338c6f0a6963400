//! Multi-URL download batches.
//!
//! Batches are best-effort: every URL is attempted, failures are collected and
//! reported at the end, and one URL's failure never aborts the others. In
//! concurrent mode at most `min(N, 4)` downloads are in flight at once; each
//! download still runs its own fragment-level concurrency inside yt-dlp.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::downloader::{download, new_child_slot, DownloadEvent};
use crate::options::{DownloadRequest, QualityTier};

/// Upper bound on simultaneously running downloads in concurrent mode.
pub const MAX_CONCURRENT: usize = 4;

/// Settings shared by every URL in a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub tier: QualityTier,
    pub threads: u32,
    pub limit_rate: Option<String>,
    pub concurrent: bool,
}

impl BatchOptions {
    fn request_for(&self, url: &str) -> DownloadRequest {
        DownloadRequest::new(url, self.output_dir.clone())
            .tier(self.tier)
            .threads(self.threads)
            .limit_rate(self.limit_rate.clone())
    }
}

/// Outcome of a whole batch; failures are per-URL, never all-or-nothing.
#[derive(Debug)]
pub struct BatchReport {
    pub attempted: usize,
    pub failures: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pool size for a batch of `n` URLs in concurrent mode.
pub fn effective_pool_size(n: usize) -> usize {
    n.min(MAX_CONCURRENT).max(1)
}

/// Splits the CLI's comma-separated URL argument.
pub fn split_urls(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Runs `f` over every item with at most `limit` futures in flight. Results
// come back in item order; a panicked task just drops its slot.
async fn for_each_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let n = items.len();
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let f = Arc::new(f);
    let mut set = JoinSet::new();
    for (i, item) in items.into_iter().enumerate() {
        let sem = Arc::clone(&sem);
        let f = Arc::clone(&f);
        set.spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore never closed");
            (i, f(i, item).await)
        });
    }

    let mut slots: Vec<Option<R>> = (0..n).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        if let Ok((i, r)) = joined {
            slots[i] = Some(r);
        }
    }
    slots.into_iter().flatten().collect()
}

// Tags each event of one download with the URL's index in the batch.
fn tagged_sender(
    index: usize,
    events: &UnboundedSender<(usize, DownloadEvent)>,
) -> UnboundedSender<DownloadEvent> {
    let (tx, mut rx) = unbounded_channel();
    let outer = events.clone();
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let _ = outer.send((index, ev));
        }
    });
    tx
}

/// Downloads every URL in the list, sequentially or through the bounded pool.
pub async fn download_many(
    bin: &Path,
    urls: &[String],
    opts: &BatchOptions,
    events: &UnboundedSender<(usize, DownloadEvent)>,
) -> BatchReport {
    info!(count = urls.len(), concurrent = opts.concurrent, "starting batch");
    let started = Instant::now();
    let mut failures = Vec::new();

    if opts.concurrent {
        let jobs: Vec<(String, UnboundedSender<DownloadEvent>)> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| (url.clone(), tagged_sender(i, events)))
            .collect();
        let bin = bin.to_path_buf();
        let opts = opts.clone();
        let limit = effective_pool_size(urls.len());
        let results = for_each_bounded(jobs, limit, move |_, (url, tx)| {
            let bin = bin.clone();
            let req = opts.request_for(&url);
            async move {
                let slot = new_child_slot();
                let result = download(&bin, &req, &tx, &slot).await;
                (url, result)
            }
        })
        .await;
        for (url, result) in results {
            if let Err(err) = result {
                warn!(%url, %err, "batch download failed");
                failures.push((url, err.to_string()));
            }
        }
    } else {
        for (i, url) in urls.iter().enumerate() {
            let tx = tagged_sender(i, events);
            let req = opts.request_for(url);
            let slot = new_child_slot();
            if let Err(err) = download(bin, &req, &tx, &slot).await {
                warn!(%url, %err, "batch download failed");
                failures.push((url.clone(), err.to_string()));
            }
        }
    }

    BatchReport {
        attempted: urls.len(),
        failures,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn pool_size_caps_at_four() {
        assert_eq!(effective_pool_size(1), 1);
        assert_eq!(effective_pool_size(4), 4);
        assert_eq!(effective_pool_size(9), 4);
        assert_eq!(effective_pool_size(0), 1);
    }

    #[test]
    fn url_splitting_trims_and_drops_empties() {
        assert_eq!(
            split_urls("https://a.test/1, https://a.test/2 ,,"),
            vec!["https://a.test/1".to_string(), "https://a.test/2".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bounded_runner_never_exceeds_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (running_c, peak_c) = (Arc::clone(&running), Arc::clone(&peak));

        let items: Vec<usize> = (0..12).collect();
        let results = for_each_bounded(items, 4, move |_, item| {
            let running = Arc::clone(&running_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                item * 2
            }
        })
        .await;

        assert_eq!(results.len(), 12);
        assert_eq!(results[3], 6);
        assert!(peak.load(Ordering::SeqCst) <= 4, "pool exceeded its bound");
    }

    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        // Fails for URLs containing "bad", succeeds otherwise.
        let script = dir.join("yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\ncase \"$*\" in *bad*) echo oops >&2; exit 1;; esac\nexit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    fn batch_opts(dir: &Path, concurrent: bool) -> BatchOptions {
        BatchOptions {
            output_dir: dir.join("out"),
            tier: QualityTier::Best,
            threads: 1,
            limit_rate: None,
            concurrent,
        }
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sequential_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_ytdlp(dir.path());
        let urls = vec![
            "https://youtu.be/bad111".to_string(),
            "https://youtu.be/good22".to_string(),
        ];
        let (tx, _rx) = unbounded_channel();

        let report = download_many(&bin, &urls, &batch_opts(dir.path(), false), &tx).await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "https://youtu.be/bad111");
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_batch_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_ytdlp(dir.path());
        let urls: Vec<String> = (0..5)
            .map(|i| {
                if i == 2 {
                    "https://youtu.be/bad000".to_string()
                } else {
                    format!("https://youtu.be/ok{i}")
                }
            })
            .collect();
        let (tx, _rx) = unbounded_channel();

        let report = download_many(&bin, &urls, &batch_opts(dir.path(), true), &tx).await;
        assert_eq!(report.attempted, 5);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.all_succeeded());
    }
}
