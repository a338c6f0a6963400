//! Command-line downloader: single URLs, comma-separated batches, and format
//! listing, all delegated to yt-dlp.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::bail;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::error;
use tracing_subscriber::EnvFilter;

use tubefast::batch::{download_many, split_urls, BatchOptions};
use tubefast::downloader::{list_formats, DownloadEvent};
use tubefast::options::QualityTier;
use tubefast::ytdlp;

#[derive(Debug, Parser)]
#[command(name = "tubefast")]
#[command(about = "Download videos in HD quality at maximum speed")]
struct Cli {
    /// Video URL to download (single URL or comma-separated list)
    url: String,

    /// Output directory
    #[arg(short, long, default_value = "downloads")]
    output: PathBuf,

    /// Video quality to download: best, 1080p, 1440p or 2160p
    #[arg(short, long, default_value = "best", value_parser = parse_tier)]
    quality: QualityTier,

    /// Download audio only
    #[arg(long)]
    audio_only: bool,

    /// List available formats instead of downloading
    #[arg(long)]
    list_formats: bool,

    /// Number of download threads per video
    #[arg(long, default_value_t = 4)]
    threads: u32,

    /// Enable concurrent downloads for multiple URLs
    #[arg(long)]
    concurrent: bool,

    /// Limit download rate (e.g. 50M for 50 MB/s)
    #[arg(long)]
    limit_rate: Option<String>,

    /// Explicit path to the yt-dlp executable
    #[arg(long)]
    ytdlp: Option<PathBuf>,
}

fn parse_tier(s: &str) -> Result<QualityTier, String> {
    s.parse().map_err(|e: tubefast::Error| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let bin = ytdlp::resolve_tool(cli.ytdlp.as_deref())?;
    let urls = split_urls(&cli.url);
    if urls.is_empty() {
        bail!("no video URL given");
    }

    if cli.list_formats {
        // Only the first URL is listed when several are given.
        list_formats(&bin, &urls[0]).await?;
        return Ok(());
    }

    let tier = if cli.audio_only {
        QualityTier::AudioOnly
    } else {
        cli.quality
    };

    println!("Preparing to download {} video(s)", urls.len());
    println!("Output directory: {}", cli.output.display());
    println!("Quality setting: {}", tier.label());
    println!("Using {} download threads for maximum speed", cli.threads);

    let (events_tx, events_rx) = unbounded_channel();
    let renderer = tokio::spawn(render_progress(events_rx, urls.clone()));

    let opts = BatchOptions {
        output_dir: cli.output,
        tier,
        threads: cli.threads,
        limit_rate: cli.limit_rate,
        concurrent: cli.concurrent,
    };
    let report = download_many(&bin, &urls, &opts, &events_tx).await;
    drop(events_tx);
    let _ = renderer.await;

    if report.all_succeeded() {
        println!(
            "\nAll downloads completed in {:.2} seconds!",
            report.elapsed.as_secs_f64()
        );
        Ok(())
    } else {
        for (url, reason) in &report.failures {
            error!(%url, "download failed: {reason}");
        }
        bail!(
            "{} of {} downloads failed",
            report.failures.len(),
            report.attempted
        );
    }
}

// Renders the event stream as one indicatif bar per URL, with tool output
// printed above the bars.
async fn render_progress(
    mut events: UnboundedReceiver<(usize, DownloadEvent)>,
    urls: Vec<String>,
) {
    let mp = MultiProgress::new();
    let style = ProgressStyle::with_template(
        "{prefix:.bold} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");

    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
    while let Some((index, event)) = events.recv().await {
        match event {
            DownloadEvent::Progress(snapshot) => {
                let bar = bars.entry(index).or_insert_with(|| {
                    let bar = mp.add(ProgressBar::new(snapshot.total_bytes.unwrap_or(0)));
                    bar.set_style(style.clone());
                    bar.set_prefix(short_label(&urls[index]));
                    bar
                });
                if let Some(total) = snapshot.total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(snapshot.downloaded_bytes);
            }
            DownloadEvent::Log(line) => {
                let _ = mp.println(line);
            }
            // Destination lines already arrive as Log output.
            DownloadEvent::Destination(_) => {}
            DownloadEvent::Finished { elapsed, .. } => {
                if let Some(bar) = bars.get(&index) {
                    bar.finish_and_clear();
                }
                let _ = mp.println(format!(
                    "Download completed successfully in {:.2} seconds!",
                    elapsed.as_secs_f64()
                ));
            }
            DownloadEvent::Failed(reason) => {
                if let Some(bar) = bars.get(&index) {
                    bar.finish_and_clear();
                }
                let _ = mp.println(format!("Error downloading video: {reason}"));
            }
        }
    }
}

fn short_label(url: &str) -> String {
    let mut label: String = url.chars().take(39).collect();
    if label.len() < url.len() {
        label.push('…');
    }
    label
}
