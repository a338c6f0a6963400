//! Windowed front-end for the SuperFast downloader.
//!
//! One window, one download at a time. The session controller owns the state
//! machine; this file is layout plus the per-frame event drains. The
//! `--youtube-only` flag narrows the URL allow-list and hides the
//! multi-platform info panel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use eframe::{egui, App, Frame};
use egui::{ColorImage, TextureOptions, Visuals};
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use tubefast::options::{DownloadRequest, QualityTier};
use tubefast::probe::{self, MediaSummary};
use tubefast::session::SessionController;
use tubefast::sites::{self, SitePolicy};
use tubefast::thumbnail;
use tubefast::ytdlp;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

const WINDOW_TITLE: &str = "Video SuperFast Downloader";
// Fragment threads per GUI download; the CLI exposes this, the GUI does not.
const GUI_THREADS: u32 = 8;

#[derive(Debug, Parser)]
#[command(name = "tubefast-gui")]
#[command(about = "Graphical front-end for the SuperFast video downloader")]
struct GuiArgs {
    /// Accept YouTube URLs only and hide the multi-platform info panel
    #[arg(long)]
    youtube_only: bool,

    /// Explicit path to the yt-dlp executable
    #[arg(long)]
    ytdlp: Option<PathBuf>,
}

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt().init();
    let args = GuiArgs::parse();

    let rt = Arc::new(Runtime::new().expect("failed to start tokio runtime"));
    RUNTIME.set(rt).expect("runtime initialized twice");

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(DownloaderApp::new(&args))
        }),
    )
}

fn default_output_dir() -> String {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|d| d.display().to_string()))
        .unwrap_or_else(|| "./downloads".to_string())
}

/// Application state for the GUI
struct DownloaderApp {
    session: SessionController,
    /// Resolved yt-dlp path, or the resolution error to show instead.
    tool: Result<PathBuf, String>,
    url_input: String,
    output_dir: String,
    tier: QualityTier,
    /// Info panel contents from the last successful probe.
    info: Option<MediaSummary>,
    /// Last URL a probe was spawned for, to avoid re-probing per keystroke.
    last_probed: String,
    info_tx: UnboundedSender<(String, Option<MediaSummary>)>,
    info_rx: UnboundedReceiver<(String, Option<MediaSummary>)>,
    /// Cached textures for video thumbnails, keyed by video id.
    thumbnails: HashMap<String, egui::TextureHandle>,
    /// Incoming thumbnail fetch results (video_id, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
    /// Video id of the thumbnail to show for the current URL.
    current_thumbnail: Option<String>,
}

impl DownloaderApp {
    fn new(args: &GuiArgs) -> Self {
        let policy = if args.youtube_only {
            SitePolicy::YoutubeOnly
        } else {
            SitePolicy::AllSupported
        };
        let runtime = RUNTIME.get().expect("runtime set in main").handle().clone();
        let (info_tx, info_rx) = unbounded_channel();
        Self {
            session: SessionController::new(policy, runtime),
            tool: ytdlp::resolve_tool(args.ytdlp.as_deref()).map_err(|e| e.to_string()),
            url_input: String::new(),
            output_dir: default_output_dir(),
            tier: QualityTier::Best,
            info: None,
            last_probed: String::new(),
            info_tx,
            info_rx,
            thumbnails: HashMap::new(),
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
            current_thumbnail: None,
        }
    }

    fn show_info_panel(&self) -> bool {
        self.session.policy() == SitePolicy::AllSupported
    }

    /// Kicks off the metadata probe and thumbnail fetch for the current URL,
    /// at most once per distinct URL.
    fn maybe_probe(&mut self, ctx: &egui::Context) {
        let url = self.url_input.trim().to_string();
        if url.is_empty() || url == self.last_probed || !self.session.policy().allows(&url) {
            return;
        }
        self.last_probed = url.clone();
        self.spawn_thumbnail(ctx, &url);

        if !self.show_info_panel() {
            return;
        }
        let Ok(bin) = self.tool.clone() else { return };
        let tx = self.info_tx.clone();
        let ctx = ctx.clone();
        RUNTIME.get().expect("runtime set in main").spawn(async move {
            // Probe failures degrade to placeholder fields, never to an error.
            let summary = probe::probe(&bin, &url)
                .await
                .ok()
                .map(|info| probe::summarize(&info));
            let _ = tx.send((url, summary));
            ctx.request_repaint();
        });
    }

    fn spawn_thumbnail(&mut self, ctx: &egui::Context, url: &str) {
        let Some(video_id) = sites::extract_video_id(url) else {
            self.current_thumbnail = None;
            return;
        };
        self.current_thumbnail = Some(video_id.clone());
        if self.thumbnails.contains_key(&video_id) {
            return;
        }
        let url = url.to_string();
        let results = Arc::clone(&self.thumbnail_results);
        let ctx = ctx.clone();
        RUNTIME.get().expect("runtime set in main").spawn_blocking(move || {
            if let Some((id, img)) = thumbnail::fetch_for_url(&url) {
                results.lock().unwrap().push((id, img));
                ctx.request_repaint();
            }
        });
    }

    fn start_download(&mut self) {
        let bin = match &self.tool {
            Ok(bin) => bin.clone(),
            Err(reason) => {
                self.session.status = reason.clone();
                return;
            }
        };
        let req = DownloadRequest::new(self.url_input.trim(), self.output_dir.clone())
            .tier(self.tier)
            .threads(GUI_THREADS);
        if let Err(err) = self.session.start(bin, req) {
            self.session.status = err.to_string();
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1. Apply pending download events from the background task
        self.session.pump();

        // 2. Apply completed probe results
        while let Ok((url, summary)) = self.info_rx.try_recv() {
            if url == self.url_input.trim() {
                self.info = summary;
            }
        }

        // 3. Handle completed thumbnail fetches
        {
            let mut pending = self.thumbnail_results.lock().unwrap();
            for (vid, img) in pending.drain(..) {
                let tex = ctx.load_texture(&vid, img, TextureOptions::default());
                self.thumbnails.insert(vid, tex);
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(WINDOW_TITLE);

            ui.label("Enter video URL:");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.url_input).desired_width(f32::INFINITY),
            );
            if response.changed() {
                self.maybe_probe(ctx);
            }
            ui.label(egui::RichText::new(self.session.policy().summary()).italics().weak());
            ui.add_space(8.0);

            // Video information panel (multi-platform variant only)
            if self.show_info_panel() {
                ui.group(|ui| {
                    ui.horizontal(|ui| {
                        if let Some(tex) = self
                            .current_thumbnail
                            .as_ref()
                            .and_then(|id| self.thumbnails.get(id))
                        {
                            ui.image(tex);
                        }
                        egui::Grid::new("video_info").num_columns(2).show(ui, |ui| {
                            ui.strong("Title:");
                            match &self.info {
                                Some(info) => ui.label(&info.title),
                                None => ui.label("Paste a video URL to see details"),
                            };
                            ui.end_row();
                            ui.strong("Platform:");
                            ui.label(self.info.as_ref().map(|i| i.platform.as_str()).unwrap_or(""));
                            ui.end_row();
                            ui.strong("Quality:");
                            ui.label(self.info.as_ref().map(|i| i.quality.as_str()).unwrap_or(""));
                            ui.end_row();
                            ui.strong("Size:");
                            ui.label(self.info.as_ref().map(|i| i.size.as_str()).unwrap_or(""));
                            ui.end_row();
                        });
                    });
                });
                ui.add_space(8.0);
            }

            // Output folder selection
            ui.horizontal(|ui| {
                ui.label("Save to:");
                ui.text_edit_singleline(&mut self.output_dir);
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = rfd::FileDialog::new()
                        .set_directory(&self.output_dir)
                        .pick_folder()
                    {
                        self.output_dir = folder.display().to_string();
                    }
                }
            });

            // Quality dropdown
            ui.horizontal(|ui| {
                ui.label("Quality:");
                egui::ComboBox::from_id_source("quality")
                    .selected_text(self.tier.label())
                    .show_ui(ui, |ui| {
                        for tier in QualityTier::ALL {
                            ui.selectable_value(&mut self.tier, tier, tier.label());
                        }
                    });
            });
            ui.add_space(8.0);

            // Download / cancel / play controls
            ui.horizontal(|ui| {
                let idle = self.session.is_idle();
                let can_start = idle && self.tool.is_ok();
                if ui
                    .add_enabled(can_start, egui::Button::new("⬇️ Download"))
                    .clicked()
                {
                    self.start_download();
                }
                if ui
                    .add_enabled(!idle, egui::Button::new("⏹️ Cancel"))
                    .clicked()
                {
                    self.session.cancel();
                }
                let can_play = idle && self.session.last_file().is_some();
                if ui
                    .add_enabled(can_play, egui::Button::new("▶️ Play Video"))
                    .clicked()
                {
                    self.session.play_last();
                }
            });
            ui.add_space(8.0);

            // Progress and status
            ui.add(egui::ProgressBar::new(self.session.progress).show_percentage());
            ui.label(&self.session.status);
            if let Err(reason) = &self.tool {
                ui.colored_label(egui::Color32::LIGHT_RED, reason);
            }
            ui.separator();

            // Log pane
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in &self.session.log {
                        ui.monospace(line);
                    }
                });
        });

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}
