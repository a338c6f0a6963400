//! Builds the double-clickable macOS application shell around the GUI binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use tubefast::bundle::{build, BundleConfig};

#[derive(Debug, Parser)]
#[command(name = "tubefast-bundle")]
#[command(about = "Create a macOS application bundle for the downloader GUI")]
struct Cli {
    /// Application name shown in Finder
    #[arg(long, default_value = "Video SuperFast Downloader")]
    name: String,

    /// Directory the .app is created in (default: the Desktop)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Source image converted into the multi-resolution app icon
    #[arg(long)]
    icon: Option<PathBuf>,

    /// GUI binary the launcher runs (default: tubefast-gui next to this executable)
    #[arg(long)]
    gui: Option<PathBuf>,
}

fn default_target_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.desktop_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn sibling_gui_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let name = if cfg!(windows) {
        "tubefast-gui.exe"
    } else {
        "tubefast-gui"
    };
    let candidate = exe.parent()?.join(name);
    candidate.is_file().then_some(candidate)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let gui_program = cli
        .gui
        .or_else(sibling_gui_binary)
        .context("could not locate tubefast-gui; pass --gui <path>")?;
    let config = BundleConfig {
        app_name: cli.name,
        target_dir: cli.out.unwrap_or_else(default_target_dir),
        gui_program,
        icon_source: cli.icon,
    };

    let paths = build(&config)?;
    println!("Created macOS application at: {}", paths.app.display());
    println!(
        "You can now launch {} by double-clicking the icon.",
        config.app_name
    );
    Ok(())
}
