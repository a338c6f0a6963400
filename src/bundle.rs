//! macOS application bundle builder.
//!
//! Produces a double-clickable `.app` shell around the GUI binary: a launcher
//! script, an `Info.plist` with the fixed bundle metadata, and a
//! multi-resolution `.icns` icon assembled with the system `sips` and
//! `iconutil` utilities. The skeleton part is plain filesystem work and runs
//! anywhere; the icon step needs the macOS tools and fails with a clear error
//! without them. Directory creation is idempotent, so rebuilding over an
//! existing bundle is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::{Error, Result};

pub const BUNDLE_IDENTIFIER: &str = "com.tubefast.app";
pub const BUNDLE_VERSION: &str = "1.0";

/// Icon edge lengths generated into the iconset; sizes below 512 also get a
/// doubled @2x variant.
const ICON_SIZES: [u32; 6] = [16, 32, 64, 128, 256, 512];

#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Display name; also names the `.app` directory.
    pub app_name: String,
    /// Where the `.app` directory is created.
    pub target_dir: PathBuf,
    /// GUI binary the launcher script executes.
    pub gui_program: PathBuf,
    /// Source image for the icon; skipping it skips the icon step.
    pub icon_source: Option<PathBuf>,
}

/// Resolved layout of one application bundle.
#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub app: PathBuf,
    pub contents: PathBuf,
    pub macos: PathBuf,
    pub resources: PathBuf,
    pub launcher: PathBuf,
    pub info_plist: PathBuf,
    pub icon: PathBuf,
}

pub fn bundle_paths(config: &BundleConfig) -> BundlePaths {
    let app = config.target_dir.join(format!("{}.app", config.app_name));
    let contents = app.join("Contents");
    let macos = contents.join("MacOS");
    let resources = contents.join("Resources");
    BundlePaths {
        launcher: macos.join("launcher"),
        info_plist: contents.join("Info.plist"),
        icon: resources.join("AppIcon.icns"),
        app,
        contents,
        macos,
        resources,
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn info_plist_xml(app_name: &str) -> String {
    let name = xml_escape(app_name);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleName</key>
	<string>{name}</string>
	<key>CFBundleDisplayName</key>
	<string>{name}</string>
	<key>CFBundleIdentifier</key>
	<string>{BUNDLE_IDENTIFIER}</string>
	<key>CFBundleVersion</key>
	<string>{BUNDLE_VERSION}</string>
	<key>CFBundleExecutable</key>
	<string>launcher</string>
	<key>CFBundleIconFile</key>
	<string>AppIcon</string>
	<key>CFBundlePackageType</key>
	<string>APPL</string>
	<key>NSHighResolutionCapable</key>
	<true/>
</dict>
</plist>
"#
    )
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Creates the bundle directory tree, launcher script and Info.plist.
pub fn write_skeleton(config: &BundleConfig) -> Result<BundlePaths> {
    let paths = bundle_paths(config);
    fs::create_dir_all(&paths.macos)?;
    fs::create_dir_all(&paths.resources)?;

    let launcher = format!(
        "#!/bin/bash\nexec \"{}\" \"$@\"\n",
        config.gui_program.display()
    );
    fs::write(&paths.launcher, launcher)?;
    make_executable(&paths.launcher)?;

    fs::write(&paths.info_plist, info_plist_xml(&config.app_name))?;
    Ok(paths)
}

fn run_tool(tool: &str, args: &[String]) -> Result<()> {
    let output = Command::new(tool).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::IconToolFailed {
                tool: tool.to_string(),
                code: None,
                stderr: "not found; icon building requires the macOS image utilities".to_string(),
            }
        } else {
            Error::Io(e)
        }
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::IconToolFailed {
            tool: tool.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

// sips invocation converting the source image to a png at the given edge.
fn sips_resize_args(source: &Path, size: u32, dest: &Path) -> Vec<String> {
    vec![
        "-s".to_string(),
        "format".to_string(),
        "png".to_string(),
        "-z".to_string(),
        size.to_string(),
        size.to_string(),
        source.display().to_string(),
        "--out".to_string(),
        dest.display().to_string(),
    ]
}

/// Builds the multi-resolution icon into `Contents/Resources/AppIcon.icns`.
///
/// Stages an iconset in a scratch directory, renders each size (plus @2x
/// variants) with `sips`, then packs it with `iconutil`.
pub fn build_icon(config: &BundleConfig, paths: &BundlePaths) -> Result<()> {
    let Some(source) = &config.icon_source else {
        return Ok(());
    };
    if !source.is_file() {
        return Err(Error::IconSourceMissing(source.clone()));
    }

    let staging = tempfile::tempdir()?;
    let iconset = staging.path().join("AppIcon.iconset");
    fs::create_dir_all(&iconset)?;
    // Keep the unconverted source outside the iconset so iconutil only sees
    // the generated pngs.
    let base = staging.path().join("source-image");
    fs::copy(source, &base)?;

    for size in ICON_SIZES {
        let out = iconset.join(format!("icon_{size}x{size}.png"));
        run_tool("sips", &sips_resize_args(&base, size, &out))?;
        if size < 512 {
            let out = iconset.join(format!("icon_{size}x{size}@2x.png"));
            run_tool("sips", &sips_resize_args(&base, size * 2, &out))?;
        }
    }

    run_tool(
        "iconutil",
        &[
            "-c".to_string(),
            "icns".to_string(),
            iconset.display().to_string(),
            "-o".to_string(),
            paths.icon.display().to_string(),
        ],
    )
}

/// Builds the whole bundle: skeleton, then icon when a source image is given.
pub fn build(config: &BundleConfig) -> Result<BundlePaths> {
    let paths = write_skeleton(config)?;
    build_icon(config, &paths)?;
    info!(app = %paths.app.display(), "created application bundle");
    Ok(paths)
}
