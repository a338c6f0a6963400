//! Locating the yt-dlp executable.
//!
//! Resolution order: explicit override, then `yt-dlp` on PATH, then a binary
//! embedded from `assets/` at build time and extracted to the temp directory
//! on first use. The assets folder ships empty; dropping a yt-dlp binary in it
//! produces a self-contained executable.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

fn binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn extract_embedded(name: &str) -> Result<Option<PathBuf>> {
    let Some(data) = Asset::get(name) else {
        return Ok(None);
    };
    let target = std::env::temp_dir().join(name);
    if !target.exists() {
        let mut f = File::create(&target)?;
        f.write_all(&data.data)?;
        make_executable(&target)?;
    }
    Ok(Some(target))
}

/// Resolves the yt-dlp executable to invoke, or [`Error::ToolMissing`].
pub fn resolve_tool(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::ToolMissing);
    }

    let name = binary_name();
    if let Some(found) = find_on_path(name) {
        debug!(path = %found.display(), "using yt-dlp from PATH");
        return Ok(found);
    }
    if let Some(extracted) = extract_embedded(name)? {
        debug!(path = %extracted.display(), "using embedded yt-dlp");
        return Ok(extracted);
    }
    Err(Error::ToolMissing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_must_point_at_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("yt-dlp");
        assert!(matches!(
            resolve_tool(Some(&missing)),
            Err(Error::ToolMissing)
        ));

        let present = dir.path().join("yt-dlp-real");
        std::fs::write(&present, b"#!/bin/sh\n").unwrap();
        assert_eq!(resolve_tool(Some(&present)).unwrap(), present);
    }
}
