//! Downloading and decoding video thumbnails for the GUI.

use std::time::Duration;

use eframe::egui::ColorImage;

use crate::sites;

/// Fetches the thumbnail for a YouTube URL, keyed by video id.
///
/// Returns `None` for URLs no id can be extracted from, and on any network or
/// decode error; the GUI simply shows no image in those cases.
pub fn fetch_for_url(url: &str) -> Option<(String, ColorImage)> {
    let video_id = sites::extract_video_id(url)?;
    let image = fetch_thumbnail(&video_id)?;
    Some((video_id, image))
}

/// Fetches and decodes the standard high-quality default thumbnail.
pub fn fetch_thumbnail(video_id: &str) -> Option<ColorImage> {
    let url = format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg");
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .ok()?;
    let bytes = client.get(&url).send().ok()?.bytes().ok()?;
    let img = image::load_from_memory(&bytes).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}
