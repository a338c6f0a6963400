//! Domain allow-list heuristics.
//!
//! URL "validation" is a plain lowercase substring match against a list of
//! known hosts. It is a convenience filter, not a security boundary: a string
//! like `nottiktok.com.evil.example` passes.

/// Hosts the multi-platform front-end accepts.
const ALL_SUPPORTED: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "fb.watch",
    "instagram.com",
    "twitter.com",
    "tiktok.com",
    "vimeo.com",
    "dailymotion.com",
];

/// Hosts the YouTube-only front-end accepts.
const YOUTUBE_ONLY: &[&str] = &["youtube.com", "youtu.be"];

/// Which subset of domains a front-end accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePolicy {
    YoutubeOnly,
    AllSupported,
}

impl SitePolicy {
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            SitePolicy::YoutubeOnly => YOUTUBE_ONLY,
            SitePolicy::AllSupported => ALL_SUPPORTED,
        }
    }

    /// Substring check against the policy's domain list.
    pub fn allows(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.domains().iter().any(|d| lower.contains(d))
    }

    /// Short label for the GUI's "Supported:" hint line.
    pub fn summary(&self) -> &'static str {
        match self {
            SitePolicy::YoutubeOnly => "Supported: YouTube",
            SitePolicy::AllSupported => {
                "Supported: YouTube, Facebook, Instagram, Twitter, TikTok, Vimeo, and more"
            }
        }
    }
}

/// Extracts the video id from a YouTube watch or short-link URL.
///
/// Handles `watch?v=<id>` and `youtu.be/<id>` forms; anything else yields
/// `None` and the caller skips thumbnail fetching.
pub fn extract_video_id(url: &str) -> Option<String> {
    if let Some(rest) = url.split("v=").nth(1) {
        return rest.split('&').next().map(|s| s.to_string());
    }
    if let Some(rest) = url.split("youtu.be/").nth(1) {
        let id = rest.split(['?', '&']).next().unwrap_or("");
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_domain_policy_accepts_known_hosts() {
        let policy = SitePolicy::AllSupported;
        assert!(policy.allows("https://www.youtube.com/watch?v=abc"));
        assert!(policy.allows("https://vimeo.com/12345"));
        assert!(policy.allows("HTTPS://WWW.TIKTOK.COM/@user/video/1"));
        assert!(!policy.allows("https://example.com/video"));
    }

    #[test]
    fn youtube_only_policy_rejects_other_platforms() {
        let policy = SitePolicy::YoutubeOnly;
        assert!(policy.allows("https://youtu.be/abc123"));
        assert!(!policy.allows("https://vimeo.com/12345"));
    }

    #[test]
    fn substring_match_is_knowingly_permissive() {
        // Documented behavior: this is a heuristic, not host validation.
        assert!(SitePolicy::AllSupported.allows("https://nottiktok.com.evil.example/x"));
    }

    #[test]
    fn video_id_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn video_id_from_short_link() {
        assert_eq!(
            extract_video_id("https://youtu.be/abc123?t=5"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_video_id("https://example.com/clip"), None);
    }
}
