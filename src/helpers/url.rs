//! URL helper functions
//!
//! Site URL generation plus the video link normalizer. The normalizer is the
//! single implementation used both when an author pastes a link into the
//! editor and when the renderer re-derives a player `src` from stored data.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::config::SiteConfig;

/// Host every embed URL points at
pub const EMBED_BASE: &str = "https://www.youtube-nocookie.com/embed/";

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[a-zA-Z0-9_-]{6,}$").unwrap();
    static ref SECONDS: Regex = Regex::new(r"^\d+$").unwrap();
    static ref COMPOUND_DURATION: Regex =
        Regex::new(r"(?i)^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").unwrap();
    static ref HAS_SCHEME: Regex = Regex::new(r"(?i)^https?://").unwrap();
}

/// A sanitized, provider-hosted URL that is safe to put in a player frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct EmbedUrl(String);

impl EmbedUrl {
    fn build(video_id: &str, start: Option<u64>) -> Self {
        let mut url = format!("{}{}?rel=0&modestbranding=1", EMBED_BASE, video_id);
        if let Some(start) = start {
            url.push_str(&format!("&start={}", start));
        }
        Self(url)
    }

    /// The embed URL as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The validated video id
    pub fn video_id(&self) -> &str {
        let rest = self.0.strip_prefix(EMBED_BASE).unwrap_or_default();
        rest.split('?').next().unwrap_or(rest)
    }

    /// The start offset in seconds, if any
    pub fn start(&self) -> Option<u64> {
        self.0
            .split('?')
            .nth(1)?
            .split('&')
            .find_map(|pair| pair.strip_prefix("start="))
            .and_then(|n| n.parse().ok())
    }
}

impl TryFrom<String> for EmbedUrl {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        coerce_youtube_src(&raw).ok_or_else(|| format!("not a video URL: {:?}", raw))
    }
}

impl fmt::Display for EmbedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EmbedUrl> for String {
    fn from(url: EmbedUrl) -> String {
        url.0
    }
}

/// Parse a video start offset.
///
/// Accepts bare seconds (`90`) or a compound duration (`1h2m3s`, `1m30s`,
/// `45s`, case-insensitive). A zero total is treated as "no offset".
///
/// # Examples
/// ```ignore
/// parse_duration("1m30s") // -> Some(90)
/// ```
pub fn parse_duration(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if SECONDS.is_match(trimmed) {
        let total: u64 = trimmed.parse().ok()?;
        return (total > 0).then_some(total);
    }

    let caps = COMPOUND_DURATION.captures(trimmed)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };

    let total = part(1)?
        .checked_mul(3600)?
        .checked_add(part(2)?.checked_mul(60)?)?
        .checked_add(part(3)?)?;

    (total > 0).then_some(total)
}

/// Convert a user-supplied YouTube link into an embed URL.
///
/// Returns `None` for anything that is not a recognizable YouTube link with a
/// plausible video id.
///
/// # Examples
/// ```ignore
/// normalize_youtube_url("https://youtu.be/abc123XYZ9?t=1m30s")
/// // -> "https://www.youtube-nocookie.com/embed/abc123XYZ9?rel=0&modestbranding=1&start=90"
/// ```
pub fn normalize_youtube_url(raw: &str) -> Option<EmbedUrl> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let with_scheme = if HAS_SCHEME.is_match(raw) {
        raw.to_string()
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    };

    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let video_id: Option<String> = match host {
        "youtu.be" => segments.first().map(|s| s.to_string()),
        "youtube.com" | "m.youtube.com" => {
            if url.path() == "/watch" {
                query_param(&url, "v")
            } else {
                match segments.as_slice() {
                    [kind, id, ..] if matches!(*kind, "shorts" | "embed" | "live") => {
                        Some(id.to_string())
                    }
                    _ => None,
                }
            }
        }
        _ => None,
    };

    let video_id = video_id.filter(|id| VIDEO_ID.is_match(id))?;

    let start = query_param(&url, "start")
        .or_else(|| query_param(&url, "t"))
        .and_then(|raw| parse_duration(&raw));

    Some(EmbedUrl::build(&video_id, start))
}

/// Re-derive a safe embed URL from a stored `src`.
///
/// Stored embed URLs (either the privacy-enhanced host or the classic
/// `youtube.com/embed/` form) go through the same normalizer as pasted links,
/// so a tampered or stale value can never reach the page unvalidated.
pub fn coerce_youtube_src(raw: &str) -> Option<EmbedUrl> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix(EMBED_BASE) {
        return normalize_youtube_url(&format!("https://www.youtube.com/embed/{}", rest));
    }
    normalize_youtube_url(raw)
}

/// First non-empty value for a query key
fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/blog/my-post/") // -> "/site/blog/my-post/"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// Encode a single URL path segment
pub fn encode_segment(segment: &str) -> String {
    const SEGMENT: &percent_encoding::AsciiSet = &percent_encoding::NON_ALPHANUMERIC
        .remove(b'-')
        .remove(b'_')
        .remove(b'.')
        .remove(b'~');
    percent_encoding::utf8_percent_encode(segment, SEGMENT).to_string()
}
