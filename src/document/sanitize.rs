//! Attribute sanitization shared by the editor and the renderer

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"^\d{1,3}%$").unwrap();
    static ref PIXELS: Regex = Regex::new(r"^\d{1,4}px$").unwrap();
}

/// A CSS width restricted to `N%` (up to three digits) or `Npx` (up to four)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct SizeValue(String);

impl SizeValue {
    /// Validate a raw width value
    pub fn parse(raw: &str) -> Option<Self> {
        let v = raw.trim();
        if PERCENT.is_match(v) || PIXELS.is_match(v) {
            Some(Self(v.to_string()))
        } else {
            None
        }
    }

    /// A whole-number percentage
    pub fn percent(n: u32) -> Self {
        Self(format!("{}%", n.min(999)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SizeValue {
    fn default() -> Self {
        Self("100%".to_string())
    }
}

impl TryFrom<String> for SizeValue {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid size value {:?}", raw))
    }
}

impl fmt::Display for SizeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text wrap side for a floated image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Float {
    Left,
    Right,
}

impl Float {
    pub fn as_str(&self) -> &'static str {
        match self {
            Float::Left => "left",
            Float::Right => "right",
        }
    }

    /// Margin that keeps wrapped text off the image edge
    pub fn margin(&self) -> &'static str {
        match self {
            Float::Left => "0.5rem 1.25rem 0.5rem 0",
            Float::Right => "0.5rem 0 0.5rem 1.25rem",
        }
    }
}

/// Validate a raw width, rejecting anything but `%` and `px` values.
///
/// # Examples
/// ```ignore
/// sanitize_size("50%")          // -> Some("50%")
/// sanitize_size("calc(1px+2%)") // -> None
/// ```
pub fn sanitize_size(raw: &str) -> Option<SizeValue> {
    SizeValue::parse(raw)
}

/// Only the literal values `left` and `right` pass
pub fn sanitize_float(raw: &str) -> Option<Float> {
    match raw {
        "left" => Some(Float::Left),
        "right" => Some(Float::Right),
        _ => None,
    }
}

/// A link target that may be rendered as a clickable anchor
pub fn safe_link_href(href: &str) -> Option<&str> {
    (href.starts_with("http://") || href.starts_with("https://")).then_some(href)
}

/// A self-hosted video source; plain `http://` is not accepted
pub fn safe_video_src(src: &str) -> Option<&str> {
    src.starts_with("https://").then_some(src)
}

/// An image source that may be placed in an `<img>` tag
pub fn safe_image_src(src: &str) -> Option<&str> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") || lower.starts_with("vbscript:") {
        return None;
    }
    Some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_sizes_are_unchanged() {
        for s in ["0%", "50%", "100%", "999%", "1px", "160px", "9999px"] {
            assert_eq!(sanitize_size(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let size: SizeValue = serde_json::from_str("\"40%\"").unwrap();
        assert_eq!(size.as_str(), "40%");
        assert_eq!(serde_json::to_string(&size).unwrap(), "\"40%\"");
        assert!(serde_json::from_str::<SizeValue>("\"calc(100% - 2px)\"").is_err());

        let attrs = serde_json::from_value::<crate::document::ImageAttrs>(serde_json::json!({
            "src": "https://cdn.example/a.png",
            "width": "calc(100% - 2px)"
        }));
        assert!(attrs.is_err());
    }

    #[test]
    fn test_rejected_sizes() {
        for s in [
            "", "%", "px", "1000%", "10000px", "-5%", "-10px", "50 %", "1.5%", "10em", "10rem",
            "calc(100% - 2px)", "50%;color:red", "auto",
        ] {
            assert_eq!(sanitize_size(s), None, "{:?} should be rejected", s);
        }
    }

    #[test]
    fn test_size_is_trimmed() {
        assert_eq!(sanitize_size(" 40% ").unwrap().as_str(), "40%");
        assert_eq!(SizeValue::default().as_str(), "100%");
        assert_eq!(SizeValue::percent(27).as_str(), "27%");
    }

    #[test]
    fn test_float() {
        assert_eq!(sanitize_float("left"), Some(Float::Left));
        assert_eq!(sanitize_float("right"), Some(Float::Right));
        assert_eq!(sanitize_float("Left"), None);
        assert_eq!(sanitize_float("center"), None);
        assert_eq!(sanitize_float(""), None);
    }

    #[test]
    fn test_link_href() {
        assert_eq!(safe_link_href("https://a.example"), Some("https://a.example"));
        assert_eq!(safe_link_href("http://a.example"), Some("http://a.example"));
        assert_eq!(safe_link_href("javascript:alert(1)"), None);
        assert_eq!(safe_link_href("/relative"), None);
        assert_eq!(safe_link_href(""), None);
    }

    #[test]
    fn test_media_src() {
        assert!(safe_video_src("https://cdn.example/v.mp4").is_some());
        assert!(safe_video_src("http://cdn.example/v.mp4").is_none());
        assert!(safe_image_src("/media/a.png").is_some());
        assert!(safe_image_src("").is_none());
        assert!(safe_image_src("JavaScript:alert(1)").is_none());
        assert!(safe_image_src("data:image/png;base64,AAAA").is_none());
    }
}
