//! HTML helper functions

use super::url::url_for;
use crate::config::SiteConfig;

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Inline `style` declarations, written in insertion order
#[derive(Debug, Default, Clone)]
pub struct StyleBuilder {
    decls: Vec<(&'static str, String)>,
}

impl StyleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, property: &'static str, value: impl Into<String>) -> &mut Self {
        self.decls.push((property, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// ` style="..."`, or nothing when there are no declarations
    pub fn attr(&self) -> String {
        if self.decls.is_empty() {
            return String::new();
        }
        let body = self
            .decls
            .iter()
            .map(|(p, v)| format!("{}:{}", p, v))
            .collect::<Vec<_>>()
            .join(";");
        format!(r#" style="{}""#, html_escape(&body))
    }
}

/// ` name="value"` with the value escaped, or nothing for `None`
pub fn opt_attr(name: &str, value: Option<&str>) -> String {
    value
        .map(|v| format!(r#" {}="{}""#, name, html_escape(v)))
        .unwrap_or_default()
}

/// Generate an image tag for a site asset such as a post's cover image
///
/// # Examples
/// ```ignore
/// image_tag(&config, "/remax_logo.png", Some("Logo")) // -> <img src="/remax_logo.png" alt="Logo">
/// ```
pub fn image_tag(config: &SiteConfig, path: &str, alt: Option<&str>) -> String {
    let src = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        url_for(config, path)
    };

    format!(
        r#"<img src="{}" alt="{}">"#,
        html_escape(&src),
        html_escape(alt.unwrap_or(""))
    )
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Truncate a string to a specified length
pub fn truncate(s: &str, length: usize, omission: Option<&str>) -> String {
    let omission = omission.unwrap_or("...");

    if s.chars().count() <= length {
        s.to_string()
    } else {
        let truncated: String = s
            .chars()
            .take(length.saturating_sub(omission.chars().count()))
            .collect();
        format!("{}{}", truncated.trim_end(), omission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_style_builder() {
        let mut style = StyleBuilder::new();
        assert_eq!(style.attr(), "");
        style.push("width", "50%").push("float", "left");
        assert_eq!(style.attr(), r#" style="width:50%;float:left""#);
    }

    #[test]
    fn test_opt_attr() {
        assert_eq!(opt_attr("title", Some("a\"b")), r#" title="a&quot;b""#);
        assert_eq!(opt_attr("title", None), "");
    }

    #[test]
    fn test_image_tag() {
        let config = SiteConfig::default();
        assert_eq!(
            image_tag(&config, "/remax_logo.png", Some("Logo")),
            r#"<img src="/remax_logo.png" alt="Logo">"#
        );
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello World", 8, None), "Hello...");
        assert_eq!(truncate("Hi", 10, None), "Hi");
    }
}
