//! Standalone HTML page for one post

use super::HtmlRenderer;
use crate::config::SiteConfig;
use crate::content::Post;
use crate::helpers::{full_url_for, html_escape, image_tag, strip_html, truncate, url_for};

/// Longest meta description, in chars
const DESCRIPTION_LEN: usize = 160;

/// Site path of a post, e.g. `blog/open-house/`
pub fn post_path(config: &SiteConfig, id: &str) -> String {
    let dir = config.post_dir.trim_matches('/');
    if dir.is_empty() {
        format!("{}/", id)
    } else {
        format!("{}/{}/", dir, id)
    }
}

/// Full page for a post. Posts without a body show their excerpt.
pub fn render_post_page(config: &SiteConfig, renderer: &HtmlRenderer, post: &Post) -> String {
    let doc = post.document();
    let body = if doc.has_content() {
        renderer.render(&doc)
    } else {
        format!("<p>{}</p>", html_escape(&post.excerpt))
    };

    let path = post_path(config, &post.id);
    let description = truncate(&strip_html(&post.excerpt), DESCRIPTION_LEN, None);
    let cover = if post.image.is_empty() {
        String::new()
    } else {
        image_tag(config, &post.image, Some(&post.title))
    };

    let mut meta = vec![post.category.as_str(), post.date.as_str(), post.read_time.as_str()];
    meta.retain(|m| !m.is_empty());

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | {site}</title>
<meta name="description" content="{description}">
<link rel="canonical" href="{canonical}">
</head>
<body>
<nav><a href="{home}">{site}</a></nav>
<article class="post">
<header>
<p class="post-meta">{meta}</p>
<h1>{title}</h1>
{cover}
</header>
<div class="post-body">{body}</div>
</article>
</body>
</html>
"#,
        title = html_escape(&post.title),
        site = html_escape(&config.title),
        description = html_escape(&description),
        canonical = html_escape(&full_url_for(config, &path)),
        home = html_escape(&url_for(config, "/")),
        meta = html_escape(&meta.join(" | ")),
        cover = cover,
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Node};
    use serde_json::json;

    fn post() -> Post {
        serde_json::from_value(json!({
            "id": "open-house",
            "title": "Open House <Saturday>",
            "excerpt": "Come <b>see</b> the place",
            "category": "Events",
            "image": "/remax_logo.png",
            "date": "Jan 5, 2025",
            "readTime": "1 min read"
        }))
        .unwrap()
    }

    #[test]
    fn test_post_path() {
        let mut config = SiteConfig::default();
        assert_eq!(post_path(&config, "a"), "blog/a/");
        config.post_dir = String::new();
        assert_eq!(post_path(&config, "a"), "a/");
    }

    #[test]
    fn test_page_with_excerpt_only() {
        let config = SiteConfig::default();
        let html = render_post_page(&config, &HtmlRenderer::default(), &post());
        assert!(html.contains("<title>Open House &lt;Saturday&gt; | Realty Blog</title>"));
        assert!(html.contains(r#"content="Come see the place""#));
        assert!(html.contains(r#"href="http://example.com/blog/open-house/""#));
        assert!(html.contains("Events | Jan 5, 2025 | 1 min read"));
        assert!(html.contains(r#"<img src="/remax_logo.png""#));
        assert!(html.contains("<p>Come &lt;b&gt;see&lt;/b&gt; the place</p>"));
    }

    #[test]
    fn test_page_renders_body() {
        let config = SiteConfig::default();
        let mut post = post();
        post.set_document(Document::new(vec![Node::paragraph("Doors open at noon")]), 200);
        let html = render_post_page(&config, &HtmlRenderer::default(), &post);
        assert!(html.contains(r#"<div class="post-body"><p>Doors open at noon</p></div>"#));
    }
}
