//! HTML rendering of documents
//!
//! Rendering is a pure walk over the tree. Media whose source does not pass
//! sanitization is left out entirely, link marks with unsafe targets render
//! as plain text, and unknown nodes render only their children.

mod page;

pub use page::{post_path, render_post_page};

use serde_json::Value;

use crate::config::SiteConfig;
use crate::document::{coerce, Document, ImageAttrs, Inline, Mark, Node, TextRun, VideoAttrs, YoutubeAttrs};
use crate::document::sanitize::{safe_image_src, safe_link_href, safe_video_src};
use crate::helpers::{coerce_youtube_src, html_escape, StyleBuilder};

const YOUTUBE_ALLOW: &str = "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture; web-share";

/// Renderer settings
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Emit `richdoc-*` class hooks on block elements
    pub class_hooks: bool,
    /// Mark images and players `loading="lazy"`
    pub lazy_media: bool,
    /// Player aspect ratio used when a youtube node has no usable size
    pub youtube_width: u32,
    pub youtube_height: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            class_hooks: false,
            lazy_media: true,
            youtube_width: 640,
            youtube_height: 360,
        }
    }
}

impl RenderOptions {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            youtube_width: config.editor.youtube_width,
            youtube_height: config.editor.youtube_height,
            ..Self::default()
        }
    }
}

/// Document to HTML renderer
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    options: RenderOptions,
}

impl HtmlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render a whole document. Never fails.
    pub fn render(&self, doc: &Document) -> String {
        let mut out = String::new();
        for node in &doc.content {
            self.render_node(node, &mut out);
        }
        out
    }

    fn class(&self, name: &str) -> String {
        if self.options.class_hooks {
            format!(r#" class="richdoc-{}""#, name)
        } else {
            String::new()
        }
    }

    fn lazy(&self) -> &'static str {
        if self.options.lazy_media {
            r#" loading="lazy""#
        } else {
            ""
        }
    }

    fn render_node(&self, node: &Node, out: &mut String) {
        match node {
            Node::Paragraph { content } => {
                out.push_str(&format!("<p{}>", self.class("p")));
                self.render_inlines(content, out);
                out.push_str("</p>");
            }
            Node::Heading { level, content } => {
                let level = if (1..=3).contains(level) { *level } else { 2 };
                out.push_str(&format!("<h{}{}>", level, self.class("heading")));
                self.render_inlines(content, out);
                out.push_str(&format!("</h{}>", level));
            }
            Node::BulletList { items } | Node::OrderedList { items } => {
                let tag = if matches!(node, Node::BulletList { .. }) {
                    "ul"
                } else {
                    "ol"
                };
                out.push_str(&format!("<{}{}>", tag, self.class("list")));
                for item in items {
                    out.push_str("<li>");
                    self.render_children(&item.content, out);
                    out.push_str("</li>");
                }
                out.push_str(&format!("</{}>", tag));
            }
            Node::Blockquote { content } => {
                out.push_str(&format!("<blockquote{}>", self.class("quote")));
                self.render_children(content, out);
                out.push_str("</blockquote>");
            }
            Node::HardBreak => out.push_str("<br>"),
            Node::Image(attrs) => self.render_image(attrs, out),
            Node::Video(attrs) => self.render_video(attrs, out),
            Node::Youtube(attrs) => self.render_youtube(attrs, out),
            Node::Unknown { content, .. } => self.render_children(content, out),
            Node::Inline(content) => self.render_inlines(content, out),
        }
    }

    fn render_children(&self, nodes: &[Node], out: &mut String) {
        for node in nodes {
            self.render_node(node, out);
        }
    }

    fn render_inlines(&self, content: &[Inline], out: &mut String) {
        for inline in content {
            match inline {
                Inline::Text(run) => out.push_str(&render_text(run)),
                Inline::HardBreak => out.push_str("<br>"),
            }
        }
    }

    fn render_image(&self, attrs: &ImageAttrs, out: &mut String) {
        let Some(src) = safe_image_src(&attrs.src) else {
            return;
        };
        let alt = attrs
            .alt
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(attrs.title.as_deref())
            .unwrap_or("");

        let mut style = StyleBuilder::new();
        if let Some(width) = &attrs.width {
            style.push("width", width.as_str());
        }
        if let Some(float) = attrs.float {
            style
                .push("float", float.as_str())
                .push("margin", float.margin());
        }

        out.push_str(&format!(
            r#"<figure{}><img src="{}" alt="{}"{}{}>"#,
            self.class("image"),
            html_escape(src),
            html_escape(alt),
            self.lazy(),
            style.attr()
        ));
        push_caption(attrs.title.as_deref(), out);
        out.push_str("</figure>");
    }

    fn render_video(&self, attrs: &VideoAttrs, out: &mut String) {
        let Some(src) = safe_video_src(&attrs.src) else {
            return;
        };
        out.push_str(&format!(
            r#"<figure{}><video src="{}" controls preload="metadata"></video>"#,
            self.class("video"),
            html_escape(src)
        ));
        push_caption(attrs.title.as_deref(), out);
        out.push_str("</figure>");
    }

    fn render_youtube(&self, attrs: &YoutubeAttrs, out: &mut String) {
        let Some(embed) = coerce_youtube_src(&attrs.src) else {
            return;
        };
        let width = attrs.width.unwrap_or(self.options.youtube_width).max(1);
        let height = attrs.height.unwrap_or(self.options.youtube_height).max(1);

        let mut style = StyleBuilder::new();
        style.push("aspect-ratio", format!("{} / {}", width, height));

        out.push_str(&format!(
            r#"<div{}><div{}><iframe src="{}" title="YouTube video"{} referrerpolicy="strict-origin-when-cross-origin" allow="{}" allowfullscreen></iframe></div></div>"#,
            self.class("youtube"),
            style.attr(),
            html_escape(embed.as_str()),
            self.lazy(),
            YOUTUBE_ALLOW
        ));
    }
}

fn push_caption(title: Option<&str>, out: &mut String) {
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        out.push_str(&format!("<figcaption>{}</figcaption>", html_escape(title)));
    }
}

/// Escape the text and wrap it in one element per mark, first mark outermost
fn render_text(run: &TextRun) -> String {
    let mut html = html_escape(&run.text);
    for mark in run.marks.iter().rev() {
        html = match mark {
            Mark::Bold => format!("<strong>{}</strong>", html),
            Mark::Italic => format!("<em>{}</em>", html),
            Mark::Underline => format!("<u>{}</u>", html),
            Mark::Code => format!("<code>{}</code>", html),
            Mark::Link { href } => match safe_link_href(href) {
                Some(href) => format!(
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                    html_escape(href),
                    html
                ),
                None => html,
            },
        };
    }
    html
}

/// Render with default options
pub fn render(doc: &Document) -> String {
    HtmlRenderer::default().render(doc)
}

/// Coerce a stored content value and render it
pub fn render_rich_content(raw: &Value) -> String {
    render(&coerce(raw))
}

/// Whether a document has anything to show besides empty paragraphs
pub fn has_content(doc: &Document) -> bool {
    doc.has_content()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Float, ListItem, SizeValue};
    use serde_json::json;

    fn text(text: &str, marks: Vec<Mark>) -> Inline {
        Inline::Text(TextRun {
            text: text.into(),
            marks,
        })
    }

    fn image(src: &str) -> Node {
        Node::Image(ImageAttrs {
            src: src.into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_basic_blocks() {
        let doc = Document::new(vec![
            Node::Heading {
                level: 1,
                content: vec![Inline::text("Open <house>")],
            },
            Node::BulletList {
                items: vec![ListItem {
                    content: vec![Node::paragraph("Sat")],
                }],
            },
            Node::Blockquote {
                content: vec![Node::paragraph("q")],
            },
            Node::Paragraph {
                content: vec![Inline::text("a"), Inline::HardBreak, Inline::text("b")],
            },
        ]);
        assert_eq!(
            render(&doc),
            "<h1>Open &lt;house&gt;</h1><ul><li><p>Sat</p></li></ul><blockquote><p>q</p></blockquote><p>a<br>b</p>"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let doc = Document::new(vec![
            Node::paragraph("x"),
            Node::Youtube(YoutubeAttrs {
                src: "https://youtu.be/abc123XYZ9".into(),
                width: None,
                height: None,
            }),
        ]);
        let renderer = HtmlRenderer::default();
        assert_eq!(renderer.render(&doc), renderer.render(&doc));
    }

    #[test]
    fn test_image_without_src_renders_nothing() {
        let doc = Document::new(vec![image(""), image("javascript:alert(1)")]);
        assert_eq!(render(&doc), "");
    }

    #[test]
    fn test_image_figure() {
        let doc = Document::new(vec![Node::Image(ImageAttrs {
            src: "https://cdn.example/a.png".into(),
            alt: None,
            title: Some("Front porch".into()),
            width: Some(SizeValue::percent(50)),
            float: Some(Float::Left),
        })]);
        assert_eq!(
            render(&doc),
            r#"<figure><img src="https://cdn.example/a.png" alt="Front porch" loading="lazy" style="width:50%;float:left;margin:0.5rem 1.25rem 0.5rem 0"><figcaption>Front porch</figcaption></figure>"#
        );
    }

    #[test]
    fn test_javascript_link_is_not_clickable() {
        let doc = Document::new(vec![Node::Paragraph {
            content: vec![text(
                "click",
                vec![Mark::Bold, Mark::Link {
                    href: "javascript:alert(1)".into(),
                }],
            )],
        }]);
        let html = render(&doc);
        assert_eq!(html, "<p><strong>click</strong></p>");
        assert!(!html.contains("<a"));
    }

    #[test]
    fn test_marks_nest_first_outermost() {
        let run = TextRun {
            text: "x".into(),
            marks: vec![Mark::Bold, Mark::Italic, Mark::Link {
                href: "https://a.example".into(),
            }],
        };
        assert_eq!(
            render_text(&run),
            r#"<strong><em><a href="https://a.example" target="_blank" rel="noopener noreferrer">x</a></em></strong>"#
        );
    }

    #[test]
    fn test_video_requires_https() {
        let video = |src: &str| {
            Node::Video(VideoAttrs {
                src: src.into(),
                title: Some("Tour".into()),
            })
        };
        let doc = Document::new(vec![video("http://cdn.example/v.mp4"), video("https://cdn.example/v.mp4")]);
        assert_eq!(
            render(&doc),
            r#"<figure><video src="https://cdn.example/v.mp4" controls preload="metadata"></video><figcaption>Tour</figcaption></figure>"#
        );
    }

    #[test]
    fn test_youtube_player() {
        let doc = Document::new(vec![
            Node::Youtube(YoutubeAttrs {
                src: "https://www.youtube.com/watch?v=abc123XYZ9&t=90".into(),
                width: Some(560),
                height: Some(315),
            }),
            Node::Youtube(YoutubeAttrs {
                src: "https://vimeo.com/12345".into(),
                width: None,
                height: None,
            }),
        ]);
        let html = render(&doc);
        assert!(html.contains("aspect-ratio:560 / 315"));
        assert!(html.contains(
            r#"src="https://www.youtube-nocookie.com/embed/abc123XYZ9?rel=0&amp;modestbranding=1&amp;start=90""#
        ));
        assert_eq!(html.matches("<iframe").count(), 1);
    }

    #[test]
    fn test_unknown_nodes_render_children() {
        let doc = Document::new(vec![Node::Unknown {
            kind: "callout".into(),
            content: vec![Node::Inline(vec![Inline::text("loose")]), Node::paragraph("p")],
        }]);
        assert_eq!(render(&doc), "loose<p>p</p>");
    }

    #[test]
    fn test_class_hooks() {
        let renderer = HtmlRenderer::new(RenderOptions {
            class_hooks: true,
            lazy_media: false,
            ..Default::default()
        });
        let html = renderer.render(&Document::new(vec![Node::paragraph("x"), image("/media/a.png")]));
        assert_eq!(
            html,
            r#"<p class="richdoc-p">x</p><figure class="richdoc-image"><img src="/media/a.png" alt=""></figure>"#
        );
    }

    #[test]
    fn test_render_rich_content() {
        let raw = json!({"kind": "tiptap", "version": 1, "doc": {"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "hi"}]}
        ]}});
        assert_eq!(render_rich_content(&raw), "<p>hi</p>");
        assert_eq!(render_rich_content(&json!(12)), "<p></p>");
        assert!(!has_content(&coerce(&json!(null))));
    }
}
