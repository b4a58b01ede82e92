//! Readers for content written before the current schema: Editor.js block
//! lists and plain markdown bodies.

use lazy_static::lazy_static;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::Value;

use super::coerce::CoerceError;
use super::{normalize_marks, Document, ImageAttrs, Inline, ListItem, Mark, Node, TextRun, YoutubeAttrs};

lazy_static! {
    static ref HREF: Regex =
        Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap();
}

/// Convert an Editor.js `{ blocks: [...] }` value
pub(super) fn from_editorjs(value: &Value) -> Result<Document, CoerceError> {
    let blocks = value
        .get("blocks")
        .and_then(Value::as_array)
        .ok_or(CoerceError::Unrecognized)?;

    let content: Vec<Node> = blocks.iter().flat_map(editorjs_block).collect();
    if content.is_empty() {
        return Ok(Document::empty());
    }
    Ok(Document::new(content))
}

fn data_str<'a>(block: &'a Value, key: &str) -> Option<&'a str> {
    block.get("data")?.get(key)?.as_str()
}

fn editorjs_block(block: &Value) -> Vec<Node> {
    let kind = block.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "paragraph" => text_block(data_str(block, "text"), None),
        "header" => {
            let level = block
                .get("data")
                .and_then(|d| d.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(2)
                .clamp(1, 3) as u8;
            text_block(data_str(block, "text"), Some(level))
        }
        "list" => {
            let ordered = data_str(block, "style") == Some("ordered");
            let items = block
                .get("data")
                .and_then(|d| d.get("items"))
                .map(|items| editorjs_list_items(items, ordered))
                .unwrap_or_default();
            if items.is_empty() {
                return Vec::new();
            }
            vec![list_node(ordered, items)]
        }
        "quote" => {
            let mut content = text_block(data_str(block, "text"), None);
            content.extend(text_block(data_str(block, "caption"), None));
            if content.is_empty() {
                return Vec::new();
            }
            vec![Node::Blockquote { content }]
        }
        "image" => {
            let data = block.get("data");
            let src = data
                .and_then(|d| d.get("file"))
                .and_then(|f| f.get("url"))
                .or_else(|| data.and_then(|d| d.get("url")))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if src.is_empty() {
                return Vec::new();
            }
            let caption = data_str(block, "caption")
                .map(|c| plain_from_html(c))
                .filter(|c| !c.is_empty());
            vec![Node::Image(ImageAttrs {
                src: src.to_string(),
                alt: caption.clone(),
                title: caption,
                ..Default::default()
            })]
        }
        "embed" => {
            if data_str(block, "service") != Some("youtube") {
                return Vec::new();
            }
            let src = data_str(block, "source")
                .or_else(|| data_str(block, "embed"))
                .unwrap_or_default();
            let dimension = |key: &str| {
                block
                    .get("data")
                    .and_then(|d| d.get(key))
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| *n > 0)
            };
            vec![Node::Youtube(YoutubeAttrs {
                src: src.to_string(),
                width: dimension("width"),
                height: dimension("height"),
            })]
        }
        "delimiter" => Vec::new(),
        other => {
            tracing::debug!("Editor.js block {:?} read as text", other);
            text_block(data_str(block, "text"), None)
        }
    }
}

fn text_block(html: Option<&str>, heading: Option<u8>) -> Vec<Node> {
    let content = inline_html(html.unwrap_or_default());
    if content.is_empty() {
        return Vec::new();
    }
    let node = match heading {
        Some(level) => Node::Heading { level, content },
        None => Node::Paragraph { content },
    };
    vec![node]
}

fn list_node(ordered: bool, items: Vec<ListItem>) -> Node {
    if ordered {
        Node::OrderedList { items }
    } else {
        Node::BulletList { items }
    }
}

/// Items are either HTML strings or `{ content, items }` objects with nesting
fn editorjs_list_items(items: &Value, ordered: bool) -> Vec<ListItem> {
    let Some(items) = items.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let (text, nested) = match item {
                Value::String(s) => (s.as_str(), None),
                Value::Object(_) => (
                    item.get("content").and_then(Value::as_str).unwrap_or_default(),
                    item.get("items"),
                ),
                _ => return None,
            };
            let mut content = text_block(Some(text), None);
            if let Some(nested) = nested {
                let children = editorjs_list_items(nested, ordered);
                if !children.is_empty() {
                    content.push(list_node(ordered, children));
                }
            }
            (!content.is_empty()).then_some(ListItem { content })
        })
        .collect()
}

/// Parse the inline HTML Editor.js stores in its text fields.
/// Formatting tags become marks; every other tag is dropped with its text kept.
pub(super) fn inline_html(html: &str) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    let mut open: Vec<(String, Mark)> = Vec::new();
    let mut text = String::new();
    let mut rest = html;

    fn flush(text: &mut String, open: &[(String, Mark)], out: &mut Vec<Inline>) {
        if text.is_empty() {
            return;
        }
        let mut marks: Vec<Mark> = open.iter().map(|(_, m)| m.clone()).collect();
        normalize_marks(&mut marks);
        out.push(Inline::Text(TextRun {
            text: decode_entities(text),
            marks,
        }));
        text.clear();
    }

    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        let Some(gt) = rest[lt..].find('>') else {
            text.push_str(&rest[lt..]);
            rest = "";
            break;
        };
        let tag = rest[lt + 1..lt + gt].trim();
        rest = &rest[lt + gt + 1..];

        let closing = tag.starts_with('/');
        let body = tag.trim_start_matches('/');
        let name = body
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name == "br" {
            flush(&mut text, &open, &mut out);
            out.push(Inline::HardBreak);
            continue;
        }

        let mark = match name.as_str() {
            "b" | "strong" => Some(Mark::Bold),
            "i" | "em" => Some(Mark::Italic),
            "u" => Some(Mark::Underline),
            "code" => Some(Mark::Code),
            "a" if !closing => HREF.captures(body).map(|caps| Mark::Link {
                href: decode_entities(
                    caps.get(1)
                        .or_else(|| caps.get(2))
                        .or_else(|| caps.get(3))
                        .map(|m| m.as_str())
                        .unwrap_or_default(),
                ),
            }),
            _ => None,
        };

        if closing {
            if let Some(pos) = open.iter().rposition(|(n, _)| *n == name) {
                flush(&mut text, &open, &mut out);
                open.remove(pos);
            }
        } else if let Some(mark) = mark {
            flush(&mut text, &open, &mut out);
            open.push((name, mark));
        }
    }
    text.push_str(rest);
    flush(&mut text, &open, &mut out);
    out
}

fn plain_from_html(html: &str) -> String {
    inline_html(html)
        .iter()
        .map(|inline| match inline {
            Inline::Text(run) => run.text.as_str(),
            Inline::HardBreak => " ",
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Open containers while walking markdown events
enum Frame {
    Root(Vec<Node>),
    Quote(Vec<Node>),
    List { ordered: bool, items: Vec<ListItem> },
    Item(Vec<Node>),
    /// A paragraph or heading. `implicit` blocks were opened for text that
    /// arrived outside any paragraph, as in tight lists. Empty ones are dropped.
    Text {
        heading: Option<u8>,
        content: Vec<Inline>,
        implicit: bool,
    },
    Code(String),
    Image(ImageAttrs),
    /// Containers without a node of their own, such as HTML blocks
    Passthrough(Vec<Node>),
}

struct MarkdownBuilder {
    stack: Vec<Frame>,
    marks: Vec<Mark>,
    /// Images met inside a text block, placed after it
    pending: Vec<Node>,
}

impl MarkdownBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::Root(Vec::new())],
            marks: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn push_block(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::Root(nodes))
            | Some(Frame::Quote(nodes))
            | Some(Frame::Item(nodes))
            | Some(Frame::Passthrough(nodes)) => nodes.push(node),
            Some(Frame::List { items, .. }) => items.push(ListItem {
                content: vec![node],
            }),
            _ => self.pending.push(node),
        }
    }

    fn close_implicit(&mut self) {
        if matches!(self.stack.last(), Some(Frame::Text { implicit: true, .. })) {
            self.close();
        }
    }

    fn open(&mut self, frame: Frame) {
        self.close_implicit();
        self.stack.push(frame);
    }

    fn inline_target(&mut self) -> Option<&mut Vec<Inline>> {
        if !matches!(self.stack.last(), Some(Frame::Text { .. })) {
            self.stack.push(Frame::Text {
                heading: None,
                content: Vec::new(),
                implicit: true,
            });
        }
        match self.stack.last_mut() {
            Some(Frame::Text { content, .. }) => Some(content),
            _ => None,
        }
    }

    fn text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(Frame::Image(attrs)) => {
                attrs.alt.get_or_insert_with(String::new).push_str(text);
                return;
            }
            Some(Frame::Code(buf)) => {
                buf.push_str(text);
                return;
            }
            _ => {}
        }
        let mut marks = self.marks.clone();
        normalize_marks(&mut marks);
        self.push_inline(Inline::Text(TextRun {
            text: text.to_string(),
            marks,
        }));
    }

    fn push_inline(&mut self, inline: Inline) {
        let Some(content) = self.inline_target() else {
            return;
        };
        // Merge with the previous run when the marks match
        if let (Some(Inline::Text(prev)), Inline::Text(next)) = (content.last_mut(), &inline) {
            if prev.marks == next.marks {
                prev.text.push_str(&next.text);
                return;
            }
        }
        content.push(inline);
    }

    /// Pop the innermost frame and attach what it built to its parent
    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Root(nodes) => self.stack.push(Frame::Root(nodes)),
            Frame::Quote(content) => self.push_block(Node::Blockquote { content }),
            Frame::List { ordered, items } => self.push_block(list_node(ordered, items)),
            Frame::Item(content) => {
                if let Some(Frame::List { items, .. }) = self.stack.last_mut() {
                    items.push(ListItem { content });
                }
            }
            Frame::Text {
                heading, content, ..
            } => {
                if !content.is_empty() {
                    let node = match heading {
                        Some(level) => Node::Heading { level, content },
                        None => Node::Paragraph { content },
                    };
                    self.push_block(node);
                }
                for node in std::mem::take(&mut self.pending) {
                    self.push_block(node);
                }
            }
            Frame::Code(code) => {
                let mut content = Vec::new();
                for (i, line) in code.trim_end_matches('\n').split('\n').enumerate() {
                    if i > 0 {
                        content.push(Inline::HardBreak);
                    }
                    if !line.is_empty() {
                        content.push(Inline::Text(TextRun {
                            text: line.to_string(),
                            marks: vec![Mark::Code],
                        }));
                    }
                }
                self.push_block(Node::Paragraph { content });
            }
            Frame::Image(attrs) => {
                if !attrs.src.is_empty() {
                    self.pending.push(Node::Image(attrs));
                }
            }
            Frame::Passthrough(nodes) => {
                for node in nodes {
                    self.push_block(node);
                }
            }
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.open(Frame::Text {
                heading: None,
                content: Vec::new(),
                implicit: false,
            }),
            Tag::Heading { level, .. } => self.open(Frame::Text {
                heading: Some((level as u8).clamp(1, 3)),
                content: Vec::new(),
                implicit: false,
            }),
            Tag::BlockQuote(_) => self.open(Frame::Quote(Vec::new())),
            Tag::CodeBlock(kind) => {
                if let CodeBlockKind::Fenced(lang) = &kind {
                    tracing::trace!("Code block ({}) kept as code text", lang);
                }
                self.open(Frame::Code(String::new()))
            }
            Tag::List(start) => self.open(Frame::List {
                ordered: start.is_some(),
                items: Vec::new(),
            }),
            Tag::Item => self.open(Frame::Item(Vec::new())),
            Tag::Emphasis => self.marks.push(Mark::Italic),
            Tag::Strong => self.marks.push(Mark::Bold),
            Tag::Link { dest_url, .. } => self.marks.push(Mark::Link {
                href: dest_url.to_string(),
            }),
            Tag::Image {
                dest_url, title, ..
            } => {
                self.inline_target();
                self.stack.push(Frame::Image(ImageAttrs {
                    src: dest_url.to_string(),
                    title: (!title.is_empty()).then(|| title.to_string()),
                    ..Default::default()
                }));
            }
            Tag::Strikethrough => {}
            _ => self.open(Frame::Passthrough(Vec::new())),
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Link => {
                self.marks.pop();
            }
            TagEnd::Strikethrough => {}
            _ => {
                self.close_implicit();
                self.close();
            }
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while self.stack.len() > 1 {
            self.close();
        }
        let mut nodes = match self.stack.pop() {
            Some(Frame::Root(nodes)) => nodes,
            _ => Vec::new(),
        };
        nodes.append(&mut self.pending);
        nodes
    }
}

/// Read a plain or markdown post body
pub(super) fn from_markdown(markdown: &str) -> Document {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut builder = MarkdownBuilder::new();

    for event in parser {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(tag) => builder.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => builder.text(&text),
            Event::Code(code) => {
                let mut marks = builder.marks.clone();
                marks.push(Mark::Code);
                normalize_marks(&mut marks);
                builder.push_inline(Inline::Text(TextRun {
                    text: code.to_string(),
                    marks,
                }));
            }
            Event::SoftBreak => builder.text(" "),
            Event::HardBreak => builder.push_inline(Inline::HardBreak),
            _ => {}
        }
    }

    let content = builder.finish();
    if content.is_empty() {
        Document::empty()
    } else {
        Document::new(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_html_marks() {
        let inlines = inline_html(r#"Tour <b>this <i>home</i></b> at <a href="https://x.example/?a=1&amp;b=2">link</a><br>now"#);
        assert_eq!(
            inlines,
            vec![
                Inline::text("Tour "),
                Inline::Text(TextRun {
                    text: "this ".into(),
                    marks: vec![Mark::Bold]
                }),
                Inline::Text(TextRun {
                    text: "home".into(),
                    marks: vec![Mark::Bold, Mark::Italic]
                }),
                Inline::text(" at "),
                Inline::Text(TextRun {
                    text: "link".into(),
                    marks: vec![Mark::Link {
                        href: "https://x.example/?a=1&b=2".into()
                    }]
                }),
                Inline::HardBreak,
                Inline::text("now"),
            ]
        );
    }

    #[test]
    fn test_inline_html_drops_unknown_tags() {
        assert_eq!(
            inline_html("<span class=\"x\">a &lt;b&gt; &#169;</span> 1 < 2"),
            vec![Inline::text("a <b> \u{a9} 1 < 2")]
        );
    }

    #[test]
    fn test_editorjs_blocks() {
        let value = json!({"time": 1, "blocks": [
            {"type": "list", "data": {"style": "ordered", "items": [
                "one",
                {"content": "two", "items": [{"content": "nested", "items": []}]}
            ]}},
            {"type": "image", "data": {"file": {"url": "https://cdn.example/a.jpg"}, "caption": "<i>Porch</i>"}},
            {"type": "embed", "data": {"service": "youtube", "source": "https://youtu.be/dQw4w9WgXcQ", "width": 580, "height": 320}},
            {"type": "quote", "data": {"text": "Location", "caption": "Agent"}},
            {"type": "delimiter", "data": {}},
            {"type": "paragraph", "data": {"text": ""}}
        ]});
        let doc = from_editorjs(&value).unwrap();
        assert_eq!(doc.child_count(), 4);

        match &doc.content[0] {
            Node::OrderedList { items } => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1].content[1], Node::OrderedList { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &doc.content[1] {
            Node::Image(attrs) => {
                assert_eq!(attrs.src, "https://cdn.example/a.jpg");
                assert_eq!(attrs.title.as_deref(), Some("Porch"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &doc.content[2] {
            Node::Youtube(attrs) => {
                assert_eq!(attrs.src, "https://youtu.be/dQw4w9WgXcQ");
                assert_eq!(attrs.width, Some(580));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(doc.content[3].kind(), "blockquote");
    }

    #[test]
    fn test_editorjs_without_blocks() {
        assert_eq!(from_editorjs(&json!({})), Err(CoerceError::Unrecognized));
        assert_eq!(from_editorjs(&json!({"blocks": []})).unwrap(), Document::empty());
    }

    #[test]
    fn test_markdown_structure() {
        let md = "# Title\n\nSome **bold** and `code`.\n\n- a\n- b\n\n> quoted\n\n![Porch](https://cdn.example/p.jpg)\n\n#### deep\n";
        let doc = from_markdown(md);
        let kinds: Vec<&str> = doc.content.iter().map(Node::kind).collect();
        assert_eq!(
            kinds,
            vec!["heading", "paragraph", "bulletList", "blockquote", "image", "heading"]
        );
        assert!(matches!(doc.content[5], Node::Heading { level: 3, .. }));

        let para = doc.content[1].inline_content().unwrap();
        assert_eq!(
            para[1],
            Inline::Text(TextRun {
                text: "bold".into(),
                marks: vec![Mark::Bold]
            })
        );
        assert_eq!(
            para[3],
            Inline::Text(TextRun {
                text: "code".into(),
                marks: vec![Mark::Code]
            })
        );

        match &doc.content[2] {
            Node::BulletList { items } => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].content, vec![Node::paragraph("a")]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &doc.content[4] {
            Node::Image(attrs) => assert_eq!(attrs.alt.as_deref(), Some("Porch")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_body() {
        let doc = from_markdown("Just a note\nover two lines");
        assert_eq!(doc.content, vec![Node::paragraph("Just a note over two lines")]);
    }
}
