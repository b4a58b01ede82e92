//! # The document model
//!
//! A post body is a tree of typed nodes. The JSON shape follows the editor's
//! node serialization: every node carries a `type`, block children live in
//! `content`, attributes in `attrs`, and text runs carry their `marks`.

pub mod coerce;
mod de;
mod legacy;
pub mod sanitize;

pub use coerce::{coerce, try_coerce, CoerceError, RichContent};
pub use sanitize::{Float, SizeValue};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Heading levels the editor offers
pub const HEADING_LEVELS: [u8; 3] = [1, 2, 3];

/// The root of one post body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: Vec<Node>,
}

/// A block-level node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Paragraph { content: Vec<Inline> },
    Heading { level: u8, content: Vec<Inline> },
    BulletList { items: Vec<ListItem> },
    OrderedList { items: Vec<ListItem> },
    Blockquote { content: Vec<Node> },
    HardBreak,
    Image(ImageAttrs),
    Video(VideoAttrs),
    Youtube(YoutubeAttrs),
    /// A node kind this schema does not know; only its children are kept
    Unknown { kind: String, content: Vec<Node> },
    /// Text found directly under an unknown block
    Inline(Vec<Inline>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListItem {
    pub content: Vec<Node>,
}

/// Inline content of a text block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(TextRun),
    HardBreak,
}

/// A run of text sharing one set of marks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub marks: Vec<Mark>,
}

/// A character-level annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Link { href: String },
}

/// The mark kinds without their attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkType {
    Bold,
    Italic,
    Underline,
    Code,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageAttrs {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<SizeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float: Option<Float>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoAttrs {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YoutubeAttrs {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Mark {
    pub fn mark_type(&self) -> MarkType {
        match self {
            Mark::Bold => MarkType::Bold,
            Mark::Italic => MarkType::Italic,
            Mark::Underline => MarkType::Underline,
            Mark::Code => MarkType::Code,
            Mark::Link { .. } => MarkType::Link,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Mark::Bold => json!({ "type": "bold" }),
            Mark::Italic => json!({ "type": "italic" }),
            Mark::Underline => json!({ "type": "underline" }),
            Mark::Code => json!({ "type": "code" }),
            Mark::Link { href } => json!({ "type": "link", "attrs": { "href": href } }),
        }
    }
}

/// Put marks in the order the editor applies them and drop repeated kinds.
/// The first mark is the outermost wrapper when rendered.
pub fn normalize_marks(marks: &mut Vec<Mark>) {
    marks.sort_by_key(Mark::mark_type);
    marks.dedup_by_key(|m| m.mark_type());
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn has_mark(&self, mark_type: MarkType) -> bool {
        self.marks.iter().any(|m| m.mark_type() == mark_type)
    }
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text(TextRun::plain(text))
    }

    /// Length in chars; a hard break counts as one position
    pub fn char_len(&self) -> usize {
        match self {
            Inline::Text(run) => run.text.chars().count(),
            Inline::HardBreak => 1,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Inline::HardBreak => json!({ "type": "hardBreak" }),
            Inline::Text(run) => {
                let mut obj = Map::new();
                obj.insert("type".into(), "text".into());
                obj.insert("text".into(), run.text.clone().into());
                if !run.marks.is_empty() {
                    obj.insert(
                        "marks".into(),
                        run.marks.iter().map(Mark::to_value).collect(),
                    );
                }
                Value::Object(obj)
            }
        }
    }
}

impl Node {
    pub fn paragraph(text: &str) -> Self {
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![Inline::text(text)]
        };
        Node::Paragraph { content }
    }

    pub fn empty_paragraph() -> Self {
        Node::Paragraph {
            content: Vec::new(),
        }
    }

    /// The `type` discriminator used in the JSON form
    pub fn kind(&self) -> &str {
        match self {
            Node::Paragraph { .. } => "paragraph",
            Node::Heading { .. } => "heading",
            Node::BulletList { .. } => "bulletList",
            Node::OrderedList { .. } => "orderedList",
            Node::Blockquote { .. } => "blockquote",
            Node::HardBreak => "hardBreak",
            Node::Image(_) => "image",
            Node::Video(_) => "video",
            Node::Youtube(_) => "youtube",
            Node::Unknown { kind, .. } => kind,
            Node::Inline(_) => "text",
        }
    }

    /// Inline content of a paragraph or heading
    pub fn inline_content(&self) -> Option<&Vec<Inline>> {
        match self {
            Node::Paragraph { content } | Node::Heading { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn inline_content_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Node::Paragraph { content } | Node::Heading { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Whether this is a paragraph without any content
    pub fn is_empty_paragraph(&self) -> bool {
        matches!(self, Node::Paragraph { content } if content.is_empty())
    }

    /// Collect the plain text of this node and its descendants
    pub fn plain_text(&self, out: &mut String) {
        fn push_inlines(content: &[Inline], out: &mut String) {
            for inline in content {
                match inline {
                    Inline::Text(run) => out.push_str(&run.text),
                    Inline::HardBreak => out.push('\n'),
                }
            }
        }
        match self {
            Node::Paragraph { content } | Node::Heading { content, .. } => {
                push_inlines(content, out);
                out.push('\n');
            }
            Node::Inline(content) => push_inlines(content, out),
            Node::BulletList { items } | Node::OrderedList { items } => {
                for item in items {
                    for node in &item.content {
                        node.plain_text(out);
                    }
                }
            }
            Node::Blockquote { content } | Node::Unknown { content, .. } => {
                for node in content {
                    node.plain_text(out);
                }
            }
            Node::HardBreak => out.push('\n'),
            Node::Image(_) | Node::Video(_) | Node::Youtube(_) => {}
        }
    }

    pub fn to_value(&self) -> Value {
        fn with_content(kind: &str, content: Vec<Value>) -> Value {
            let mut obj = Map::new();
            obj.insert("type".into(), kind.into());
            if !content.is_empty() {
                obj.insert("content".into(), Value::Array(content));
            }
            Value::Object(obj)
        }
        fn items_to_values(items: &[ListItem]) -> Vec<Value> {
            items
                .iter()
                .map(|item| with_content("listItem", children_values(&item.content)))
                .collect()
        }

        match self {
            Node::Paragraph { content } => {
                with_content("paragraph", content.iter().map(Inline::to_value).collect())
            }
            Node::Heading { level, content } => {
                let mut value =
                    with_content("heading", content.iter().map(Inline::to_value).collect());
                value["attrs"] = json!({ "level": level });
                value
            }
            Node::BulletList { items } => with_content("bulletList", items_to_values(items)),
            Node::OrderedList { items } => with_content("orderedList", items_to_values(items)),
            Node::Blockquote { content } => with_content("blockquote", children_values(content)),
            Node::HardBreak => json!({ "type": "hardBreak" }),
            Node::Image(attrs) => json!({ "type": "image", "attrs": attrs }),
            Node::Video(attrs) => json!({ "type": "video", "attrs": attrs }),
            Node::Youtube(attrs) => json!({ "type": "youtube", "attrs": attrs }),
            Node::Unknown { kind, content } => with_content(kind, children_values(content)),
            // Loose text has no node of its own; `children_values` splices it
            // into the parent's content
            Node::Inline(content) => Value::Array(content.iter().map(Inline::to_value).collect()),
        }
    }
}

/// JSON values for a list of block children
fn children_values(nodes: &[Node]) -> Vec<Value> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Inline(content) => out.extend(content.iter().map(Inline::to_value)),
            other => out.push(other.to_value()),
        }
    }
    out
}

impl Document {
    pub fn new(content: Vec<Node>) -> Self {
        Self { content }
    }

    /// The document a new post starts with: one empty paragraph
    pub fn empty() -> Self {
        Self {
            content: vec![Node::empty_paragraph()],
        }
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    /// Whether there is anything worth displaying
    pub fn has_content(&self) -> bool {
        self.content.iter().any(|node| !node.is_empty_paragraph())
    }

    /// Look up a node by its child-index path.
    ///
    /// Inside lists a path step first selects the item, then the node within
    /// the item, so `[0, 1, 0]` is the first node of the second item of the
    /// first list.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.content.get(*first)?;
        let mut rest = rest;
        while let Some((step, tail)) = rest.split_first() {
            node = match node {
                Node::BulletList { items } | Node::OrderedList { items } => {
                    let (inner, tail2) = tail.split_first()?;
                    rest = tail2;
                    items.get(*step)?.content.get(*inner)?
                }
                Node::Blockquote { content } | Node::Unknown { content, .. } => {
                    rest = tail;
                    content.get(*step)?
                }
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.content.get_mut(*first)?;
        let mut rest = rest;
        while let Some((step, tail)) = rest.split_first() {
            node = match node {
                Node::BulletList { items } | Node::OrderedList { items } => {
                    let (inner, tail2) = tail.split_first()?;
                    rest = tail2;
                    items.get_mut(*step)?.content.get_mut(*inner)?
                }
                Node::Blockquote { content } | Node::Unknown { content, .. } => {
                    rest = tail;
                    content.get_mut(*step)?
                }
                _ => return None,
            };
        }
        Some(node)
    }

    /// Paths of every image node, in document order
    pub fn image_paths(&self) -> Vec<Vec<usize>> {
        fn walk(nodes: &[Node], prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            for (i, node) in nodes.iter().enumerate() {
                prefix.push(i);
                match node {
                    Node::Image(_) => out.push(prefix.clone()),
                    Node::BulletList { items } | Node::OrderedList { items } => {
                        for (j, item) in items.iter().enumerate() {
                            prefix.push(j);
                            walk(&item.content, prefix, out);
                            prefix.pop();
                        }
                    }
                    Node::Blockquote { content } | Node::Unknown { content, .. } => {
                        walk(content, prefix, out)
                    }
                    _ => {}
                }
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        walk(&self.content, &mut Vec::new(), &mut out);
        out
    }

    /// All text of the document, one line per text block
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.content {
            node.plain_text(&mut out);
        }
        out
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": "doc",
            "content": children_values(&self.content),
        })
    }

    /// Read a document from its JSON form, tolerating unknown nodes and
    /// invalid attributes. Fails only when the value is not a doc node.
    pub fn from_value(value: &Value) -> Result<Self, coerce::CoerceError> {
        de::document_from_value(value)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(vec![
            Node::Heading {
                level: 2,
                content: vec![Inline::text("Chaska")],
            },
            Node::BulletList {
                items: vec![
                    ListItem {
                        content: vec![Node::paragraph("one")],
                    },
                    ListItem {
                        content: vec![
                            Node::paragraph("two"),
                            Node::Image(ImageAttrs {
                                src: "https://cdn.example/a.png".into(),
                                ..Default::default()
                            }),
                        ],
                    },
                ],
            },
        ])
    }

    #[test]
    fn test_serialize_shape() {
        let value = sample().to_value();
        assert_eq!(value["type"], "doc");
        assert_eq!(value["content"][0]["type"], "heading");
        assert_eq!(value["content"][0]["attrs"]["level"], 2);
        assert_eq!(value["content"][1]["content"][1]["type"], "listItem");
        assert_eq!(
            value["content"][1]["content"][1]["content"][1]["attrs"]["src"],
            "https://cdn.example/a.png"
        );
    }

    #[test]
    fn test_empty_paragraph_omits_content() {
        let value = Document::empty().to_value();
        assert_eq!(value, json!({"type": "doc", "content": [{"type": "paragraph"}]}));
        assert!(!Document::empty().has_content());
    }

    #[test]
    fn test_node_paths() {
        let doc = sample();
        assert_eq!(doc.node_at(&[0]).map(Node::kind), Some("heading"));
        assert_eq!(doc.node_at(&[1, 1, 1]).map(Node::kind), Some("image"));
        assert_eq!(doc.node_at(&[1, 1]), None);
        assert_eq!(doc.image_paths(), vec![vec![1, 1, 1]]);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(sample().plain_text(), "Chaska\none\ntwo\n");
    }
}
