//! Tolerant reading of the JSON document form.
//!
//! Stored posts may predate the current schema, so nothing here trusts the
//! input: unknown nodes keep only their children, unknown marks are dropped
//! and attributes go through the same sanitizers the editor uses.

use serde_json::Value;

use super::coerce::CoerceError;
use super::sanitize::{sanitize_float, sanitize_size};
use super::{Document, ImageAttrs, Inline, ListItem, Mark, Node, TextRun, VideoAttrs, YoutubeAttrs};

pub(super) fn document_from_value(value: &Value) -> Result<Document, CoerceError> {
    let obj = value.as_object().ok_or(CoerceError::NotAnObject)?;
    match obj.get("type").and_then(Value::as_str) {
        Some("doc") => {}
        Some(other) => return Err(CoerceError::NotADocument(other.to_string())),
        None => return Err(CoerceError::MissingType),
    }

    let content = blocks_from(obj.get("content"));
    if content.is_empty() {
        Ok(Document::empty())
    } else {
        Ok(Document::new(content))
    }
}

fn str_attr<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get("attrs")?.get(key)?.as_str()
}

fn opt_string_attr(value: &Value, key: &str) -> Option<String> {
    str_attr(value, key)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A positive integer attribute, given either as a number or a numeric string
fn dimension_attr(value: &Value, key: &str) -> Option<u32> {
    let raw = value.get("attrs")?.get(key)?;
    let n = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 1.0 && n <= u32::MAX as f64).then(|| n.round() as u32)
}

fn heading_level(value: &Value) -> u8 {
    match dimension_attr(value, "level") {
        Some(level @ 1..=3) => level as u8,
        _ => 2,
    }
}

fn is_inline_kind(kind: &str) -> bool {
    matches!(kind, "text" | "hardBreak")
}

/// Block children. Consecutive inline children are kept together as one
/// [`Node::Inline`] fragment.
pub(super) fn blocks_from(content: Option<&Value>) -> Vec<Node> {
    let Some(items) = content.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    let mut loose: Vec<Inline> = Vec::new();

    for child in items {
        let kind = child.get("type").and_then(Value::as_str).unwrap_or_default();
        if is_inline_kind(kind) {
            loose.extend(inline_from(child));
            continue;
        }
        if !loose.is_empty() {
            out.push(Node::Inline(std::mem::take(&mut loose)));
        }
        if let Some(node) = node_from_value(child) {
            out.push(node);
        }
    }
    if !loose.is_empty() {
        out.push(Node::Inline(loose));
    }
    out
}

fn list_items_from(content: Option<&Value>) -> Vec<ListItem> {
    let Some(items) = content.and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| match item.get("type").and_then(Value::as_str) {
            Some("listItem") => ListItem {
                content: blocks_from(item.get("content")),
            },
            // A list child that is not an item becomes an item of its own
            _ => ListItem {
                content: blocks_from(Some(&Value::Array(vec![item.clone()]))),
            },
        })
        .collect()
}

fn node_from_value(value: &Value) -> Option<Node> {
    let kind = value.get("type")?.as_str()?;
    let content = value.get("content");

    let node = match kind {
        "paragraph" => Node::Paragraph {
            content: inlines_from(content),
        },
        "heading" => Node::Heading {
            level: heading_level(value),
            content: inlines_from(content),
        },
        "bulletList" => Node::BulletList {
            items: list_items_from(content),
        },
        "orderedList" => Node::OrderedList {
            items: list_items_from(content),
        },
        "blockquote" => Node::Blockquote {
            content: blocks_from(content),
        },
        "hardBreak" => Node::HardBreak,
        "image" => Node::Image(ImageAttrs {
            src: str_attr(value, "src").unwrap_or_default().to_string(),
            alt: opt_string_attr(value, "alt"),
            title: opt_string_attr(value, "title"),
            width: str_attr(value, "width").and_then(sanitize_size),
            float: str_attr(value, "float").and_then(sanitize_float),
        }),
        "video" => Node::Video(VideoAttrs {
            src: str_attr(value, "src").unwrap_or_default().to_string(),
            title: opt_string_attr(value, "title"),
        }),
        "youtube" | "youtubeEmbed" => Node::Youtube(YoutubeAttrs {
            src: str_attr(value, "src").unwrap_or_default().to_string(),
            width: dimension_attr(value, "width"),
            height: dimension_attr(value, "height"),
        }),
        other => {
            tracing::debug!("Keeping children of unknown node type {:?}", other);
            Node::Unknown {
                kind: other.to_string(),
                content: blocks_from(content),
            }
        }
    };
    Some(node)
}

fn inlines_from(content: Option<&Value>) -> Vec<Inline> {
    content
        .and_then(Value::as_array)
        .map(|items| items.iter().flat_map(inline_from).collect())
        .unwrap_or_default()
}

/// Inline content of one child. Anything that is not text or a break
/// contributes the inline content of its descendants.
fn inline_from(value: &Value) -> Vec<Inline> {
    match value.get("type").and_then(Value::as_str) {
        Some("text") => {
            let text = value.get("text").and_then(Value::as_str).unwrap_or_default();
            if text.is_empty() {
                return Vec::new();
            }
            vec![Inline::Text(TextRun {
                text: text.to_string(),
                marks: marks_from(value.get("marks")),
            })]
        }
        Some("hardBreak") => vec![Inline::HardBreak],
        Some(_) => inlines_from(value.get("content")),
        None => Vec::new(),
    }
}

fn marks_from(marks: Option<&Value>) -> Vec<Mark> {
    let Some(marks) = marks.and_then(Value::as_array) else {
        return Vec::new();
    };

    marks
        .iter()
        .filter_map(|mark| {
            let mark = match mark.get("type")?.as_str()? {
                "bold" => Mark::Bold,
                "italic" => Mark::Italic,
                "underline" => Mark::Underline,
                "code" => Mark::Code,
                "link" => Mark::Link {
                    href: str_attr(mark, "href").unwrap_or_default().to_string(),
                },
                _ => return None,
            };
            Some(mark)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::{Float, MarkType};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_editor_output() {
        let value = json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 3}, "content": [{"type": "text", "text": "Hi"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "bold", "marks": [{"type": "bold"}, {"type": "strike"}]},
                    {"type": "hardBreak"},
                    {"type": "text", "text": "link", "marks": [{"type": "link", "attrs": {"href": "https://x.example"}}]}
                ]},
                {"type": "image", "attrs": {"src": "https://cdn/a.png", "width": "calc(1px)", "float": "right", "alt": null}},
                {"type": "youtube", "attrs": {"src": "https://www.youtube-nocookie.com/embed/abcdEF12", "width": "640", "height": 0}}
            ]
        });
        let doc = document_from_value(&value).unwrap();
        assert_eq!(doc.child_count(), 4);
        assert!(matches!(doc.content[0], Node::Heading { level: 3, .. }));

        let inlines = doc.content[1].inline_content().unwrap();
        assert_eq!(inlines.len(), 3);
        match &inlines[0] {
            Inline::Text(run) => {
                assert_eq!(run.marks, vec![Mark::Bold]);
                assert!(run.has_mark(MarkType::Bold));
            }
            other => panic!("unexpected {:?}", other),
        }

        match &doc.content[2] {
            Node::Image(attrs) => {
                assert_eq!(attrs.width, None);
                assert_eq!(attrs.float, Some(Float::Right));
                assert_eq!(attrs.alt, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &doc.content[3] {
            Node::Youtube(attrs) => {
                assert_eq!(attrs.width, Some(640));
                assert_eq!(attrs.height, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_nodes_keep_children() {
        let value = json!({
            "type": "doc",
            "content": [
                {"type": "callout", "content": [
                    {"type": "text", "text": "note"},
                    {"type": "paragraph", "content": [{"type": "text", "text": "inside"}]}
                ]},
                {"type": "paragraph", "content": [
                    {"type": "mention", "content": [{"type": "text", "text": "@agent"}]}
                ]},
                "garbage",
                {"no_type": true}
            ]
        });
        let doc = document_from_value(&value).unwrap();
        assert_eq!(doc.child_count(), 2);
        match &doc.content[0] {
            Node::Unknown { kind, content } => {
                assert_eq!(kind, "callout");
                assert_eq!(content[0], Node::Inline(vec![Inline::text("note")]));
                assert_eq!(content[1], Node::paragraph("inside"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(doc.content[1], Node::paragraph("@agent"));
    }

    #[test]
    fn test_heading_level_defaults() {
        let value = json!({"type": "doc", "content": [
            {"type": "heading", "attrs": {"level": 6}},
            {"type": "heading"}
        ]});
        let doc = document_from_value(&value).unwrap();
        assert!(matches!(doc.content[0], Node::Heading { level: 2, .. }));
        assert!(matches!(doc.content[1], Node::Heading { level: 2, .. }));
    }

    #[test]
    fn test_rejects_non_documents() {
        assert!(document_from_value(&json!([])).is_err());
        assert!(document_from_value(&json!({"type": "paragraph"})).is_err());
        assert!(document_from_value(&json!({"content": []})).is_err());
        assert_eq!(document_from_value(&json!({"type": "doc"})).unwrap(), Document::empty());
    }

    #[test]
    fn test_round_trip_through_serializer() {
        let value = json!({"type": "doc", "content": [
            {"type": "callout", "content": [{"type": "text", "text": "note"}]},
            {"type": "bulletList", "content": [
                {"type": "listItem", "content": [{"type": "paragraph", "content": [{"type": "text", "text": "a"}]}]}
            ]}
        ]});
        let doc = document_from_value(&value).unwrap();
        assert_eq!(doc.to_value(), value);
    }
}
