//! Persisted content envelope and coercion of stored post bodies.
//!
//! Storage is never assumed to hold current-schema data. Whatever comes back
//! goes through [`coerce`], which understands the current envelope, bare
//! document trees, Editor.js block lists, JSON-in-a-string and plain
//! markdown, and otherwise falls back to an empty document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{legacy, Document};

/// Schema version written by this crate
pub const CONTENT_VERSION: u32 = 1;

/// Why a stored value could not be read as a document
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoerceError {
    #[error("content is empty")]
    Empty,
    #[error("expected an object")]
    NotAnObject,
    #[error("node has no type")]
    MissingType,
    #[error("expected a doc node, found {0:?}")]
    NotADocument(String),
    #[error("unknown content kind {0:?}")]
    UnknownKind(String),
    #[error("envelope of kind {0:?} has no document")]
    MissingDoc(String),
    #[error("unrecognized content shape")]
    Unrecognized,
}

/// Discriminator of the persisted envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Tiptap,
}

/// The value stored in a post's `content` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichContent {
    pub kind: ContentKind,
    pub version: u32,
    pub doc: Document,
}

impl RichContent {
    pub fn new(doc: Document) -> Self {
        Self {
            kind: ContentKind::Tiptap,
            version: CONTENT_VERSION,
            doc,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "kind": "tiptap",
            "version": self.version,
            "doc": self.doc.to_value(),
        })
    }
}

impl From<Document> for RichContent {
    fn from(doc: Document) -> Self {
        Self::new(doc)
    }
}

/// Read any stored content value as a document.
///
/// Never fails: content that cannot be understood is logged and replaced by
/// the empty single-paragraph document.
pub fn coerce(raw: &Value) -> Document {
    match try_coerce(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("SchemaCoercionFailure ({}), using an empty document", e);
            Document::empty()
        }
    }
}

/// Like [`coerce`], but reports why coercion failed
pub fn try_coerce(raw: &Value) -> Result<Document, CoerceError> {
    match raw {
        Value::Null => Err(CoerceError::Empty),
        Value::String(s) => coerce_str(s),
        Value::Object(obj) => {
            if let Some(kind) = obj.get("kind").and_then(Value::as_str) {
                let doc = obj
                    .get("doc")
                    .ok_or_else(|| CoerceError::MissingDoc(kind.to_string()))?;
                return match kind {
                    "tiptap" => {
                        let version = obj.get("version").and_then(Value::as_u64);
                        if version != Some(CONTENT_VERSION as u64) {
                            tracing::debug!("Reading tiptap content with version {:?}", version);
                        }
                        Document::from_value(doc)
                    }
                    "editorjs" => legacy::from_editorjs(doc),
                    other => Err(CoerceError::UnknownKind(other.to_string())),
                };
            }
            if obj.get("type").is_some() {
                return Document::from_value(raw);
            }
            if obj.get("blocks").is_some() {
                return legacy::from_editorjs(raw);
            }
            Err(CoerceError::Unrecognized)
        }
        _ => Err(CoerceError::Unrecognized),
    }
}

fn coerce_str(raw: &str) -> Result<Document, CoerceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoerceError::Empty);
    }
    if trimmed.starts_with('{') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
            return try_coerce(&value);
        }
    }
    Ok(legacy::from_markdown(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Inline, Mark, Node, TextRun};
    use serde_json::json;

    fn hello_doc() -> Value {
        json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "hello"}]}
        ]})
    }

    #[test]
    fn test_envelope_round_trip() {
        let content = RichContent::new(Document::new(vec![Node::paragraph("hello")]));
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["kind"], "tiptap");
        assert_eq!(value["version"], 1);
        assert_eq!(value["doc"], hello_doc());

        let back: RichContent = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back, content);
        assert_eq!(coerce(&value), content.doc);
    }

    #[test]
    fn test_bare_doc_and_json_string() {
        let expected = Document::new(vec![Node::paragraph("hello")]);
        assert_eq!(coerce(&hello_doc()), expected);

        let envelope = json!({"kind": "tiptap", "version": 1, "doc": hello_doc()});
        let as_string = Value::String(envelope.to_string());
        assert_eq!(coerce(&as_string), expected);
    }

    #[test]
    fn test_editorjs_envelope() {
        let value = json!({"kind": "editorjs", "doc": {"blocks": [
            {"type": "header", "data": {"text": "Title", "level": 5}},
            {"type": "paragraph", "data": {"text": "<b>Big</b> deal"}}
        ]}});
        let doc = coerce(&value);
        assert_eq!(doc.child_count(), 2);
        assert!(matches!(doc.content[0], Node::Heading { level: 3, .. }));
        assert_eq!(
            doc.content[1].inline_content().unwrap()[0],
            Inline::Text(TextRun {
                text: "Big".into(),
                marks: vec![Mark::Bold]
            })
        );
    }

    #[test]
    fn test_markdown_string() {
        let doc = coerce(&Value::String("## Selling\n\nStage the *kitchen*.".into()));
        assert!(matches!(doc.content[0], Node::Heading { level: 2, .. }));
        assert_eq!(doc.plain_text(), "Selling\nStage the kitchen.\n");
    }

    #[test]
    fn test_malformed_values_fall_back_to_empty() {
        for value in [
            Value::Null,
            json!(42),
            json!(true),
            json!([1, 2, 3]),
            json!({"foo": "bar"}),
            json!({"kind": "tiptap"}),
            json!({"kind": "quill", "doc": {}}),
            json!({"kind": "tiptap", "version": 1, "doc": "nope"}),
            json!({"type": "paragraph"}),
            Value::String("   ".into()),
        ] {
            assert_eq!(coerce(&value), Document::empty(), "{}", value);
        }
    }

    #[test]
    fn test_try_coerce_reports_reason() {
        assert_eq!(try_coerce(&Value::Null), Err(CoerceError::Empty));
        assert_eq!(
            try_coerce(&json!({"kind": "quill", "doc": {}})),
            Err(CoerceError::UnknownKind("quill".into()))
        );
    }
}
