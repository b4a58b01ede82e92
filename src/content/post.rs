//! Post records

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{coerce, Document, RichContent};

/// Longest slug used as the base of a post id
const MAX_SLUG_LEN: usize = 60;

/// Date format posts are stamped with, e.g. `Jan 5, 2025`
pub const DATE_FORMAT: &str = "%b %-d, %Y";

/// Kind of post, which decides how it is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    Article,
    Video,
    Gallery,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Article => "article",
            PostKind::Video => "video",
            PostKind::Gallery => "gallery",
        }
    }
}

impl std::str::FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(PostKind::Article),
            "video" => Ok(PostKind::Video),
            "gallery" => Ok(PostKind::Gallery),
            other => Err(format!("unknown post type: {}", other)),
        }
    }
}

/// A blog post as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: PostKind,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub read_time: String,
    #[serde(default = "default_published")]
    pub published: bool,
    /// Raw stored body; may predate the current schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

fn default_published() -> bool {
    true
}

/// Fields an author provides for a new post
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPost {
    pub title: String,
    pub excerpt: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: PostKind,
    pub image: Option<String>,
    pub content: Option<Document>,
}

impl Post {
    /// The body as a document, whatever shape it was stored in
    pub fn document(&self) -> Document {
        match &self.content {
            Some(raw) => coerce(raw),
            None => Document::empty(),
        }
    }

    /// Replace the body with the current envelope and refresh the read time
    pub fn set_document(&mut self, doc: Document, words_per_minute: usize) {
        self.read_time = read_time_for(self.kind, &doc, &self.excerpt, words_per_minute);
        self.content = Some(RichContent::new(doc).to_value());
    }

    /// The date parsed back from its display form
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%b %d, %Y").ok()
    }
}

/// Slug of a title, cut to a sensible id length
pub fn slug_base(title: &str) -> String {
    let slug = slug::slugify(title);
    let cut: String = slug.chars().take(MAX_SLUG_LEN).collect();
    let cut = cut.trim_matches('-');
    if cut.is_empty() {
        "post".to_string()
    } else {
        cut.to_string()
    }
}

/// First of `base`, `base-1`, `base-2`... not already taken
pub fn unique_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}-{}", base, i))
        .find(|id| !taken(id))
        .unwrap_or_else(|| base.to_string())
}

/// Whether an id is safe to use as a file name
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// `"N min read"` with N the word count over `words_per_minute`, at least 1
pub fn compute_read_time(text: &str, words_per_minute: usize) -> String {
    let words = text.split_whitespace().count();
    let wpm = words_per_minute.max(1);
    let minutes = words.div_ceil(wpm).max(1);
    format!("{} min read", minutes)
}

/// Read time label of a post body. Video posts use a fixed watch time and
/// empty bodies fall back to the excerpt.
pub fn read_time_for(kind: PostKind, doc: &Document, excerpt: &str, words_per_minute: usize) -> String {
    if kind == PostKind::Video {
        return "5 min watch".to_string();
    }
    let body = doc.plain_text();
    let text = if body.trim().is_empty() { excerpt } else { body.as_str() };
    compute_read_time(text, words_per_minute)
}

/// Format a timestamp the way post dates are displayed
pub fn format_date(date: &DateTime<Local>) -> String {
    date.format(DATE_FORMAT).to_string()
}
