//! Selections and character-range mark edits inside a text block.
//!
//! Offsets count chars of text runs; a hard break occupies one position.

use crate::document::{normalize_marks, Inline, Mark, MarkType, TextRun};

/// What the editor currently has selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A range inside the text block at `path`
    Text {
        path: Vec<usize>,
        anchor: usize,
        head: usize,
    },
    /// A whole node, such as a freshly inserted image
    Node { path: Vec<usize> },
}

impl Selection {
    pub fn caret(path: Vec<usize>, offset: usize) -> Self {
        Selection::Text {
            path,
            anchor: offset,
            head: offset,
        }
    }

    pub fn path(&self) -> &[usize] {
        match self {
            Selection::Text { path, .. } | Selection::Node { path } => path,
        }
    }

    pub(crate) fn path_mut(&mut self) -> &mut Vec<usize> {
        match self {
            Selection::Text { path, .. } | Selection::Node { path } => path,
        }
    }

    /// Index of the top-level block holding the selection
    pub fn top_level(&self) -> Option<usize> {
        self.path().first().copied()
    }

    /// Ordered `(start, end)` of a text selection
    pub fn range(&self) -> Option<(usize, usize)> {
        match self {
            Selection::Text { anchor, head, .. } => Some((*anchor.min(head), *anchor.max(head))),
            Selection::Node { .. } => None,
        }
    }
}

pub(crate) fn content_len(content: &[Inline]) -> usize {
    content.iter().map(Inline::char_len).sum()
}

/// Make sure a run boundary falls exactly at `offset`
fn split_at(content: &mut Vec<Inline>, offset: usize) {
    let mut pos = 0;
    for i in 0..content.len() {
        let len = content[i].char_len();
        if offset > pos && offset < pos + len {
            if let Inline::Text(run) = &mut content[i] {
                let byte = run
                    .text
                    .char_indices()
                    .nth(offset - pos)
                    .map(|(b, _)| b)
                    .unwrap_or(run.text.len());
                let tail = run.text.split_off(byte);
                let marks = run.marks.clone();
                content.insert(i + 1, Inline::Text(TextRun { text: tail, marks }));
            }
            return;
        }
        pos += len;
        if pos >= offset {
            return;
        }
    }
}

/// Join neighbouring runs that carry the same marks
fn merge_runs(content: &mut Vec<Inline>) {
    let mut merged: Vec<Inline> = Vec::with_capacity(content.len());
    for inline in content.drain(..) {
        match (merged.last_mut(), inline) {
            (Some(Inline::Text(prev)), Inline::Text(next)) if prev.marks == next.marks => {
                prev.text.push_str(&next.text)
            }
            (_, Inline::Text(run)) if run.text.is_empty() => {}
            (_, inline) => merged.push(inline),
        }
    }
    *content = merged;
}

/// Text runs fully inside `start..end`, after splitting at both ends
fn runs_in_range(
    content: &mut Vec<Inline>,
    start: usize,
    end: usize,
) -> impl Iterator<Item = &mut TextRun> {
    split_at(content, start);
    split_at(content, end);
    let mut pos = 0;
    content.iter_mut().filter_map(move |inline| {
        let from = pos;
        pos += inline.char_len();
        match inline {
            Inline::Text(run) if from >= start && pos <= end => Some(run),
            _ => None,
        }
    })
}

/// Whether every text char in `start..end` carries the mark type.
/// A range without text never counts as marked.
pub(crate) fn range_has_mark(content: &[Inline], start: usize, end: usize, mark: MarkType) -> bool {
    let mut pos = 0;
    let mut seen_text = false;
    for inline in content {
        let from = pos;
        pos += inline.char_len();
        if pos <= start || from >= end {
            continue;
        }
        if let Inline::Text(run) = inline {
            if !run.has_mark(mark) {
                return false;
            }
            seen_text = true;
        }
    }
    seen_text
}

/// Rewrite the marks of every run in `start..end`, keeping them in canonical
/// order and merging runs that end up identical
pub(crate) fn update_marks(
    content: &mut Vec<Inline>,
    start: usize,
    end: usize,
    mut f: impl FnMut(&mut Vec<Mark>),
) {
    if start >= end {
        return;
    }
    for run in runs_in_range(content, start, end) {
        f(&mut run.marks);
        normalize_marks(&mut run.marks);
    }
    merge_runs(content);
}

/// The extent of the contiguous stretch carrying `mark` around a caret.
/// A caret at the end of a marked stretch still counts as inside it.
pub(crate) fn mark_range_at(content: &[Inline], offset: usize, mark: MarkType) -> Option<(usize, usize)> {
    let mut spans: Vec<(usize, usize, bool)> = Vec::with_capacity(content.len());
    let mut pos = 0;
    for inline in content {
        let len = inline.char_len();
        let marked = matches!(inline, Inline::Text(run) if run.has_mark(mark));
        spans.push((pos, pos + len, marked));
        pos += len;
    }

    let hit = spans
        .iter()
        .position(|&(from, to, marked)| marked && from <= offset && offset < to)
        .or_else(|| spans.iter().position(|&(_, to, marked)| marked && to == offset))?;

    let mut first = hit;
    while first > 0 && spans[first - 1].2 {
        first -= 1;
    }
    let mut last = hit;
    while last + 1 < spans.len() && spans[last + 1].2 {
        last += 1;
    }
    Some((spans[first].0, spans[last].1))
}
