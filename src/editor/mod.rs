//! # The editing surface
//!
//! [`Editor`] owns one document and applies commands to it. Every change is
//! announced on a broadcast channel, refused commands leave the document as
//! it was and announce an [`EditorEvent::Error`]. Image nodes get a mounted
//! [`ViewHandle`] each; pointer input fed through [`Editor::dispatch_pointer`]
//! reaches those views, and the attribute patches they ask for are applied
//! to the document. Media uploads queue up and run one at a time.

mod node_view;
mod selection;
mod upload;

pub use node_view::{
    resize_width, ImageNodeView, ImagePatch, ListenerId, NodeView, PatchCallback, PointerEvent,
    PointerHub, ViewHandle,
};
pub use selection::Selection;
pub use upload::{
    object_path, store_media, unique_filename, MediaFile, MediaKind, UploadPipeline, UploadStatus,
};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::{EditorConfig, SiteConfig};
use crate::document::{
    Document, Float, ImageAttrs, Inline, ListItem, ListKind, Mark, MarkType, Node, SizeValue,
    VideoAttrs, YoutubeAttrs,
};
use crate::error::EditorError;
use crate::helpers::normalize_youtube_url;
use crate::storage::BlobStore;
use selection::{content_len, mark_range_at, range_has_mark, update_marks};
use upload::QueuedUpload;

const EVENT_CAPACITY: usize = 64;

/// What observers of an editor are told
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// The document changed; carries the new state
    Changed(Document),
    Upload(UploadStatus),
    Error(EditorError),
}

type PatchQueue = Rc<RefCell<VecDeque<(Vec<usize>, ImagePatch)>>>;

pub struct Editor {
    doc: Document,
    selection: Option<Selection>,
    config: EditorConfig,
    events: broadcast::Sender<EditorEvent>,
    hub: PointerHub,
    image_view: ImageNodeView,
    views: Vec<(Vec<usize>, ViewHandle)>,
    patches: PatchQueue,
    uploads: UploadPipeline,
}

impl Editor {
    pub fn new(doc: Document, config: &SiteConfig, store: Arc<dyn BlobStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let hub = PointerHub::new();
        let image_view = ImageNodeView::new(hub.clone(), config.editor.min_image_px);
        let mut editor = Self {
            doc: non_empty(doc),
            selection: None,
            config: config.editor.clone(),
            events,
            hub,
            image_view,
            views: Vec::new(),
            patches: Rc::new(RefCell::new(VecDeque::new())),
            uploads: UploadPipeline::new(store, config.media.clone()),
        };
        editor.mount_views();
        editor
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(mut self) -> Document {
        std::mem::take(&mut self.doc)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    pub fn select_text(&mut self, path: Vec<usize>, anchor: usize, head: usize) {
        self.selection = Some(Selection::Text { path, anchor, head });
    }

    pub fn select_node(&mut self, path: Vec<usize>) {
        self.selection = Some(Selection::Node { path });
    }

    /// Hub the host feeds with window-level pointer input
    pub fn pointer_hub(&self) -> &PointerHub {
        &self.hub
    }

    /// The mounted view of the image at `path`
    pub fn image_view(&self, path: &[usize]) -> Option<&ViewHandle> {
        self.views
            .iter()
            .find(|(p, _)| p.as_slice() == path)
            .map(|(_, view)| view)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploads.is_uploading()
    }

    /// Replace the whole document, as when a stored post is opened
    pub fn set_content(&mut self, doc: Document) {
        self.doc = non_empty(doc);
        self.selection = None;
        self.remount_views();
        self.changed();
    }

    /// Add the mark to the selection, or remove it when every selected char
    /// already carries it
    pub fn toggle_mark(&mut self, mark: MarkType) -> Result<(), EditorError> {
        let result = self.try_toggle_mark(mark);
        self.report(result)
    }

    /// Turn the selected text block into a heading, or back into a paragraph
    /// when it already is a heading of that level
    pub fn set_heading_level(&mut self, level: u8) -> Result<(), EditorError> {
        let result = self.try_set_heading_level(level);
        self.report(result)
    }

    pub fn toggle_list(&mut self, kind: ListKind) -> Result<(), EditorError> {
        let result = self.try_toggle_list(kind);
        self.report(result)
    }

    pub fn toggle_blockquote(&mut self) -> Result<(), EditorError> {
        let result = self.try_toggle_blockquote();
        self.report(result)
    }

    /// Link the selection. A collapsed selection inside a link relinks the
    /// whole link.
    pub fn set_link(&mut self, href: &str) -> Result<(), EditorError> {
        let result = self.try_set_link(href);
        self.report(result)
    }

    pub fn unset_link(&mut self) -> Result<(), EditorError> {
        let result = self.try_unset_link();
        self.report(result)
    }

    pub fn insert_image(&mut self, src: &str, alt: Option<&str>) -> Result<(), EditorError> {
        let result = media_src(src).map(|src| {
            self.insert_block(Node::Image(ImageAttrs {
                src,
                alt: non_blank(alt),
                title: None,
                width: Some(SizeValue::default()),
                float: None,
            }))
        });
        self.report(result)
    }

    /// Embed a YouTube video. Nothing changes when the URL is not one.
    pub fn insert_youtube(&mut self, url: &str) -> Result<(), EditorError> {
        let result = normalize_youtube_url(url)
            .ok_or_else(|| EditorError::InvalidUrl(url.to_string()))
            .map(|embed| {
                self.insert_block(Node::Youtube(YoutubeAttrs {
                    src: embed.into(),
                    width: Some(self.config.youtube_width),
                    height: Some(self.config.youtube_height),
                }))
            });
        self.report(result)
    }

    pub fn insert_video(&mut self, src: &str, title: Option<&str>) -> Result<(), EditorError> {
        let result = media_src(src).map(|src| {
            self.insert_block(Node::Video(VideoAttrs {
                src,
                title: non_blank(title),
            }))
        });
        self.report(result)
    }

    /// Resize the image at `path` as if its handle was dragged by `delta`
    pub fn resize_image(
        &mut self,
        path: &[usize],
        start_px: f64,
        container_px: f64,
        delta: f64,
    ) -> Result<(), EditorError> {
        let width = resize_width(start_px, container_px, delta, self.config.min_image_px);
        self.patch_image(
            path,
            ImagePatch {
                width: Some(width),
                float: None,
            },
        )
    }

    pub fn set_float(&mut self, path: &[usize], float: Option<Float>) -> Result<(), EditorError> {
        self.patch_image(
            path,
            ImagePatch {
                width: None,
                float: Some(float),
            },
        )
    }

    /// Back to full width without wrapping
    pub fn reset_image(&mut self, path: &[usize]) -> Result<(), EditorError> {
        self.patch_image(
            path,
            ImagePatch {
                width: Some(SizeValue::default()),
                float: Some(None),
            },
        )
    }

    /// Apply an attribute patch to the image at `path`. A floated image
    /// without a width gets half the container.
    pub fn patch_image(&mut self, path: &[usize], patch: ImagePatch) -> Result<(), EditorError> {
        let result = self.try_patch_image(path, patch);
        self.report(result)
    }

    /// Deliver pointer input to the mounted views and apply what they ask for
    pub fn dispatch_pointer(&mut self, event: PointerEvent) {
        self.hub.dispatch(event);
        self.flush_view_patches();
    }

    /// Apply patches views queued since the last flush
    pub fn flush_view_patches(&mut self) -> usize {
        let pending: Vec<_> = self.patches.borrow_mut().drain(..).collect();
        let count = pending.len();
        for (path, patch) in pending {
            // Refusals are already reported to observers
            let _ = self.patch_image(&path, patch);
        }
        count
    }

    pub fn handle_paste(&mut self, files: Vec<MediaFile>) -> bool {
        self.accept_media(files, "paste")
    }

    pub fn handle_drop(&mut self, files: Vec<MediaFile>) -> bool {
        self.accept_media(files, "drop")
    }

    /// Upload every queued file in order, inserting each at the selection.
    /// Returns how many were processed.
    pub async fn process_uploads(&mut self) -> usize {
        let mut processed = 0;
        while self.upload_next().await.is_some() {
            processed += 1;
        }
        processed
    }

    /// Upload an image picked from the toolbar; its name becomes the alt text
    pub async fn upload_image(&mut self, file: MediaFile) -> Result<String, EditorError> {
        self.upload_now(QueuedUpload {
            file,
            kind: MediaKind::Image,
            name_as_alt: true,
        })
        .await
    }

    /// Upload a video picked from the toolbar; its name becomes the title
    pub async fn upload_video(&mut self, file: MediaFile) -> Result<String, EditorError> {
        self.upload_now(QueuedUpload {
            file,
            kind: MediaKind::Video,
            name_as_alt: false,
        })
        .await
    }

    fn emit(&self, event: EditorEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn changed(&self) {
        self.emit(EditorEvent::Changed(self.doc.clone()));
    }

    fn report<T>(&self, result: Result<T, EditorError>) -> Result<T, EditorError> {
        if let Err(e) = &result {
            tracing::debug!("Editor command refused: {}", e);
            self.emit(EditorEvent::Error(e.clone()));
        }
        result
    }

    /// Path and clamped range of the current text selection
    fn text_target(&self) -> Result<(Vec<usize>, usize, usize), EditorError> {
        let selection = self.selection.as_ref().ok_or(EditorError::NoSelection)?;
        let Selection::Text { path, .. } = selection else {
            return Err(EditorError::NoSelection);
        };
        let content = self
            .doc
            .node_at(path)
            .and_then(Node::inline_content)
            .ok_or(EditorError::NoSelection)?;
        let len = content_len(content);
        let (start, end) = selection.range().unwrap_or((0, 0));
        Ok((path.clone(), start.min(len), end.min(len)))
    }

    fn inline_at_mut(&mut self, path: &[usize]) -> Result<&mut Vec<Inline>, EditorError> {
        self.doc
            .node_at_mut(path)
            .and_then(Node::inline_content_mut)
            .ok_or(EditorError::NoSelection)
    }

    fn top_level(&self) -> Result<usize, EditorError> {
        self.selection
            .as_ref()
            .and_then(Selection::top_level)
            .filter(|i| *i < self.doc.content.len())
            .ok_or(EditorError::NoSelection)
    }

    fn try_toggle_mark(&mut self, mark: MarkType) -> Result<(), EditorError> {
        let added = match mark {
            MarkType::Bold => Mark::Bold,
            MarkType::Italic => Mark::Italic,
            MarkType::Underline => Mark::Underline,
            MarkType::Code => Mark::Code,
            MarkType::Link => return self.try_unset_link(),
        };
        let (path, start, end) = self.text_target()?;
        if start == end {
            return Ok(());
        }

        let content = self.inline_at_mut(&path)?;
        if range_has_mark(content, start, end, mark) {
            update_marks(content, start, end, |marks| {
                marks.retain(|m| m.mark_type() != mark)
            });
        } else {
            update_marks(content, start, end, |marks| marks.push(added.clone()));
        }
        self.changed();
        Ok(())
    }

    fn try_set_heading_level(&mut self, level: u8) -> Result<(), EditorError> {
        let level = level.clamp(1, 3);
        let path = self
            .selection
            .as_ref()
            .map(|s| s.path().to_vec())
            .ok_or(EditorError::NoSelection)?;
        let node = self.doc.node_at_mut(&path).ok_or(EditorError::NoSelection)?;

        let next = match std::mem::replace(node, Node::empty_paragraph()) {
            Node::Paragraph { content } => Node::Heading { level, content },
            Node::Heading { level: current, content } if current == level => {
                Node::Paragraph { content }
            }
            Node::Heading { content, .. } => Node::Heading { level, content },
            other => {
                *node = other;
                return Err(EditorError::NoSelection);
            }
        };
        *node = next;
        self.changed();
        Ok(())
    }

    fn try_toggle_list(&mut self, kind: ListKind) -> Result<(), EditorError> {
        let index = self.top_level()?;
        let block = std::mem::replace(&mut self.doc.content[index], Node::empty_paragraph());

        match (block, kind) {
            (Node::BulletList { items }, ListKind::Bullet)
            | (Node::OrderedList { items }, ListKind::Ordered) => {
                let mut starts = Vec::with_capacity(items.len());
                let mut lifted = Vec::new();
                for item in items {
                    starts.push(lifted.len());
                    lifted.extend(item.content);
                }
                if let Some(selection) = self.selection.as_mut() {
                    let path = selection.path_mut();
                    if path.len() >= 3 {
                        let first = index + starts.get(path[1]).copied().unwrap_or(0) + path[2];
                        path.splice(0..3, [first]);
                    } else {
                        path.truncate(1);
                    }
                }
                self.doc.content.splice(index..=index, non_empty(Document::new(lifted)).content);
            }
            (Node::BulletList { items }, ListKind::Ordered) => {
                self.doc.content[index] = Node::OrderedList { items };
            }
            (Node::OrderedList { items }, ListKind::Bullet) => {
                self.doc.content[index] = Node::BulletList { items };
            }
            (other, kind) => {
                let items = vec![ListItem {
                    content: vec![other],
                }];
                self.doc.content[index] = match kind {
                    ListKind::Bullet => Node::BulletList { items },
                    ListKind::Ordered => Node::OrderedList { items },
                };
                if let Some(selection) = self.selection.as_mut() {
                    selection.path_mut().splice(1..1, [0, 0]);
                }
            }
        }

        self.remount_views();
        self.changed();
        Ok(())
    }

    fn try_toggle_blockquote(&mut self) -> Result<(), EditorError> {
        let index = self.top_level()?;
        let block = std::mem::replace(&mut self.doc.content[index], Node::empty_paragraph());

        match block {
            Node::Blockquote { content } => {
                if let Some(selection) = self.selection.as_mut() {
                    let path = selection.path_mut();
                    if path.len() >= 2 {
                        let first = index + path[1];
                        path.splice(0..2, [first]);
                    }
                }
                self.doc.content.splice(index..=index, non_empty(Document::new(content)).content);
            }
            other => {
                self.doc.content[index] = Node::Blockquote {
                    content: vec![other],
                };
                if let Some(selection) = self.selection.as_mut() {
                    selection.path_mut().insert(1, 0);
                }
            }
        }

        self.remount_views();
        self.changed();
        Ok(())
    }

    /// Range a link command applies to, `None` when a caret sits outside
    /// any link
    fn link_range(&self) -> Result<Option<(Vec<usize>, usize, usize)>, EditorError> {
        let (path, start, end) = self.text_target()?;
        if start < end {
            return Ok(Some((path, start, end)));
        }
        let content = self
            .doc
            .node_at(&path)
            .and_then(Node::inline_content)
            .ok_or(EditorError::NoSelection)?;
        Ok(mark_range_at(content, start, MarkType::Link).map(|(s, e)| (path, s, e)))
    }

    fn try_set_link(&mut self, href: &str) -> Result<(), EditorError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(EditorError::EmptyLink);
        }
        let Some((path, start, end)) = self.link_range()? else {
            return Ok(());
        };

        let link = Mark::Link {
            href: href.to_string(),
        };
        let content = self.inline_at_mut(&path)?;
        update_marks(content, start, end, |marks| {
            marks.retain(|m| m.mark_type() != MarkType::Link);
            marks.push(link.clone());
        });
        self.changed();
        Ok(())
    }

    fn try_unset_link(&mut self) -> Result<(), EditorError> {
        let Some((path, start, end)) = self.link_range()? else {
            return Ok(());
        };
        let content = self.inline_at_mut(&path)?;
        update_marks(content, start, end, |marks| {
            marks.retain(|m| m.mark_type() != MarkType::Link)
        });
        self.changed();
        Ok(())
    }

    /// Insert a block after the top-level block holding the selection,
    /// replacing it when it is an empty paragraph, and select the new node
    fn insert_block(&mut self, node: Node) {
        let len = self.doc.content.len();
        let at = self
            .selection
            .as_ref()
            .and_then(Selection::top_level)
            .filter(|i| *i < len);

        let index = match at {
            Some(i) if self.doc.content[i].is_empty_paragraph() => {
                self.doc.content[i] = node;
                i
            }
            Some(i) => {
                self.doc.content.insert(i + 1, node);
                i + 1
            }
            None if self.doc.content.last().is_some_and(Node::is_empty_paragraph) => {
                self.doc.content[len - 1] = node;
                len - 1
            }
            None => {
                self.doc.content.push(node);
                len
            }
        };

        self.selection = Some(Selection::Node { path: vec![index] });
        self.remount_views();
        self.changed();
    }

    fn try_patch_image(&mut self, path: &[usize], patch: ImagePatch) -> Result<(), EditorError> {
        let Some(Node::Image(attrs)) = self.doc.node_at_mut(path) else {
            return Err(EditorError::NotAnImage);
        };
        if let Some(width) = patch.width {
            attrs.width = Some(width);
        }
        if let Some(float) = patch.float {
            attrs.float = float;
            if float.is_some() && attrs.width.is_none() {
                attrs.width = Some(SizeValue::percent(50));
            }
        }

        let node = Node::Image(attrs.clone());
        if let Some((_, view)) = self.views.iter_mut().find(|(p, _)| p.as_slice() == path) {
            view.update(&node);
        }
        self.changed();
        Ok(())
    }

    fn mount_views(&mut self) {
        for path in self.doc.image_paths() {
            let Some(node) = self.doc.node_at(&path) else {
                continue;
            };
            let patches = Rc::clone(&self.patches);
            let target = path.clone();
            let on_patch: PatchCallback = Rc::new(move |patch: ImagePatch| {
                patches.borrow_mut().push_back((target.clone(), patch))
            });
            let view = self.image_view.render(node, on_patch);
            self.views.push((path, view));
        }
    }

    fn unmount_views(&mut self) {
        for (_, view) in self.views.drain(..) {
            view.destroy();
        }
        self.patches.borrow_mut().clear();
    }

    /// Node paths shift on structural edits, so views are rebuilt
    fn remount_views(&mut self) {
        self.unmount_views();
        self.mount_views();
    }

    fn accept_media(&mut self, files: Vec<MediaFile>, source: &str) -> bool {
        let position = |kind| files.iter().position(|f| f.kind() == Some(kind));
        let picked = position(MediaKind::Video)
            .map(|i| (i, MediaKind::Video))
            .or_else(|| position(MediaKind::Image).map(|i| (i, MediaKind::Image)));
        let Some((index, kind)) = picked else {
            return false;
        };

        let mut files = files;
        let file = files.swap_remove(index);
        tracing::debug!("Queued {} from {}", file.name, source);
        self.enqueue(QueuedUpload {
            file,
            kind,
            name_as_alt: false,
        });
        true
    }

    fn enqueue(&mut self, upload: QueuedUpload) {
        let pending = self.uploads.enqueue(upload);
        self.emit(EditorEvent::Upload(UploadStatus::Uploading { pending }));
    }

    /// Upload the head of the queue, `None` when the queue is empty
    async fn upload_next(&mut self) -> Option<Result<String, EditorError>> {
        let queued = self.uploads.next()?;
        let result = self.uploads.upload(&queued.file, queued.kind).await;

        match &result {
            Ok(url) => {
                let name = queued.file.name;
                let node = match queued.kind {
                    MediaKind::Image => Node::Image(ImageAttrs {
                        src: url.clone(),
                        alt: if queued.name_as_alt { non_blank(Some(name.as_str())) } else { None },
                        title: None,
                        width: Some(SizeValue::default()),
                        float: None,
                    }),
                    MediaKind::Video => Node::Video(VideoAttrs {
                        src: url.clone(),
                        title: non_blank(Some(name.as_str())),
                    }),
                };
                self.insert_block(node);
                self.emit(EditorEvent::Upload(UploadStatus::Done { url: url.clone() }));
            }
            Err(e) => {
                self.emit(EditorEvent::Upload(UploadStatus::Error {
                    message: e.to_string(),
                }));
                self.emit(EditorEvent::Error(e.clone()));
            }
        }
        Some(result)
    }

    /// Queue behind anything already waiting, then drain the queue
    async fn upload_now(&mut self, upload: QueuedUpload) -> Result<String, EditorError> {
        self.enqueue(upload);
        let mut last = None;
        while let Some(result) = self.upload_next().await {
            last = Some(result);
        }
        last.unwrap_or_else(|| Err(EditorError::UploadFailed("upload was not run".to_string())))
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.unmount_views();
    }
}

fn non_empty(doc: Document) -> Document {
    if doc.content.is_empty() {
        Document::empty()
    } else {
        doc
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn media_src(src: &str) -> Result<String, EditorError> {
    match src.trim() {
        "" => Err(EditorError::EmptyMediaSource),
        src => Ok(src.to_string()),
    }
}
