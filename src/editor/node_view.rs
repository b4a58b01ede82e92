//! Interactive views bound to single nodes.
//!
//! A view never touches the document. It reports attribute changes through
//! the patch callback it was rendered with, and listens for pointer events
//! through a [`PointerHub`] the host feeds with window-level input. Listeners
//! are registered explicitly and removed by [`ViewHandle::destroy`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::document::{Float, Node, SizeValue};

/// Pointer input delivered to every subscribed view
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move { x: f64 },
    Up,
}

/// Token returned by [`PointerHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&PointerEvent)>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Registry of global pointer listeners
#[derive(Clone, Default)]
pub struct PointerHub {
    inner: Rc<RefCell<HubInner>>,
}

impl fmt::Debug for PointerHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl PointerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&PointerEvent) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.push((id, Rc::new(listener)));
        id
    }

    /// Returns false when the id was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    pub fn dispatch(&self, event: PointerEvent) {
        // Listeners may subscribe or unsubscribe while handling the event
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Attribute changes a view asks for. `float: Some(None)` clears the float.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePatch {
    pub width: Option<SizeValue>,
    pub float: Option<Option<Float>>,
}

pub type PatchCallback = Rc<dyn Fn(ImagePatch)>;

/// A view implementation for one kind of node
pub trait NodeView {
    fn render(&self, node: &Node, on_patch: PatchCallback) -> ViewHandle;
}

/// Width of an image after dragging its handle by `delta` pixels.
///
/// The pixel width is clamped to `[min(min_px, 20% of container), container]`
/// and written as a whole percentage of the container within `20..=100`.
/// A container width of zero falls back to the start width.
pub fn resize_width(start_px: f64, container_px: f64, delta: f64, min_px: f64) -> SizeValue {
    let container = if container_px > 0.0 { container_px } else { start_px };
    if !container.is_finite() || container <= 0.0 || !start_px.is_finite() || !delta.is_finite() {
        return SizeValue::default();
    }
    let floor = min_px.max(0.0).min(container * 0.2);
    let next = (start_px + delta).clamp(floor, container);
    let pct = (next / container * 100.0).clamp(20.0, 100.0);
    SizeValue::percent(pct.round() as u32)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    view: u64,
    start_x: f64,
    start_width_px: f64,
    container_width_px: f64,
}

/// Mounted image view. Keeps its pointer subscriptions until destroyed.
pub struct ViewHandle {
    id: u64,
    hub: PointerHub,
    listeners: Vec<ListenerId>,
    drag: Rc<RefCell<Option<DragState>>>,
    on_patch: PatchCallback,
    width: Option<SizeValue>,
    float: Option<Float>,
}

impl fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewHandle")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("float", &self.float)
            .finish()
    }
}

impl ViewHandle {
    /// Start a drag from the resize handle
    pub fn begin_resize(&self, start_x: f64, start_width_px: f64, container_width_px: f64) {
        let container_width_px = if container_width_px > 0.0 {
            container_width_px
        } else {
            start_width_px
        };
        *self.drag.borrow_mut() = Some(DragState {
            view: self.id,
            start_x,
            start_width_px,
            container_width_px,
        });
    }

    pub fn is_dragging(&self) -> bool {
        matches!(*self.drag.borrow(), Some(drag) if drag.view == self.id)
    }

    /// Inline style of the view wrapper
    pub fn style(&self) -> String {
        let mut style = format!("width:{}", self.width.clone().unwrap_or_default());
        if let Some(float) = self.float {
            style.push_str(&format!(";float:{};margin:{}", float.as_str(), float.margin()));
        }
        style
    }

    /// Pick up attribute changes of the node this view is bound to
    pub fn update(&mut self, node: &Node) {
        if let Node::Image(attrs) = node {
            self.width = attrs.width.clone();
            self.float = attrs.float;
        }
    }

    pub fn wrap_left(&self) {
        self.set_float(Float::Left);
    }

    pub fn wrap_right(&self) {
        self.set_float(Float::Right);
    }

    fn set_float(&self, float: Float) {
        (self.on_patch)(ImagePatch {
            width: Some(self.width.clone().unwrap_or_else(|| SizeValue::percent(50))),
            float: Some(Some(float)),
        });
    }

    pub fn no_wrap(&self) {
        (self.on_patch)(ImagePatch {
            width: None,
            float: Some(None),
        });
    }

    pub fn full_width(&self) {
        (self.on_patch)(ImagePatch {
            width: Some(SizeValue::default()),
            float: Some(None),
        });
    }

    /// Remove the pointer listeners and drop any drag this view owns
    pub fn destroy(self) {
        for id in &self.listeners {
            self.hub.unsubscribe(*id);
        }
        let mut drag = self.drag.borrow_mut();
        if matches!(*drag, Some(d) if d.view == self.id) {
            *drag = None;
        }
    }
}

/// Drag-resizable image view
pub struct ImageNodeView {
    hub: PointerHub,
    drag: Rc<RefCell<Option<DragState>>>,
    min_px: f64,
    next_id: Cell<u64>,
}

impl ImageNodeView {
    pub fn new(hub: PointerHub, min_px: f64) -> Self {
        Self {
            hub,
            drag: Rc::new(RefCell::new(None)),
            min_px,
            next_id: Cell::new(0),
        }
    }

    /// Whether any view is being dragged
    pub fn dragging(&self) -> bool {
        self.drag.borrow().is_some()
    }
}

impl NodeView for ImageNodeView {
    fn render(&self, node: &Node, on_patch: PatchCallback) -> ViewHandle {
        let (width, float) = match node {
            Node::Image(attrs) => (attrs.width.clone(), attrs.float),
            _ => (None, None),
        };
        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        let on_move = {
            let drag = Rc::clone(&self.drag);
            let on_patch = Rc::clone(&on_patch);
            let min_px = self.min_px;
            move |event: &PointerEvent| {
                let PointerEvent::Move { x } = *event else {
                    return;
                };
                let Some(state) = *drag.borrow() else {
                    return;
                };
                if state.view != id {
                    return;
                }
                let width = resize_width(
                    state.start_width_px,
                    state.container_width_px,
                    x - state.start_x,
                    min_px,
                );
                on_patch(ImagePatch {
                    width: Some(width),
                    float: None,
                });
            }
        };
        let on_up = {
            let drag = Rc::clone(&self.drag);
            move |event: &PointerEvent| {
                if *event == PointerEvent::Up {
                    drag.borrow_mut().take();
                }
            }
        };

        let listeners = vec![self.hub.subscribe(on_move), self.hub.subscribe(on_up)];
        ViewHandle {
            id,
            hub: self.hub.clone(),
            listeners,
            drag: Rc::clone(&self.drag),
            on_patch,
            width,
            float,
        }
    }
}
