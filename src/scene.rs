//! Scene lifecycle: one rendering surface per mounted map, torn down exactly
//! once.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::backdrop::Backdrop;
use crate::data::GeoPoint;
use crate::pipeline::{LayerId, PointLayer};
use crate::viewport::Viewport;
use crate::{MapError, Result};

/// The rendering engine behind a scene. Layers are only ever mutated through
/// the pipeline; the surface draws what it is handed.
pub trait Surface {
    fn add_layer(&mut self, layer: &PointLayer);
    /// Redraw the markers of a layer that is already on the surface.
    fn refresh_layer(&mut self, layer: &PointLayer);
    fn remove_layer(&mut self, id: LayerId);
    fn resize(&mut self, width: u32, height: u32);
    fn set_backdrop(&mut self, backdrop: &Backdrop);
    /// Move the camera, e.g. to expand a clicked cluster.
    fn focus(&mut self, center: GeoPoint, zoom: f64);
    fn dispose(&mut self);
}

/// Host element a surface is created inside.
pub trait Container {
    type Surface: Surface;

    fn is_attached(&self) -> bool;
    /// Current pixel size of the host, when it has been allocated one.
    fn size(&self) -> Option<(u32, u32)> {
        None
    }
    fn create_surface(&self, viewport: &Viewport) -> Result<Self::Surface>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Uninitialized,
    Ready,
    Disposed,
}

pub type ListenerId = u64;

type ResizeCallback = Rc<dyn Fn(u32, u32)>;

/// Window-level resize notifications shared by every map in a window.
#[derive(Default)]
pub struct ResizeBus {
    next_id: Cell<ListenerId>,
    last_size: Cell<Option<(u32, u32)>>,
    listeners: RefCell<Vec<(ListenerId, ResizeCallback)>>,
}

impl ResizeBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn subscribe(&self, callback: impl Fn(u32, u32) + 'static) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(listener, _)| *listener != id);
    }

    pub fn emit(&self, width: u32, height: u32) {
        self.last_size.set(Some((width, height)));
        // Snapshot so listeners may unsubscribe while being notified.
        let listeners: Vec<ResizeCallback> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in listeners {
            callback(width, height);
        }
    }

    /// Size carried by the most recent `emit`, seen or not.
    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.last_size.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

struct SceneInner<S> {
    state: SceneState,
    surface: Option<S>,
    viewport: Viewport,
    ready_callbacks: Vec<Box<dyn FnOnce()>>,
    resize: Option<(Rc<ResizeBus>, ListenerId)>,
}

/// Owned handle to a live scene. Dropping the handle tears the scene down.
pub struct SceneHandle<S: Surface> {
    inner: Rc<RefCell<SceneInner<S>>>,
}

impl<S: Surface + 'static> SceneHandle<S> {
    /// Create the surface inside `container`. Returns `None` when the
    /// container is not attached yet or the engine fails; the caller retries
    /// on a later tick.
    pub fn initialize<C>(container: &C, mut viewport: Viewport, resize: &Rc<ResizeBus>) -> Option<Self>
    where
        C: Container<Surface = S>,
    {
        if !container.is_attached() {
            warn!("{}, deferring scene initialization", MapError::ContainerDetached);
            return None;
        }

        // Resizes emitted before this scene subscribed are not replayed.
        if let Some((width, height)) = container.size().or_else(|| resize.last_size()) {
            viewport.set_size(width, height);
        }

        let surface = match container.create_surface(&viewport) {
            Ok(surface) => surface,
            Err(err) => {
                warn!("failed to create map surface: {err}");
                return None;
            }
        };

        let inner = Rc::new(RefCell::new(SceneInner {
            state: SceneState::Uninitialized,
            surface: Some(surface),
            viewport,
            ready_callbacks: Vec::new(),
            resize: None,
        }));

        let weak: Weak<RefCell<SceneInner<S>>> = Rc::downgrade(&inner);
        let listener = resize.subscribe(move |width, height| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Ok(mut inner) = inner.try_borrow_mut() else {
                debug!("scene busy, skipping resize to {width}x{height}");
                return;
            };
            if inner.state == SceneState::Disposed {
                return;
            }
            inner.viewport.set_size(width, height);
            if inner.state == SceneState::Ready {
                if let Some(surface) = inner.surface.as_mut() {
                    surface.resize(width, height);
                }
            }
        });
        inner.borrow_mut().resize = Some((resize.clone(), listener));

        debug!(
            "scene created at ({}, {}) zoom {}",
            viewport.center.lat, viewport.center.lng, viewport.zoom
        );
        Some(Self { inner })
    }
}

impl<S: Surface> SceneHandle<S> {
    pub fn state(&self) -> SceneState {
        self.inner.borrow().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SceneState::Ready
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.borrow().viewport
    }

    /// Run `callback` once the scene is ready. Fires immediately when it
    /// already is; dropped when the scene is disposed.
    pub fn on_ready(&self, callback: impl FnOnce() + 'static) {
        let state = self.state();
        match state {
            SceneState::Uninitialized => {
                self.inner.borrow_mut().ready_callbacks.push(Box::new(callback));
            }
            SceneState::Ready => callback(),
            SceneState::Disposed => {}
        }
    }

    /// Engine finished loading. Returns false if the scene was not waiting.
    pub fn mark_ready(&self) -> bool {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != SceneState::Uninitialized {
                return false;
            }
            inner.state = SceneState::Ready;
            let (width, height) = (inner.viewport.width, inner.viewport.height);
            if let Some(surface) = inner.surface.as_mut() {
                surface.resize(width, height);
            }
            std::mem::take(&mut inner.ready_callbacks)
        };
        for callback in callbacks {
            callback();
        }
        true
    }

    pub fn set_view(&self, center: GeoPoint, zoom: f64) {
        let mut inner = self.inner.borrow_mut();
        if inner.state != SceneState::Disposed {
            inner.viewport.center = center;
            inner.viewport.set_zoom(zoom);
        }
    }

    /// Borrow the surface of a ready scene. `None` before ready or after
    /// teardown.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S, &Viewport) -> R) -> Option<R> {
        let mut inner = self.inner.borrow_mut();
        if inner.state != SceneState::Ready {
            return None;
        }
        let viewport = inner.viewport;
        inner.surface.as_mut().map(|surface| f(surface, &viewport))
    }

    /// Release the surface and the resize listener. Safe to call repeatedly.
    pub fn teardown(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == SceneState::Disposed {
            return;
        }
        inner.state = SceneState::Disposed;
        inner.ready_callbacks.clear();
        if let Some((bus, listener)) = inner.resize.take() {
            bus.unsubscribe(listener);
        }
        if let Some(mut surface) = inner.surface.take() {
            surface.dispose();
        }
        debug!("scene disposed");
    }
}

impl<S: Surface> Drop for SceneHandle<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
