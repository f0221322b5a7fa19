//! The sentiment map widget: owns one scene, one layer pipeline and the
//! page-facing callbacks.

use std::rc::Rc;

use log::{debug, info};

use crate::backdrop::{Backdrop, BackdropTicket};
use crate::cluster::Marker;
use crate::config::MapProps;
use crate::data::{GeoPoint, SentimentEvent};
use crate::pipeline::{LayerPipeline, PointLayer, RenderMode};
use crate::resolver::{self, ClickOutcome, ClickTarget};
use crate::scene::{Container, ResizeBus, SceneHandle, SceneState, Surface};
use crate::viewport::{Tolerance, Viewport, MAX_ZOOM};

/// Zoom levels gained when a cluster is expanded.
const CLUSTER_EXPAND_STEP: f64 = 2.0;

/// Notifications from the rendering surface, delivered on the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Ready,
    Click(ClickTarget),
    ViewportChanged { center: GeoPoint, zoom: f64 },
}

pub type EventClickCallback = Box<dyn FnMut(&SentimentEvent)>;

pub struct MapComponent<C: Container> {
    props: MapProps,
    events: Vec<SentimentEvent>,
    initial_view: Viewport,
    resize: Rc<ResizeBus>,
    scene: Option<SceneHandle<C::Surface>>,
    pipeline: LayerPipeline,
    backdrop_generation: u64,
    /// Backdrop that arrived before the scene was ready.
    pending_backdrop: Option<Backdrop>,
    on_event_click: Option<EventClickCallback>,
}

impl<C: Container> MapComponent<C>
where
    C::Surface: 'static,
{
    pub fn new(props: MapProps, center: GeoPoint, zoom: f64, resize: Rc<ResizeBus>) -> Self {
        let initial_view = Viewport::new(center, zoom, 0, props.height);
        Self {
            props,
            events: Vec::new(),
            initial_view,
            resize,
            scene: None,
            pipeline: LayerPipeline::new(),
            backdrop_generation: 0,
            pending_backdrop: None,
            on_event_click: None,
        }
    }

    pub fn set_on_event_click(&mut self, callback: impl FnMut(&SentimentEvent) + 'static) {
        self.on_event_click = Some(Box::new(callback));
    }

    /// Create the scene inside `container`. Returns false when the container
    /// is not ready; call again on a later tick. A mounted component keeps
    /// its existing scene.
    pub fn mount(&mut self, container: &C) -> bool {
        if let Some(scene) = &self.scene {
            if scene.state() != SceneState::Disposed {
                return true;
            }
        }
        let Some(scene) = SceneHandle::initialize(container, self.initial_view, &self.resize) else {
            return false;
        };
        self.pipeline.defer(&self.events, &self.props.cluster_config());
        self.scene = Some(scene);
        true
    }

    /// The engine finished loading; deferred layer work is applied now.
    pub fn notify_ready(&mut self) {
        let Some(scene) = &self.scene else {
            return;
        };
        if scene.mark_ready() {
            info!("sentiment map ready");
        }
        if let Some(backdrop) = self.pending_backdrop.take() {
            scene.with_surface(|surface, _| surface.set_backdrop(&backdrop));
        }
        if self.pipeline.has_pending() {
            debug!("applying deferred layer rebuild");
        }
        self.pipeline.flush(scene);
    }

    pub fn on_ready(&self, callback: impl FnOnce() + 'static) {
        if let Some(scene) = &self.scene {
            scene.on_ready(callback);
        }
    }

    pub fn set_events(&mut self, events: Vec<SentimentEvent>) {
        self.events = events;
        self.rebuild();
    }

    pub fn set_props(&mut self, props: MapProps) {
        self.props = props;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let config = self.props.cluster_config();
        match &self.scene {
            Some(scene) => self.pipeline.rebuild_layer(scene, &self.events, &config),
            None => self.pipeline.defer(&self.events, &config),
        }
    }

    pub fn handle_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Ready => self.notify_ready(),
            SurfaceEvent::Click(target) => {
                self.handle_click(target);
            }
            SurfaceEvent::ViewportChanged { center, zoom } => self.viewport_changed(center, zoom),
        }
    }

    /// Camera moved. Clusters are re-partitioned from the active layer's
    /// points; no rebuild happens.
    pub fn viewport_changed(&mut self, center: GeoPoint, zoom: f64) {
        let Some(scene) = &self.scene else {
            return;
        };
        scene.set_view(center, zoom);
        self.pipeline.viewport_changed(scene);
    }

    /// Resolve a click and notify the page at most once.
    pub fn handle_click(&mut self, target: ClickTarget) -> ClickOutcome {
        let Some(scene) = self.scene.as_ref().filter(|scene| scene.is_ready()) else {
            return ClickOutcome::Ignored;
        };
        let Some(layer) = self.pipeline.active() else {
            return ClickOutcome::Miss;
        };

        let (at, tolerance) = match target {
            ClickTarget::Marker { reported } => (reported, Tolerance::uniform(self.props.click_epsilon)),
            ClickTarget::Screen { x, y } => {
                let viewport = scene.viewport();
                let tolerance = resolver::screen_tolerance(&viewport, self.props.click_epsilon, self.props.hit_slop_px);
                (viewport.screen_to_geo(x, y), tolerance)
            }
            ClickTarget::Cluster { center, members } => {
                let zoom = (scene.viewport().zoom + CLUSTER_EXPAND_STEP).min(MAX_ZOOM);
                debug!("expanding cluster of {} events", members.len());
                scene.with_surface(|surface, _| surface.focus(center, zoom));
                return ClickOutcome::Expanded;
            }
        };

        // Only discrete points are clickable; cluster members are not.
        let Some(event) = resolver::resolve(layer.point_events(), at, tolerance) else {
            return ClickOutcome::Miss;
        };
        let event = event.clone();
        if let Some(callback) = self.on_event_click.as_mut() {
            callback(&event);
        }
        ClickOutcome::Event(event)
    }

    /// Start a backdrop request. `None` when there is no live scene.
    pub fn begin_backdrop(&mut self) -> Option<BackdropTicket> {
        let scene = self.scene.as_ref()?;
        if scene.state() == SceneState::Disposed {
            return None;
        }
        self.backdrop_generation += 1;
        Some(BackdropTicket {
            generation: self.backdrop_generation,
        })
    }

    /// Apply a finished backdrop load. Late results for a superseded request
    /// or a disposed scene are dropped.
    pub fn apply_backdrop(&mut self, ticket: BackdropTicket, backdrop: Backdrop) -> bool {
        if ticket.generation != self.backdrop_generation {
            debug!("discarding stale backdrop result");
            return false;
        }
        let Some(scene) = &self.scene else {
            return false;
        };
        match scene.state() {
            SceneState::Disposed => false,
            SceneState::Uninitialized => {
                self.pending_backdrop = Some(backdrop);
                true
            }
            SceneState::Ready => scene
                .with_surface(|surface, _| surface.set_backdrop(&backdrop))
                .is_some(),
        }
    }

    pub fn state(&self) -> SceneState {
        self.scene
            .as_ref()
            .map_or(SceneState::Uninitialized, |scene| scene.state())
    }

    pub fn active_layer(&self) -> Option<&PointLayer> {
        self.pipeline.active()
    }

    pub fn render_mode(&self) -> Option<RenderMode> {
        self.active_layer().map(PointLayer::mode)
    }

    pub fn markers(&self) -> &[Marker] {
        match self.active_layer() {
            Some(layer) => layer.markers(),
            None => &[],
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers().len()
    }
}

impl<C: Container> MapComponent<C> {
    /// Tear the scene down. Safe to call more than once; also runs on drop.
    pub fn unmount(&mut self) {
        self.backdrop_generation += 1;
        self.pending_backdrop = None;
        self.pipeline.clear();
        if let Some(scene) = self.scene.take() {
            scene.teardown();
        }
    }
}

impl<C: Container> Drop for MapComponent<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}
