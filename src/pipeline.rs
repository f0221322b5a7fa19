//! Turns an event list into the single active point layer of a scene.

use log::debug;

use crate::cluster::{self, Marker};
use crate::data::{ClusterConfig, RenderPoint, SentimentEvent};
use crate::scene::{SceneHandle, Surface};

pub type LayerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Clustered,
    Discrete,
}

/// Drop every event that cannot be plotted. Only the returned events are
/// rendered or matched against clicks.
pub fn filter_plottable(events: &[SentimentEvent]) -> Vec<SentimentEvent> {
    events
        .iter()
        .filter(|event| event.plottable_location().is_some())
        .cloned()
        .collect()
}

pub fn select_mode(plottable: usize, config: &ClusterConfig) -> RenderMode {
    if config.enabled && plottable >= config.min_cluster_size {
        RenderMode::Clustered
    } else {
        RenderMode::Discrete
    }
}

/// Weight used for marker sizing. Missing or unusable hotness maps to zero.
fn hotness_weight(event: &SentimentEvent) -> f64 {
    event
        .hotness
        .filter(|hotness| hotness.is_finite() && *hotness > 0.0)
        .unwrap_or(0.0)
}

/// An immutable, fully built layer. The pipeline is the only owner.
#[derive(Debug, Clone)]
pub struct PointLayer {
    id: LayerId,
    mode: RenderMode,
    config: ClusterConfig,
    events: Vec<SentimentEvent>,
    points: Vec<RenderPoint>,
    markers: Vec<Marker>,
}

impl PointLayer {
    pub fn build(id: LayerId, events: &[SentimentEvent], config: &ClusterConfig, zoom: f64) -> Self {
        let events = filter_plottable(events);
        let points: Vec<RenderPoint> = events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| {
                let location = event.plottable_location()?;
                Some(RenderPoint {
                    event: index,
                    lng: location.lng,
                    lat: location.lat,
                    weight: hotness_weight(event),
                    style: event.sentiment,
                })
            })
            .collect();

        let mode = select_mode(points.len(), config);
        let markers = match mode {
            RenderMode::Clustered => cluster::partition(&points, zoom, config),
            RenderMode::Discrete => cluster::discrete(&points),
        };

        Self {
            id,
            mode,
            config: *config,
            events,
            points,
            markers,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// The filtered, plottable events this layer renders.
    pub fn events(&self) -> &[SentimentEvent] {
        &self.events
    }

    pub fn points(&self) -> &[RenderPoint] {
        &self.points
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Events drawn as their own marker. Members of a cluster are left out.
    pub fn point_events(&self) -> impl Iterator<Item = &SentimentEvent> + '_ {
        self.markers.iter().filter_map(|marker| match marker {
            Marker::Point { event, .. } => self.events.get(*event),
            Marker::Cluster { .. } => None,
        })
    }

    /// Re-partition the same points for a new zoom. Discrete layers are
    /// zoom independent.
    fn recluster(&mut self, zoom: f64) -> bool {
        if self.mode != RenderMode::Clustered {
            return false;
        }
        let markers = cluster::partition(&self.points, zoom, &self.config);
        if markers == self.markers {
            return false;
        }
        self.markers = markers;
        true
    }
}

struct PendingRebuild {
    events: Vec<SentimentEvent>,
    config: ClusterConfig,
}

/// Owns the active layer. Rebuilds replace it wholesale; requests made before
/// the scene is ready are held back and only the latest one is applied.
#[derive(Default)]
pub struct LayerPipeline {
    generation: LayerId,
    active: Option<PointLayer>,
    pending: Option<PendingRebuild>,
}

impl LayerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&PointLayer> {
        self.active.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hold a rebuild until a ready scene is available.
    pub fn defer(&mut self, events: &[SentimentEvent], config: &ClusterConfig) {
        self.pending = Some(PendingRebuild {
            events: events.to_vec(),
            config: *config,
        });
    }

    pub fn rebuild_layer<S: Surface>(
        &mut self,
        scene: &SceneHandle<S>,
        events: &[SentimentEvent],
        config: &ClusterConfig,
    ) {
        if !scene.is_ready() {
            self.defer(events, config);
            return;
        }
        self.pending = None;
        self.apply(scene, events, config);
    }

    /// Apply a deferred rebuild once the scene is ready.
    pub fn flush<S: Surface>(&mut self, scene: &SceneHandle<S>) {
        if !scene.is_ready() {
            return;
        }
        if let Some(pending) = self.pending.take() {
            self.apply(scene, &pending.events, &pending.config);
        }
    }

    fn apply<S: Surface>(&mut self, scene: &SceneHandle<S>, events: &[SentimentEvent], config: &ClusterConfig) {
        self.generation += 1;
        let layer = PointLayer::build(self.generation, events, config, scene.viewport().zoom);
        let previous = self.active.take();

        let applied = scene.with_surface(|surface, _| {
            if let Some(previous) = previous {
                surface.remove_layer(previous.id());
            }
            surface.add_layer(&layer);
        });
        if applied.is_none() {
            return;
        }

        debug!(
            "layer {} rebuilt: {} of {} events plottable, {:?}, {} markers",
            layer.id(),
            layer.events().len(),
            events.len(),
            layer.mode(),
            layer.markers().len()
        );
        self.active = Some(layer);
    }

    /// Re-cluster the active layer for the scene's current zoom without a
    /// rebuild.
    pub fn viewport_changed<S: Surface>(&mut self, scene: &SceneHandle<S>) {
        let zoom = scene.viewport().zoom;
        let Some(layer) = self.active.as_mut() else {
            return;
        };
        if layer.recluster(zoom) {
            let layer = &*layer;
            scene.with_surface(|surface, _| surface.refresh_layer(layer));
        }
    }

    /// Forget all layer state, e.g. when the scene is going away.
    pub fn clear(&mut self) {
        self.active = None;
        self.pending = None;
    }
}
