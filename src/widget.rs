//! libshumate-backed rendering surface. Marker and map clicks are forwarded
//! to the UI loop as [`SurfaceEvent`]s over a flume channel.

use std::collections::HashMap;

use chrono::Utc;
use gtk::glib;
use gtk::prelude::*;
use libshumate::prelude::{LocationExt, MarkerExt};
use log::debug;

use crate::backdrop::Backdrop;
use crate::cluster::{ClusterStyle, Marker};
use crate::component::SurfaceEvent;
use crate::data::{GeoPoint, SentimentEvent, StyleKey};
use crate::pipeline::{LayerId, PointLayer};
use crate::resolver::ClickTarget;
use crate::scene::{Container, Surface};
use crate::viewport::Viewport;
use crate::{MapError, Result};

const MIN_ZOOM_LEVEL: u32 = 2;
const MAX_ZOOM_LEVEL: u32 = 18;

fn send(sender: &flume::Sender<SurfaceEvent>, event: SurfaceEvent) {
    if sender.send(event).is_err() {
        debug!("surface event dropped, map receiver is gone");
    }
}

fn current_view(viewport: &libshumate::Viewport) -> SurfaceEvent {
    SurfaceEvent::ViewportChanged {
        center: GeoPoint::new(viewport.latitude(), viewport.longitude()),
        zoom: viewport.zoom_level(),
    }
}

/// A `SimpleMap` widget that surfaces are created in.
pub struct ShumateContainer {
    map: libshumate::SimpleMap,
    sender: flume::Sender<SurfaceEvent>,
}

impl ShumateContainer {
    pub fn new(map: &libshumate::SimpleMap, sender: flume::Sender<SurfaceEvent>) -> Self {
        Self {
            map: map.clone(),
            sender,
        }
    }
}

impl Container for ShumateContainer {
    type Surface = ShumateSurface;

    fn is_attached(&self) -> bool {
        self.map.root().is_some()
    }

    fn size(&self) -> Option<(u32, u32)> {
        let width = u32::try_from(self.map.width()).ok()?;
        let height = u32::try_from(self.map.height()).ok()?;
        (width > 0 && height > 0).then_some((width, height))
    }

    fn create_surface(&self, viewport: &Viewport) -> Result<ShumateSurface> {
        let map_view = self
            .map
            .map()
            .ok_or_else(|| MapError::Surface("map widget has no view".into()))?;
        let shumate_viewport = map_view
            .viewport()
            .ok_or_else(|| MapError::Surface("map view has no viewport".into()))?;

        shumate_viewport.set_min_zoom_level(MIN_ZOOM_LEVEL);
        shumate_viewport.set_max_zoom_level(MAX_ZOOM_LEVEL);
        map_view.center_on(viewport.center.lat, viewport.center.lng);
        shumate_viewport.set_zoom_level(viewport.zoom);

        let sender = self.sender.clone();
        let zoom_handler = shumate_viewport.connect_notify_local(Some("zoom-level"), move |viewport, _| {
            send(&sender, current_view(viewport));
        });

        // Bare-map clicks. Marker buttons claim their own clicks.
        let gesture = gtk::GestureClick::new();
        let sender = self.sender.clone();
        let viewport_for_click = shumate_viewport.clone();
        gesture.connect_released(move |_, _, x, y| {
            send(&sender, current_view(&viewport_for_click));
            send(&sender, SurfaceEvent::Click(ClickTarget::Screen { x, y }));
        });
        self.map.add_controller(gesture.clone());

        let map_handler = if self.map.is_mapped() {
            send(&self.sender, SurfaceEvent::Ready);
            None
        } else {
            let sender = self.sender.clone();
            Some(self.map.connect_map(move |_| send(&sender, SurfaceEvent::Ready)))
        };

        Ok(ShumateSurface {
            widget: self.map.clone(),
            map_view,
            viewport: shumate_viewport,
            layers: HashMap::new(),
            backdrop: Vec::new(),
            sender: self.sender.clone(),
            zoom_handler: Some(zoom_handler),
            map_handler,
            gesture: Some(gesture),
        })
    }
}

pub struct ShumateSurface {
    widget: libshumate::SimpleMap,
    map_view: libshumate::Map,
    viewport: libshumate::Viewport,
    layers: HashMap<LayerId, libshumate::MarkerLayer>,
    backdrop: Vec<libshumate::PathLayer>,
    sender: flume::Sender<SurfaceEvent>,
    zoom_handler: Option<glib::SignalHandlerId>,
    map_handler: Option<glib::SignalHandlerId>,
    gesture: Option<gtk::GestureClick>,
}

impl ShumateSurface {
    fn populate(&self, target: &libshumate::MarkerLayer, layer: &PointLayer) {
        for marker in layer.markers() {
            let shumate_marker = match marker {
                Marker::Point {
                    event,
                    position,
                    diameter,
                    style,
                } => self.point_marker(&layer.events()[*event], *position, *diameter, *style),
                Marker::Cluster {
                    position,
                    members,
                    style,
                } => self.cluster_marker(*position, members, style),
            };
            target.add_marker(&shumate_marker);
        }
    }

    fn point_marker(&self, event: &SentimentEvent, position: GeoPoint, diameter: f64, style: StyleKey) -> libshumate::Marker {
        let mut tooltip = event.title.clone();
        if let Some(address) = &event.address {
            tooltip.push_str(&format!("\n{address}"));
        }
        if let Some(age) = event.time_ago(Utc::now()) {
            tooltip.push_str(&format!("\n{age}"));
        }

        let button = gtk::Button::builder().tooltip_text(tooltip.as_str()).build();
        button.add_css_class("map-marker");
        button.add_css_class(&format!("point-{}", style.label()));
        button.set_size_request(diameter as i32, diameter as i32);

        let marker = libshumate::Marker::new();
        marker.set_child(Some(&button));
        marker.set_location(position.lat, position.lng);

        let sender = self.sender.clone();
        let marker_weak = marker.downgrade();
        button.connect_clicked(move |_| {
            if let Some(marker) = marker_weak.upgrade() {
                let reported = GeoPoint::new(marker.latitude(), marker.longitude());
                send(&sender, SurfaceEvent::Click(ClickTarget::Marker { reported }));
            }
        });

        marker
    }

    fn cluster_marker(&self, position: GeoPoint, members: &[usize], style: &ClusterStyle) -> libshumate::Marker {
        let button = gtk::Button::builder()
            .label(members.len().to_string().as_str())
            .tooltip_text(format!("{} events", members.len()).as_str())
            .build();
        button.add_css_class("map-marker");
        button.add_css_class("map-cluster");
        button.add_css_class(style.bucket.css_class());
        button.set_size_request(style.diameter as i32, style.diameter as i32);

        let sender = self.sender.clone();
        let members = members.to_vec();
        button.connect_clicked(move |_| {
            send(
                &sender,
                SurfaceEvent::Click(ClickTarget::Cluster {
                    center: position,
                    members: members.clone(),
                }),
            );
        });

        let marker = libshumate::Marker::new();
        marker.set_child(Some(&button));
        marker.set_location(position.lat, position.lng);
        marker
    }

    fn clear_backdrop(&mut self) {
        for path in self.backdrop.drain(..) {
            self.map_view.remove_layer(&path);
        }
    }
}

impl Surface for ShumateSurface {
    fn add_layer(&mut self, layer: &PointLayer) {
        let marker_layer = libshumate::MarkerLayer::new(&self.viewport);
        self.populate(&marker_layer, layer);
        self.map_view.add_layer(&marker_layer);
        self.layers.insert(layer.id(), marker_layer);
    }

    fn refresh_layer(&mut self, layer: &PointLayer) {
        if let Some(marker_layer) = self.layers.get(&layer.id()) {
            marker_layer.remove_all();
            self.populate(marker_layer, layer);
        }
    }

    fn remove_layer(&mut self, id: LayerId) {
        if let Some(marker_layer) = self.layers.remove(&id) {
            marker_layer.remove_all();
            self.map_view.remove_layer(&marker_layer);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        debug!("map surface resized to {width}x{height}");
        self.widget.queue_allocate();
    }

    fn set_backdrop(&mut self, backdrop: &Backdrop) {
        self.clear_backdrop();
        let Backdrop::Regions(regions) = backdrop else {
            return;
        };

        let stroke = gdk::RGBA::new(0.55, 0.75, 1.0, 0.6);
        for region in regions {
            for ring in &region.rings {
                let path = libshumate::PathLayer::new(&self.viewport);
                path.set_stroke_color(Some(&stroke));
                path.set_stroke_width(1.0);
                path.set_fill(false);
                path.set_closed(true);
                for point in ring {
                    path.add_node(&libshumate::Coordinate::new_full(point.lat, point.lng));
                }
                // Keep boundaries under the markers.
                match self.layers.values().next() {
                    Some(points) => self.map_view.insert_layer_behind(&path, Some(points)),
                    None => self.map_view.add_layer(&path),
                }
                self.backdrop.push(path);
            }
        }
        debug!("backdrop drawn with {} regions", regions.len());
    }

    fn focus(&mut self, center: GeoPoint, zoom: f64) {
        self.map_view.go_to_full(center.lat, center.lng, zoom.min(f64::from(MAX_ZOOM_LEVEL)));
    }

    fn dispose(&mut self) {
        for (_, marker_layer) in self.layers.drain() {
            marker_layer.remove_all();
            self.map_view.remove_layer(&marker_layer);
        }
        self.clear_backdrop();
        if let Some(handler) = self.zoom_handler.take() {
            self.viewport.disconnect(handler);
        }
        if let Some(handler) = self.map_handler.take() {
            self.widget.disconnect(handler);
        }
        if let Some(gesture) = self.gesture.take() {
            self.widget.remove_controller(&gesture);
        }
    }
}
