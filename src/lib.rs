//! Sentiment event map: filters events to plottable points, clusters them by
//! screen radius, owns the scene lifecycle and resolves clicks back to
//! events. The GTK/libshumate frontend lives in [`widget`] behind the `ui`
//! feature.

pub mod backdrop;
pub mod cluster;
pub mod component;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod sample;
pub mod scene;
pub mod viewport;

#[cfg(feature = "ui")]
pub mod widget;

pub use component::{MapComponent, SurfaceEvent};
pub use data::{ClusterConfig, GeoPoint, Sentiment, SentimentEvent};
pub use error::{MapError, Result};
pub use pipeline::RenderMode;
pub use resolver::{ClickOutcome, ClickTarget};
