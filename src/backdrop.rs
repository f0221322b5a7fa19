//! Optional region-boundary backdrop loaded from a GeoJSON FeatureCollection.
//! Loading never blocks or breaks point rendering.

use log::{debug, warn};
use serde::Deserialize;

use crate::data::GeoPoint;
use crate::{MapError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub rings: Vec<Vec<GeoPoint>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Backdrop {
    /// Tiles only, no boundary overlay.
    #[default]
    Minimal,
    Regions(Vec<Region>),
}

impl Backdrop {
    pub fn region_count(&self) -> usize {
        match self {
            Backdrop::Minimal => 0,
            Backdrop::Regions(regions) => regions.len(),
        }
    }
}

/// Proof of which backdrop request a result belongs to. Results carrying a
/// stale ticket are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackdropTicket {
    pub(crate) generation: u64,
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Properties>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
struct Properties {
    #[serde(default)]
    name: Option<String>,
}

// GeoJSON positions are [lng, lat] with an optional altitude.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

fn ring(positions: Vec<Vec<f64>>) -> Option<Vec<GeoPoint>> {
    let points: Vec<GeoPoint> = positions
        .into_iter()
        .filter_map(|position| match position.as_slice() {
            [lng, lat, ..] => Some(GeoPoint::new(*lat, *lng)),
            _ => None,
        })
        .filter(GeoPoint::is_valid)
        .collect();
    (points.len() >= 3).then_some(points)
}

pub fn parse(json: &str) -> Result<Backdrop> {
    let collection: FeatureCollection = serde_json::from_str(json).map_err(MapError::BackdropParse)?;

    let regions: Vec<Region> = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let polygons = match feature.geometry? {
                Geometry::Polygon { coordinates } => vec![coordinates],
                Geometry::MultiPolygon { coordinates } => coordinates,
                Geometry::Unsupported => return None,
            };
            let rings: Vec<Vec<GeoPoint>> = polygons.into_iter().flatten().filter_map(ring).collect();
            if rings.is_empty() {
                return None;
            }
            let name = feature
                .properties
                .and_then(|properties| properties.name)
                .unwrap_or_default();
            Some(Region { name, rings })
        })
        .collect();

    if regions.is_empty() {
        return Ok(Backdrop::Minimal);
    }
    Ok(Backdrop::Regions(regions))
}

pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Backdrop> {
    debug!("fetching backdrop from {url}");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(MapError::BackdropStatus(response.status()));
    }
    let text = response.text().await?;
    parse(&text)
}

/// Fetch the backdrop, falling back to [`Backdrop::Minimal`] on any failure.
pub async fn load(client: &reqwest::Client, url: &str) -> Backdrop {
    match fetch(client, url).await {
        Ok(backdrop) => {
            debug!("backdrop loaded with {} regions", backdrop.region_count());
            backdrop
        }
        Err(err) => {
            warn!("backdrop unavailable, using minimal map: {err}");
            Backdrop::Minimal
        }
    }
}
