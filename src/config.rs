use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::data::{ClusterConfig, GeoPoint};
use crate::Result;

pub const CONFIG_ENV: &str = "SENTIMENT_MAP_CONFIG";
pub const DEFAULT_TILE_URL: &str = "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png";

/// Props of one map widget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapProps {
    /// Pixel height of the render surface.
    pub height: u32,
    pub enable_cluster: bool,
    /// Cluster merge radius in screen pixels.
    pub cluster_radius: f64,
    pub min_cluster_size: usize,
    /// Per-axis coordinate tolerance, in degrees, when matching a marker
    /// click to its event.
    pub click_epsilon: f64,
    /// Extra pixels around a bare-map click still counted as a hit.
    pub hit_slop_px: f64,
}

impl Default for MapProps {
    fn default() -> Self {
        Self {
            height: 400,
            enable_cluster: true,
            cluster_radius: 50.0,
            min_cluster_size: 2,
            click_epsilon: 1e-4,
            hit_slop_px: 8.0,
        }
    }
}

impl MapProps {
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            enabled: self.enable_cluster,
            radius_pixels: self.cluster_radius,
            min_cluster_size: self.min_cluster_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub map: MapProps,
    pub tile_url: String,
    /// GeoJSON FeatureCollection with region boundaries.
    pub backdrop_url: Option<String>,
    pub backdrop_timeout_secs: u64,
    /// JSON array of events. Generated sample data is used when unset.
    pub events_path: Option<PathBuf>,
    pub sample_size: usize,
    pub sample_seed: u64,
    pub center: GeoPoint,
    pub zoom: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            map: MapProps::default(),
            tile_url: DEFAULT_TILE_URL.to_string(),
            backdrop_url: None,
            backdrop_timeout_secs: 10,
            events_path: None,
            sample_size: 300,
            sample_seed: 7,
            center: GeoPoint::new(35.0, 105.0),
            zoom: 4.0,
        }
    }
}

impl AppConfig {
    /// `$SENTIMENT_MAP_CONFIG`, else `<config dir>/sentiment-map/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("sentiment-map").join("config.toml"))
    }

    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;

    #[test]
    fn defaults_match_widget_contract() {
        let props = MapProps::default();
        assert_eq!(props.height, 400);
        assert!(props.enable_cluster);
        assert_eq!(props.cluster_radius, 50.0);
        assert_eq!(props.min_cluster_size, 2);
        assert_eq!(props.cluster_config(), ClusterConfig::default());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            backdrop_url = "https://example.org/china.json"
            zoom = 5.5

            [map]
            enable_cluster = false
            click_epsilon = 0.001

            [center]
            lat = 31.23
            lng = 121.47
            "#,
        )
        .unwrap();

        assert_eq!(config.backdrop_url.as_deref(), Some("https://example.org/china.json"));
        assert_eq!(config.zoom, 5.5);
        assert!(!config.map.enable_cluster);
        assert_eq!(config.map.click_epsilon, 0.001);
        assert_eq!(config.map.height, 400);
        assert_eq!(config.center, GeoPoint::new(31.23, 121.47));
        assert_eq!(config.tile_url, DEFAULT_TILE_URL);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = AppConfig::from_toml_str("map = 3").unwrap_err();
        assert!(matches!(err, MapError::Config(_)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/here/config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
