use thiserror::Error;

/// Result alias used across the map library.
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors surfaced by the map library. None of these escape `MapComponent`;
/// they are logged and the widget degrades instead.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("map container is not attached yet")]
    ContainerDetached,
    #[error("rendering surface could not be created: {0}")]
    Surface(String),
    #[error("backdrop request failed: {0}")]
    BackdropRequest(#[from] reqwest::Error),
    #[error("backdrop server responded with {0}")]
    BackdropStatus(reqwest::StatusCode),
    #[error("backdrop is not valid GeoJSON: {0}")]
    BackdropParse(serde_json::Error),
    #[error("event file is not valid JSON: {0}")]
    Events(serde_json::Error),
    #[error("config file is not valid TOML: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
