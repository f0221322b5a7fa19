use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const APP_ID: &str = "com.toasterrepair.SentimentMap";

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default = "missing_axis", deserialize_with = "axis_or_nan")]
    pub lat: f64,
    #[serde(default = "missing_axis", deserialize_with = "axis_or_nan")]
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both axes finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

fn missing_axis() -> f64 {
    f64::NAN
}

// A null axis makes the event unplottable rather than undecodable.
fn axis_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// A sentiment event as supplied by the dashboard pages. Read-only to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEvent {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub hotness: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SentimentEvent {
    /// The location, if it can be plotted.
    pub fn plottable_location(&self) -> Option<GeoPoint> {
        self.location.filter(GeoPoint::is_valid)
    }

    /// Relative age of the event, e.g. "3 hours ago". Unparseable timestamps
    /// are returned as-is.
    pub fn time_ago(&self, now: DateTime<Utc>) -> Option<String> {
        let timestamp = self.timestamp.as_deref()?;
        let parsed = DateTime::parse_from_rfc3339(timestamp)
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
            .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S"));

        let Ok(dt) = parsed else {
            return Some(timestamp.to_string());
        };

        let duration = now.naive_utc().signed_duration_since(dt);
        let text = if duration.num_days() > 0 {
            format!("{} days ago", duration.num_days())
        } else if duration.num_hours() > 0 {
            format!("{} hours ago", duration.num_hours())
        } else if duration.num_minutes() > 0 {
            format!("{} minutes ago", duration.num_minutes())
        } else {
            "Just now".to_string()
        };
        Some(text)
    }
}

/// Style bucket for a discrete point. Points are coloured by sentiment.
pub type StyleKey = Sentiment;

/// Flattened projection of one plottable event, rebuilt on every data update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPoint {
    /// Index into the owning layer's filtered event list.
    pub event: usize,
    pub lng: f64,
    pub lat: f64,
    pub weight: f64,
    pub style: StyleKey,
}

impl RenderPoint {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub radius_pixels: f64,
    pub min_cluster_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_pixels: 50.0,
            min_cluster_size: 2,
        }
    }
}

/// Parse a JSON array of events as exported by the dashboard.
pub fn parse_events(json: &str) -> crate::Result<Vec<SentimentEvent>> {
    serde_json::from_str(json).map_err(crate::MapError::Events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn null_axis_deserializes_as_unplottable() {
        let events = parse_events(
            r#"[
                {"id": "1", "sentiment": "positive", "location": {"lat": 39.9042, "lng": 116.4074}, "hotness": 8},
                {"id": "2", "location": {"lat": null, "lng": 116.0}},
                {"id": "3"}
            ]"#,
        )
        .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sentiment, Sentiment::Positive);
        assert!(events[0].plottable_location().is_some());
        assert!(events[1].location.unwrap().lat.is_nan());
        assert!(events[1].plottable_location().is_none());
        assert!(events[2].plottable_location().is_none());
    }

    #[test]
    fn out_of_range_coordinates_are_invalid() {
        assert!(GeoPoint::new(39.9, 116.4).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::INFINITY, 0.0).is_valid());
    }

    #[test]
    fn time_ago_formats_relative_age() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut event = parse_events(r#"[{"id": "a"}]"#).unwrap().remove(0);

        assert_eq!(event.time_ago(now), None);

        event.timestamp = Some("2024-05-01T09:30:00Z".into());
        assert_eq!(event.time_ago(now).as_deref(), Some("2 hours ago"));

        event.timestamp = Some("2024-04-28 12:00:00".into());
        assert_eq!(event.time_ago(now).as_deref(), Some("3 days ago"));

        event.timestamp = Some("yesterday-ish".into());
        assert_eq!(event.time_ago(now).as_deref(), Some("yesterday-ish"));
    }
}
