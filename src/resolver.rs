//! Maps a click back to the event under it.

use crate::data::{GeoPoint, SentimentEvent};
use crate::viewport::{Tolerance, Viewport};

/// What the engine reports for a click, reduced to what resolution needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    /// A discrete marker, at the coordinate the engine reports for it.
    Marker { reported: GeoPoint },
    /// Bare map area, in surface pixels.
    Screen { x: f64, y: f64 },
    /// A cluster marker and the event indices it aggregates.
    Cluster { center: GeoPoint, members: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Event(SentimentEvent),
    /// A cluster was clicked and the map zoomed in on it.
    Expanded,
    /// Nothing within tolerance. Not an error.
    Miss,
    /// The scene is not ready or already gone.
    Ignored,
}

/// Nearest candidate whose latitude and longitude are each within
/// `tolerance` of `at`. Ties go to the earlier event.
pub fn resolve<'a>(
    candidates: impl IntoIterator<Item = &'a SentimentEvent>,
    at: GeoPoint,
    tolerance: Tolerance,
) -> Option<&'a SentimentEvent> {
    let mut best: Option<(&SentimentEvent, f64)> = None;

    for event in candidates {
        let Some(location) = event.plottable_location() else {
            continue;
        };
        let d_lat = (location.lat - at.lat).abs();
        let d_lng = (location.lng - at.lng).abs();
        if d_lat > tolerance.lat || d_lng > tolerance.lng {
            continue;
        }

        let distance = d_lat * d_lat + d_lng * d_lng;
        match best {
            Some((_, closest)) if closest <= distance => {}
            _ => best = Some((event, distance)),
        }
    }

    best.map(|(event, _)| event)
}

/// Tolerance for a screen click: the configured epsilon, widened to cover
/// `hit_slop_px` pixels at the current zoom.
pub fn screen_tolerance(viewport: &Viewport, epsilon: f64, hit_slop_px: f64) -> Tolerance {
    let per_pixel = viewport.degrees_per_pixel();
    Tolerance {
        lat: epsilon.max(per_pixel.lat * hit_slop_px),
        lng: epsilon.max(per_pixel.lng * hit_slop_px),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sentiment;

    fn event(id: &str, lat: f64, lng: f64) -> SentimentEvent {
        SentimentEvent {
            id: id.into(),
            title: String::new(),
            sentiment: Sentiment::Positive,
            score: 0.5,
            location: Some(GeoPoint::new(lat, lng)),
            hotness: Some(3.0),
            address: None,
            source: None,
            timestamp: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn closest_event_wins_among_candidates() {
        let events = vec![event("1", 39.9042, 116.4074), event("2", 39.9043, 116.4075)];
        let hit = resolve(&events, GeoPoint::new(39.9042, 116.4074), Tolerance::uniform(1e-3));
        assert_eq!(hit.map(|e| e.id.as_str()), Some("1"));

        let hit = resolve(&events, GeoPoint::new(39.90429, 116.40749), Tolerance::uniform(1e-3));
        assert_eq!(hit.map(|e| e.id.as_str()), Some("2"));
    }

    #[test]
    fn rounding_noise_is_absorbed() {
        let events = vec![event("1", 39.9042, 116.4074)];
        let reported = GeoPoint::new(39.904_200_000_3, 116.407_399_999_8);
        assert!(resolve(&events, reported, Tolerance::uniform(1e-4)).is_some());
    }

    #[test]
    fn each_axis_is_compared_independently() {
        let events = vec![event("1", 10.0, 10.0)];
        let tolerance = Tolerance { lat: 0.01, lng: 0.5 };
        assert!(resolve(&events, GeoPoint::new(10.005, 10.4), tolerance).is_some());
        assert!(resolve(&events, GeoPoint::new(10.02, 10.0), tolerance).is_none());
    }

    #[test]
    fn empty_area_is_a_miss() {
        let events = vec![event("1", 39.9042, 116.4074)];
        assert!(resolve(&events, GeoPoint::new(0.0, 0.0), Tolerance::uniform(1e-4)).is_none());
        assert!(resolve(&Vec::new(), GeoPoint::new(0.0, 0.0), Tolerance::uniform(1.0)).is_none());
    }

    #[test]
    fn identical_locations_resolve_to_the_first() {
        let events = vec![event("first", 5.0, 5.0), event("second", 5.0, 5.0)];
        let hit = resolve(&events, GeoPoint::new(5.0, 5.0), Tolerance::uniform(1e-6));
        assert_eq!(hit.map(|e| e.id.as_str()), Some("first"));
    }

    #[test]
    fn screen_tolerance_never_drops_below_epsilon() {
        let zoomed_in = Viewport::new(GeoPoint::new(39.9, 116.4), 20.0, 400, 400);
        let tolerance = screen_tolerance(&zoomed_in, 1e-3, 8.0);
        assert_eq!(tolerance, Tolerance::uniform(1e-3));

        let overview = Viewport::new(GeoPoint::new(39.9, 116.4), 3.0, 400, 400);
        let tolerance = screen_tolerance(&overview, 1e-4, 8.0);
        assert!(tolerance.lng > 1.0);
    }
}
